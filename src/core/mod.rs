pub mod clipper;
pub mod frame_buffer;
pub mod rasterizer;
pub mod renderer;
pub mod scene;
