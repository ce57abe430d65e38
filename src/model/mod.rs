pub mod mesh;
pub mod primitives;

pub use mesh::{ClipVertex, Mesh, TriangleRef, Vertex};
