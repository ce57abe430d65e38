pub mod color;
pub mod material;
pub mod shader;
pub mod texture;

pub use color::Color;
pub use material::Material;
pub use texture::Texture;
