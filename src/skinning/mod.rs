pub mod bone;
pub mod deformer;

pub use bone::Bone;
pub use deformer::{BoneWeight, Deformer, SkinType};
