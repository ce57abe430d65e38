// geometry/mod.rs
// 姿态、变换层级与相机
pub mod camera;
pub mod pose;
pub mod transform;

pub use camera::{Camera, Viewport};
pub use pose::Pose;
pub use transform::{Transform, TransformId, TransformTree};
