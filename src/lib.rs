//! # 骨骼蒙皮软件光栅化器
//!
//! 单线程、逐帧驱动的软件 3D 管线：变换层级与相机、六平面齐次裁剪、
//! 透视校正光栅化（深度缓冲、alpha 混合、Bresenham 线框），以及
//! 线性混合 / 对偶四元数两种骨骼蒙皮。

pub mod core;
pub mod geometry;
pub mod io;
pub mod material_system;
pub mod math;
pub mod model;
pub mod skinning;
pub mod utils;
