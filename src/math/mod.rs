//! 数学核心：在 nalgebra 之上补充渲染管线需要的旋转、对偶四元数与矩阵工具

pub mod dual_quaternion;
pub mod matrix;
pub mod quaternion;

pub use dual_quaternion::DualQuat;
pub use quaternion::RotationOrder;

/// 角度转弧度
pub const DEG2RAD: f32 = std::f32::consts::PI / 180.0;
/// 弧度转角度
pub const RAD2DEG: f32 = 180.0 / std::f32::consts::PI;

/// 透视除法时 w 为 0 的替代值
const W_EPSILON: f32 = f32::EPSILON;

/// 安全的透视除数
#[inline]
pub fn safe_w(w: f32) -> f32 {
    if w == 0.0 { W_EPSILON } else { w }
}
