use crate::math::DualQuat;
use crate::math::matrix::{compose_trs, decompose_trs, inverse_trs};
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use std::fmt;

/// 缩放-旋转-平移三元组，是层级变换中"局部"与"世界"状态的基本单位
///
/// 作用于点的顺序为先缩放、再旋转、最后平移。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub scale: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub position: Vector3<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn new(
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        position: Vector3<f32>,
    ) -> Self {
        Self {
            scale,
            rotation,
            position,
        }
    }

    pub fn identity() -> Self {
        Self {
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: UnitQuaternion::identity(),
            position: Vector3::zeros(),
        }
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    pub fn from_rotation_position(rotation: UnitQuaternion<f32>, position: Vector3<f32>) -> Self {
        Self {
            rotation,
            position,
            ..Self::identity()
        }
    }

    /// 从 TRS 矩阵分解，基向量退化时返回错误
    pub fn from_matrix(m: &Matrix4<f32>) -> Result<Self, String> {
        decompose_trs(m)
            .map(|(scale, rotation, position)| Self::new(scale, rotation, position))
            .ok_or_else(|| "无法分解退化的变换矩阵".to_string())
    }

    /// 把 `local` 放到 `parent` 坐标系下：
    /// `s = s₀⊙s₁`，`q = q₁·q₀`，`t = q₁(t₀⊙s₁) + t₁`
    pub fn compose(parent: &Pose, local: &Pose) -> Pose {
        Pose {
            scale: local.scale.component_mul(&parent.scale),
            rotation: parent.rotation * local.rotation,
            position: parent.rotation * local.position.component_mul(&parent.scale)
                + parent.position,
        }
    }

    /// `compose` 的逆运算：已知世界姿态与父节点世界姿态，求局部姿态
    pub fn relative_to(world: &Pose, parent: &Pose) -> Pose {
        let inv_rotation = parent.rotation.inverse();
        Pose {
            scale: world.scale.component_div(&parent.scale),
            rotation: inv_rotation * world.rotation,
            position: (inv_rotation * (world.position - parent.position))
                .component_div(&parent.scale),
        }
    }

    /// 逆变换：`compose(&p.inverse(), &p)` 为单位变换
    pub fn inverse(&self) -> Pose {
        let scale = self.scale.map(|s| 1.0 / s);
        let rotation = self.rotation.inverse();
        let position = rotation * (-self.position.component_mul(&scale));
        Pose {
            scale,
            rotation,
            position,
        }
    }

    /// 先应用 `self` 再应用 `next`
    pub fn then(&self, next: &Pose) -> Pose {
        Pose::compose(next, self)
    }

    /// 把一串变换按先后顺序折叠为一个
    pub fn chain<'a, I>(poses: I) -> Pose
    where
        I: IntoIterator<Item = &'a Pose>,
    {
        poses
            .into_iter()
            .fold(Pose::identity(), |acc, next| acc.then(next))
    }

    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point.component_mul(&self.scale) + self.position
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        compose_trs(&self.scale, &self.rotation, &self.position)
    }

    pub fn to_inverse_matrix(&self) -> Matrix4<f32> {
        inverse_trs(&self.scale, &self.rotation, &self.position)
    }

    /// 只含旋转与平移，缩放需另行保存
    pub fn to_dual_quaternion(&self) -> DualQuat {
        DualQuat::from_rotation_translation(&self.rotation, &self.position)
    }

    pub fn approx_eq(&self, other: &Pose, epsilon: f32) -> bool {
        (self.scale - other.scale).norm() <= epsilon
            && self.rotation.angle_to(&other.rotation) <= epsilon
            && (self.position - other.position).norm() <= epsilon
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        write!(
            f,
            "S({:.3}, {:.3}, {:.3}) R({:.1}°, {:.1}°, {:.1}°) T({:.3}, {:.3}, {:.3})",
            self.scale.x,
            self.scale.y,
            self.scale.z,
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees(),
            self.position.x,
            self.position.y,
            self.position.z
        )
    }
}
