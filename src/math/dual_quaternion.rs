use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};
use std::ops::{Add, AddAssign, Mul};

/// 对偶四元数 `real + ε·dual`，只编码旋转与平移
///
/// 单位对偶四元数满足 `|real| = 1` 且 `real·dual = 0`，
/// 平移量为 `2·dual·real*` 的虚部。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualQuat {
    pub real: Quaternion<f32>,
    pub dual: Quaternion<f32>,
}

impl Default for DualQuat {
    fn default() -> Self {
        Self::identity()
    }
}

impl DualQuat {
    pub fn new(real: Quaternion<f32>, dual: Quaternion<f32>) -> Self {
        Self { real, dual }
    }

    pub fn identity() -> Self {
        Self {
            real: Quaternion::identity(),
            dual: Quaternion::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    /// 先旋转后平移
    pub fn from_rotation_translation(
        rotation: &UnitQuaternion<f32>,
        translation: &Vector3<f32>,
    ) -> Self {
        let real = *rotation.quaternion();
        let dual = Quaternion::from_imag(*translation) * real * 0.5;
        Self { real, dual }
    }

    /// 实部的模
    pub fn norm(&self) -> f32 {
        self.real.norm()
    }

    /// 两个对偶四元数实部的点积，用于判断是否位于同一半球
    pub fn real_dot(&self, other: &DualQuat) -> f32 {
        self.real.dot(&other.real)
    }

    /// 按实部的模归一化，实部为零时原样返回
    pub fn normalize(&self) -> Self {
        let norm = self.norm();
        if norm <= f32::EPSILON {
            return *self;
        }
        let inv = 1.0 / norm;
        Self {
            real: self.real * inv,
            dual: self.dual * inv,
        }
    }

    /// 四元数共轭（实部与对偶部分别取共轭）
    pub fn conjugate(&self) -> Self {
        Self {
            real: self.real.conjugate(),
            dual: self.dual.conjugate(),
        }
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::new_normalize(self.real)
    }

    pub fn translation(&self) -> Vector3<f32> {
        (self.dual * self.real.conjugate() * 2.0).imag()
    }

    /// 夹心积 `dq·p·dq*`，要求已归一化
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        let rotated = (self.real * Quaternion::from_imag(*point) * self.real.conjugate()).imag();
        rotated + self.translation()
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        let mut m = self.rotation().to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation());
        m
    }
}

impl Add for DualQuat {
    type Output = DualQuat;

    fn add(self, rhs: DualQuat) -> DualQuat {
        DualQuat {
            real: self.real + rhs.real,
            dual: self.dual + rhs.dual,
        }
    }
}

impl AddAssign for DualQuat {
    fn add_assign(&mut self, rhs: DualQuat) {
        self.real = self.real + rhs.real;
        self.dual = self.dual + rhs.dual;
    }
}

impl Mul<f32> for DualQuat {
    type Output = DualQuat;

    fn mul(self, s: f32) -> DualQuat {
        DualQuat {
            real: self.real * s,
            dual: self.dual * s,
        }
    }
}

/// 对偶四元数乘法，右侧先作用
impl Mul for DualQuat {
    type Output = DualQuat;

    fn mul(self, rhs: DualQuat) -> DualQuat {
        DualQuat {
            real: self.real * rhs.real,
            dual: self.real * rhs.dual + self.dual * rhs.real,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quaternion::angle_axis;

    #[test]
    fn transform_point_rotates_then_translates() {
        let r = angle_axis(90.0, &Vector3::z());
        let t = Vector3::new(1.0, 2.0, 3.0);
        let dq = DualQuat::from_rotation_translation(&r, &t);
        let p = dq.transform_point(&Vector3::new(1.0, 0.0, 0.0));
        assert!((p - Vector3::new(1.0, 3.0, 3.0)).norm() < 1.0e-5);
        assert!((dq.translation() - t).norm() < 1.0e-5);
    }

    #[test]
    fn to_matrix_agrees_with_point_transform() {
        let r = angle_axis(33.0, &Vector3::new(1.0, 1.0, 0.0));
        let t = Vector3::new(-4.0, 0.5, 2.0);
        let dq = DualQuat::from_rotation_translation(&r, &t);
        let p = Vector3::new(0.3, -1.2, 5.0);
        let by_matrix = dq.to_matrix().transform_point(&p.into());
        assert!((by_matrix.coords - dq.transform_point(&p)).norm() < 1.0e-4);
    }

    #[test]
    fn product_composes_right_to_left() {
        let a = DualQuat::from_rotation_translation(&angle_axis(90.0, &Vector3::y()), &Vector3::x());
        let b = DualQuat::from_rotation_translation(&UnitQuaternion::identity(), &Vector3::z());
        let p = Vector3::new(0.0, 1.0, 0.0);
        let composed = (a * b).transform_point(&p);
        let sequential = a.transform_point(&b.transform_point(&p));
        assert!((composed - sequential).norm() < 1.0e-5);
    }

    #[test]
    fn normalize_restores_unit_length_after_blend() {
        let a = DualQuat::from_rotation_translation(&angle_axis(10.0, &Vector3::x()), &Vector3::y());
        let b = DualQuat::from_rotation_translation(&angle_axis(80.0, &Vector3::x()), &Vector3::y());
        let blended = (a * 0.5 + b * 0.5).normalize();
        assert!((blended.norm() - 1.0).abs() < 1.0e-5);
        assert!((blended.translation() - Vector3::y()).norm() < 1.0e-4);
    }
}
