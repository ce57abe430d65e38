use crate::math::{DEG2RAD, RAD2DEG};
use nalgebra::{Matrix3, Unit, UnitQuaternion, Vector3};
use std::f32::consts::PI;

/// 欧拉角的应用顺序，名称中的轴按先后顺序作用于向量
///
/// 例如 `YXZ` 表示先绕 Y、再绕 X、最后绕 Z 旋转，即 `q = Rz · Rx · Ry`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationOrder {
    XYZ,
    XZY,
    YZX,
    #[default]
    YXZ,
    ZXY,
    ZYX,
}

impl RotationOrder {
    /// 按应用顺序返回三个轴的下标 (0=X, 1=Y, 2=Z)
    pub fn axes(self) -> [usize; 3] {
        match self {
            RotationOrder::XYZ => [0, 1, 2],
            RotationOrder::XZY => [0, 2, 1],
            RotationOrder::YZX => [1, 2, 0],
            RotationOrder::YXZ => [1, 0, 2],
            RotationOrder::ZXY => [2, 0, 1],
            RotationOrder::ZYX => [2, 1, 0],
        }
    }

    /// 轴序是否为 (0,1,2) 的偶排列
    fn is_even(self) -> bool {
        matches!(
            self,
            RotationOrder::XYZ | RotationOrder::YZX | RotationOrder::ZXY
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XYZ" => Some(RotationOrder::XYZ),
            "XZY" => Some(RotationOrder::XZY),
            "YZX" => Some(RotationOrder::YZX),
            "YXZ" => Some(RotationOrder::YXZ),
            "ZXY" => Some(RotationOrder::ZXY),
            "ZYX" => Some(RotationOrder::ZYX),
            _ => None,
        }
    }
}

fn axis_rotation(axis: usize, degrees: f32) -> UnitQuaternion<f32> {
    let unit = match axis {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    };
    UnitQuaternion::from_axis_angle(&unit, degrees * DEG2RAD)
}

/// 绕任意轴旋转（角度制），零长度轴返回单位旋转
pub fn angle_axis(degrees: f32, axis: &Vector3<f32>) -> UnitQuaternion<f32> {
    match Unit::try_new(*axis, f32::EPSILON) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, degrees * DEG2RAD),
        None => UnitQuaternion::identity(),
    }
}

/// 由欧拉角（角度制，分别绕 +X/+Y/+Z）按给定顺序构造旋转
pub fn euler(x: f32, y: f32, z: f32, order: RotationOrder) -> UnitQuaternion<f32> {
    let angles = [x, y, z];
    order
        .axes()
        .iter()
        .fold(UnitQuaternion::identity(), |acc, &axis| {
            axis_rotation(axis, angles[axis]) * acc
        })
}

/// 把旋转分解为欧拉角（角度制），返回值按 (x, y, z) 排列
///
/// 中间轴的角度落在 [-90, 90]。万向节锁时第一个轴的角度取 0，
/// 全部旋转量并入最后一个轴。
pub fn to_euler(rotation: &UnitQuaternion<f32>, order: RotationOrder) -> Vector3<f32> {
    let m: Matrix3<f32> = rotation.to_rotation_matrix().into_inner();
    let [i, j, k] = order.axes();
    let sign = if order.is_even() { 1.0 } else { -1.0 };

    let sin_beta = (-sign * m[(k, i)]).clamp(-1.0, 1.0);
    let beta = sin_beta.asin();
    let (alpha, gamma) = if sin_beta.abs() > 0.99999 {
        (0.0, (-sign * m[(i, j)]).atan2(m[(j, j)]))
    } else {
        (
            (sign * m[(k, j)]).atan2(m[(k, k)]),
            (sign * m[(j, i)]).atan2(m[(i, i)]),
        )
    };

    let mut out = Vector3::zeros();
    out[i] = alpha * RAD2DEG;
    out[j] = beta * RAD2DEG;
    out[k] = gamma * RAD2DEG;
    out
}

/// 把 `from` 方向转到 `to` 方向的最短旋转
pub fn from_to(from: &Vector3<f32>, to: &Vector3<f32>) -> UnitQuaternion<f32> {
    if let Some(q) = UnitQuaternion::rotation_between(from, to) {
        return q;
    }
    // 方向相反：绕任一垂直轴转半圈
    let helper = if from.y != 0.0 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    Unit::try_new(from.cross(&helper), f32::EPSILON)
        .map(|axis| UnitQuaternion::from_axis_angle(&axis, PI))
        .unwrap_or_else(UnitQuaternion::identity)
}

/// 归一化线性插值，自动选择最短路径
pub fn nlerp(
    from: &UnitQuaternion<f32>,
    to: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    let mut end = *to.quaternion();
    if from.dot(to) < 0.0 {
        end = -end;
    }
    UnitQuaternion::new_normalize(*from.quaternion() * (1.0 - t) + end * t)
}

/// 球面线性插值，自动选择最短路径；两者几乎重合时退化为 nlerp
pub fn slerp(
    from: &UnitQuaternion<f32>,
    to: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    let end = if from.dot(to) < 0.0 {
        UnitQuaternion::new_unchecked(-to.into_inner())
    } else {
        *to
    };
    from.try_slerp(&end, t, 1.0e-6)
        .unwrap_or_else(|| nlerp(from, &end, t))
}
