use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// 构造 `T·R·S` 矩阵：旋转矩阵各列乘以对应缩放，再写入平移列
pub fn compose_trs(
    scale: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
    position: &Vector3<f32>,
) -> Matrix4<f32> {
    let mut m = rotation.to_homogeneous();
    for col in 0..3 {
        for row in 0..3 {
            m[(row, col)] *= scale[col];
        }
    }
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(position);
    m
}

/// `compose_trs` 的精确逆 `S⁻¹·R⁻¹·T⁻¹`，不做通用求逆
pub fn inverse_trs(
    scale: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
    position: &Vector3<f32>,
) -> Matrix4<f32> {
    let mut basis: Matrix3<f32> = rotation.inverse().to_rotation_matrix().into_inner();
    for row in 0..3 {
        let inv = 1.0 / scale[row];
        for col in 0..3 {
            basis[(row, col)] *= inv;
        }
    }
    let translation = -(basis * position);

    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&basis);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
    m
}

/// 把仿射 TRS 矩阵拆回 (缩放, 旋转, 平移)
///
/// 缩放取基向量长度；任一基向量长度为 0 时无法分解，返回 `None`。
/// 含镜像的矩阵把负号放进 x 轴缩放。
pub fn decompose_trs(
    m: &Matrix4<f32>,
) -> Option<(Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>)> {
    let mut basis: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let mut scale = Vector3::new(
        basis.column(0).norm(),
        basis.column(1).norm(),
        basis.column(2).norm(),
    );
    if scale.iter().any(|s| *s <= f32::EPSILON) {
        return None;
    }
    for col in 0..3 {
        for row in 0..3 {
            basis[(row, col)] /= scale[col];
        }
    }
    if basis.determinant() < 0.0 {
        scale.x = -scale.x;
        for row in 0..3 {
            basis[(row, 0)] = -basis[(row, 0)];
        }
    }

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis));
    let position = m.fixed_view::<3, 1>(0, 3).into_owned();
    Some((scale, rotation, position))
}

/// 求逆；行列式绝对值不超过 `f32::EPSILON` 时视为奇异，返回 `None`
pub fn try_inverse(m: &Matrix4<f32>) -> Option<Matrix4<f32>> {
    if m.determinant().abs() <= f32::EPSILON {
        return None;
    }
    m.try_inverse()
}

/// 依次右乘：`product([a, b, c]) = a·b·c`
pub fn product<'a, I>(matrices: I) -> Matrix4<f32>
where
    I: IntoIterator<Item = &'a Matrix4<f32>>,
{
    matrices
        .into_iter()
        .fold(Matrix4::identity(), |acc, m| acc * m)
}
