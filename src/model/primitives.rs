//! 内置几何体：立方体、骨骼可视化网格、两节骨骼的蒙皮柱体
//!
//! 所有三角形按右手定则绕向外法线逆时针排列，投影后即为正面。

use crate::geometry::pose::Pose;
use crate::geometry::transform::{TransformId, TransformTree};
use crate::model::mesh::{Mesh, Vertex};
use crate::skinning::{Bone, Deformer, SkinType};
use nalgebra::{Vector2, Vector3};

/// 骨骼的八面体可视化网格：底端在原点，尖端在 (0,1,0)
pub fn bone_mesh() -> Mesh {
    let v = |x: f32, y: f32, z: f32| Vertex::new(Vector3::new(x, y, z), Vector2::zeros(), Vector3::y());
    Mesh::new(
        "bone",
        vec![
            v(0.0, 0.0, 0.0),
            v(-0.1, 0.1, -0.1),
            v(-0.1, 0.1, 0.1),
            v(0.1, 0.1, 0.1),
            v(0.1, 0.1, -0.1),
            v(0.0, 1.0, 0.0),
        ],
        vec![
            0, 1, 4, 2, 1, 0, 3, 2, 0, 4, 3, 0, //
            1, 5, 4, 4, 5, 3, 3, 5, 2, 2, 5, 1,
        ],
    )
}

/// 以原点为中心、边长 `size` 的立方体，每个面独立 uv
pub fn cube(size: f32) -> Mesh {
    let h = size * 0.5;
    let faces = [
        (Vector3::x(), Vector3::y(), Vector3::z()),
        (-Vector3::x(), Vector3::z(), Vector3::y()),
        (Vector3::y(), Vector3::z(), Vector3::x()),
        (-Vector3::y(), Vector3::x(), Vector3::z()),
        (Vector3::z(), Vector3::x(), Vector3::y()),
        (-Vector3::z(), Vector3::y(), Vector3::x()),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    let uvs = [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for ((cu, cv), (tu, tv)) in corners.iter().zip(uvs.iter()) {
            let p = (normal + u * *cu + v * *cv) * h;
            vertices.push(Vertex::new(p, Vector2::new(*tu, *tv), normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    Mesh::new("cube", vertices, indices)
}

/// 蒙皮柱体及其两根骨骼
#[derive(Debug, Clone)]
pub struct SkinnedColumn {
    pub mesh: Mesh,
    pub root: TransformId,
    pub joint: TransformId,
}

/// 生成沿 +Y、截面为正方形的柱体，并绑定 "root"（y=0）与 "joint"（y=height/2）两根骨骼
///
/// 关节附近 `blend` 范围内的顶点在两根骨骼间线性过渡。骨骼节点作为根节点
/// 加入 `tree`，其世界空间即网格的物体空间。
pub fn skinned_column(
    tree: &mut TransformTree,
    height: f32,
    half_width: f32,
    segments: usize,
    blend: f32,
    skin_type: SkinType,
) -> Result<SkinnedColumn, String> {
    if segments == 0 || height <= 0.0 || half_width <= 0.0 {
        return Err(format!(
            "无效的柱体参数: height={}, half_width={}, segments={}",
            height, half_width, segments
        ));
    }

    let joint_y = height * 0.5;
    let root = tree.create_with_pose("root", Pose::identity());
    let joint = tree.create_with_pose("joint", Pose::from_position(Vector3::new(0.0, joint_y, 0.0)));
    tree.add_child(root, joint)?;

    let r = half_width;
    let ring = [(r, r), (r, -r), (-r, -r), (-r, r)];
    let blend = blend.max(f32::EPSILON);

    let mut vertices = Vec::with_capacity((segments + 1) * 4);
    for i in 0..=segments {
        let y = height * i as f32 / segments as f32;
        let w_joint = ((y - (joint_y - blend)) / (2.0 * blend)).clamp(0.0, 1.0);
        for (k, (x, z)) in ring.iter().enumerate() {
            let deformer = Deformer::with_influences(
                skin_type,
                [("root", 1.0 - w_joint), ("joint", w_joint)],
            );
            let uv = Vector2::new(k as f32 / 4.0, 1.0 - i as f32 / segments as f32);
            vertices.push(
                Vertex::new(Vector3::new(*x, y, *z), uv, Vector3::new(*x, 0.0, *z).normalize())
                    .with_deformer(deformer),
            );
        }
    }

    let mut indices = Vec::with_capacity(segments * 24 + 12);
    for i in 0..segments as u32 {
        for k in 0..4u32 {
            let a = i * 4 + k;
            let b = i * 4 + (k + 1) % 4;
            let c = b + 4;
            let d = a + 4;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    let top = segments as u32 * 4;
    indices.extend_from_slice(&[0, 2, 1, 0, 3, 2]);
    indices.extend_from_slice(&[top, top + 1, top + 2, top, top + 2, top + 3]);

    let mut mesh = Mesh::new("skinned_column", vertices, indices);
    mesh.add_bone("root", Bone::bound_at_current_pose(root, tree));
    mesh.add_bone("joint", Bone::bound_at_current_pose(joint, tree));

    Ok(SkinnedColumn { mesh, root, joint })
}
