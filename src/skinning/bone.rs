//! 骨骼：引用变换树中的一个节点，并保存逆绑定姿态

use crate::geometry::pose::Pose;
use crate::geometry::transform::{TransformId, TransformTree};
use crate::math::DualQuat;
use nalgebra::Matrix4;
use std::cell::Cell;

/// 某一帧的蒙皮变换
#[derive(Debug, Clone, Copy)]
struct SkinningCache {
    frame: u64,
    matrix: Matrix4<f32>,
    dual: DualQuat,
}

/// 骨骼
///
/// 蒙皮变换 = 当前世界姿态 ∘ 逆绑定姿态，按帧号缓存：
/// 同一帧内第一次读取时计算，之后的读取直接返回缓存。
#[derive(Debug, Clone)]
pub struct Bone {
    transform: TransformId,
    inv_bind_pose: Pose,
    cache: Cell<Option<SkinningCache>>,
}

impl Bone {
    pub fn new(transform: TransformId) -> Self {
        Self {
            transform,
            inv_bind_pose: Pose::identity(),
            cache: Cell::new(None),
        }
    }

    /// 以骨骼当前的世界姿态作为绑定姿态
    pub fn bound_at_current_pose(transform: TransformId, tree: &TransformTree) -> Self {
        let mut bone = Self::new(transform);
        bone.set_bind_pose(*tree.get(transform).world_pose());
        bone
    }

    pub fn transform(&self) -> TransformId {
        self.transform
    }

    /// 保存绑定姿态的逆
    pub fn set_bind_pose(&mut self, bind_pose: Pose) {
        self.inv_bind_pose = bind_pose.inverse();
        self.cache.set(None);
    }

    pub fn set_bind_pose_matrix(&mut self, m: &Matrix4<f32>) -> Result<(), String> {
        self.set_bind_pose(Pose::from_matrix(m)?);
        Ok(())
    }

    pub fn bind_pose(&self) -> Pose {
        self.inv_bind_pose.inverse()
    }

    pub fn inv_bind_pose(&self) -> &Pose {
        &self.inv_bind_pose
    }

    fn skinning_cache(&self, tree: &TransformTree, frame: u64) -> SkinningCache {
        if let Some(cached) = self.cache.get() {
            if cached.frame == frame {
                return cached;
            }
        }
        let pose = Pose::compose(tree.get(self.transform).world_pose(), &self.inv_bind_pose);
        let fresh = SkinningCache {
            frame,
            matrix: pose.to_matrix(),
            dual: pose.to_dual_quaternion(),
        };
        self.cache.set(Some(fresh));
        fresh
    }

    /// 绑定空间 → 当前世界空间的矩阵
    pub fn skinning(&self, tree: &TransformTree, frame: u64) -> Matrix4<f32> {
        self.skinning_cache(tree, frame).matrix
    }

    /// 同 [`Bone::skinning`]，以对偶四元数表示（忽略缩放）
    pub fn skinning_dual_quaternion(&self, tree: &TransformTree, frame: u64) -> DualQuat {
        self.skinning_cache(tree, frame).dual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quaternion::angle_axis;
    use nalgebra::{Vector3, Vector4};

    #[test]
    fn skinning_is_identity_at_bind_pose() {
        let mut tree = TransformTree::new();
        let id = tree.create("bone");
        tree.set_world_transform(
            id,
            Vector3::new(1.0, 1.0, 1.0),
            angle_axis(30.0, &Vector3::z()),
            Vector3::new(0.0, 2.0, 0.0),
        );
        let bone = Bone::bound_at_current_pose(id, &tree);
        assert!((bone.skinning(&tree, 1) - Matrix4::identity()).norm() < 1.0e-5);
        assert!(bone.bind_pose().approx_eq(tree.get(id).world_pose(), 1.0e-5));
    }

    #[test]
    fn skinning_moves_with_bone() {
        let mut tree = TransformTree::new();
        let id = tree.create("bone");
        let bone = Bone::new(id);
        tree.set_position(id, Vector3::new(3.0, 0.0, 0.0));
        let p = bone.skinning(&tree, 1) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(p, Vector4::new(4.0, 0.0, 0.0, 1.0));
        let dq = bone.skinning_dual_quaternion(&tree, 1);
        assert!((dq.translation() - Vector3::new(3.0, 0.0, 0.0)).norm() < 1.0e-5);
    }

    #[test]
    fn cache_is_keyed_by_frame() {
        let mut tree = TransformTree::new();
        let id = tree.create("bone");
        let bone = Bone::new(id);
        let first = bone.skinning(&tree, 7);

        // 同一帧内的修改不可见
        tree.set_position(id, Vector3::new(0.0, 5.0, 0.0));
        assert_eq!(bone.skinning(&tree, 7), first);

        let next = bone.skinning(&tree, 8);
        assert_eq!(next[(1, 3)], 5.0);
    }
}
