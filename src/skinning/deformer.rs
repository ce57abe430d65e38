//! 顶点变形器：把多根骨骼的蒙皮变换按权重混合到一个顶点上

use crate::geometry::transform::TransformTree;
use crate::skinning::bone::Bone;
use nalgebra::Vector4;
use std::cell::Cell;
use std::collections::HashMap;

/// 蒙皮算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinType {
    /// 线性混合蒙皮 (LBS)
    #[default]
    Linear,
    /// 对偶四元数线性混合 (DLB)
    DualQuaternion,
    /// 预留：LBS 与 DLB 的混合，目前按 Linear 计算
    Blend,
    /// 预留：球面混合，目前按 Linear 计算
    Spherical,
}

impl SkinType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(SkinType::Linear),
            "dual_quaternion" | "dualquaternion" | "dq" => Some(SkinType::DualQuaternion),
            "blend" => Some(SkinType::Blend),
            "spherical" => Some(SkinType::Spherical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkinType::Linear => "linear",
            SkinType::DualQuaternion => "dual_quaternion",
            SkinType::Blend => "blend",
            SkinType::Spherical => "spherical",
        }
    }
}

/// 单根骨骼对顶点的影响
#[derive(Debug, Clone, PartialEq)]
pub struct BoneWeight {
    pub bone: String,
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct Deformer {
    pub skin_type: SkinType,
    influences: Vec<BoneWeight>,
    cache: Cell<Option<(u64, Vector4<f32>)>>,
}

impl Deformer {
    pub fn new(skin_type: SkinType) -> Self {
        Self {
            skin_type,
            influences: Vec::new(),
            cache: Cell::new(None),
        }
    }

    pub fn with_influences<I, S>(skin_type: SkinType, influences: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut deformer = Self::new(skin_type);
        for (bone, weight) in influences {
            deformer.add_influence(bone, weight);
        }
        deformer
    }

    pub fn add_influence(&mut self, bone: impl Into<String>, weight: f32) {
        self.influences.push(BoneWeight {
            bone: bone.into(),
            weight,
        });
        self.cache.set(None);
    }

    pub fn influences(&self) -> &[BoneWeight] {
        &self.influences
    }

    pub fn total_weight(&self) -> f32 {
        self.influences.iter().map(|i| i.weight).sum()
    }

    /// 计算 `frame` 帧的变形位置（按帧缓存）
    ///
    /// 没有任何骨骼影响时原样返回；引用了不存在的骨骼名返回错误。
    pub fn deform(
        &self,
        position: &Vector4<f32>,
        bones: &HashMap<String, Bone>,
        tree: &TransformTree,
        frame: u64,
    ) -> Result<Vector4<f32>, String> {
        if self.influences.is_empty() {
            return Ok(*position);
        }
        if let Some((cached_frame, cached)) = self.cache.get() {
            if cached_frame == frame {
                return Ok(cached);
            }
        }

        let mut deformed = match self.skin_type {
            SkinType::DualQuaternion => self.dual_quaternion(position, bones, tree, frame)?,
            SkinType::Linear | SkinType::Blend | SkinType::Spherical => {
                self.linear(position, bones, tree, frame)?
            }
        };
        let w = deformed.w;
        if w != 1.0 && w.abs() > f32::EPSILON {
            deformed /= w;
        }

        self.cache.set(Some((frame, deformed)));
        Ok(deformed)
    }

    fn bone<'a>(
        &self,
        bones: &'a HashMap<String, Bone>,
        name: &str,
    ) -> Result<&'a Bone, String> {
        bones
            .get(name)
            .ok_or_else(|| format!("变形器引用了不存在的骨骼 '{}'", name))
    }

    /// `Σ wᵢ·(Mᵢ·p)`，w 分量累加总权重
    fn linear(
        &self,
        position: &Vector4<f32>,
        bones: &HashMap<String, Bone>,
        tree: &TransformTree,
        frame: u64,
    ) -> Result<Vector4<f32>, String> {
        let (first, rest) = self
            .influences
            .split_first()
            .ok_or_else(|| "变形器没有骨骼".to_string())?;

        let skinned = self.bone(bones, &first.bone)?.skinning(tree, frame) * position;
        let mut acc = skinned * first.weight;
        acc.w = first.weight;

        for influence in rest {
            let skinned = self.bone(bones, &influence.bone)?.skinning(tree, frame) * position;
            acc.x += skinned.x * influence.weight;
            acc.y += skinned.y * influence.weight;
            acc.z += skinned.z * influence.weight;
            acc.w += influence.weight;
        }
        Ok(acc)
    }

    /// `Σ wᵢ·dqᵢ` 归一化后做夹心积；与第一根骨骼不在同一半球的对偶四元数取反
    fn dual_quaternion(
        &self,
        position: &Vector4<f32>,
        bones: &HashMap<String, Bone>,
        tree: &TransformTree,
        frame: u64,
    ) -> Result<Vector4<f32>, String> {
        let (first, rest) = self
            .influences
            .split_first()
            .ok_or_else(|| "变形器没有骨骼".to_string())?;

        let pivot = self
            .bone(bones, &first.bone)?
            .skinning_dual_quaternion(tree, frame);
        let mut blend = pivot * first.weight;
        let mut total = first.weight;

        for influence in rest {
            let dq = self
                .bone(bones, &influence.bone)?
                .skinning_dual_quaternion(tree, frame);
            let weight = if pivot.real_dot(&dq) < 0.0 {
                -influence.weight
            } else {
                influence.weight
            };
            blend += dq * weight;
            total += influence.weight;
        }

        let p = blend.normalize().transform_point(&position.xyz());
        Ok(Vector4::new(p.x, p.y, p.z, total))
    }
}
