//! 可替换的顶点/片元着色器
//!
//! 材质持有着色器对象，渲染器通过 trait 调用，不关心具体实现。

use crate::geometry::transform::TransformTree;
use crate::material_system::color::Color;
use crate::material_system::material::Material;
use crate::material_system::texture::Texture;
use crate::model::mesh::{ClipVertex, Vertex};
use crate::skinning::Bone;
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use std::collections::HashMap;
use std::fmt::Debug;

/// 一次绘制调用共享的矩阵
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniforms {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub perspective: Matrix4<f32>,
    /// P·V
    pub view_perspective: Matrix4<f32>,
    /// P·V·M
    pub final_matrix: Matrix4<f32>,
}

impl Uniforms {
    pub fn new(model: Matrix4<f32>, view: Matrix4<f32>, perspective: Matrix4<f32>) -> Self {
        let view_perspective = perspective * view;
        Self {
            model,
            view,
            perspective,
            view_perspective,
            final_matrix: view_perspective * model,
        }
    }

    /// 替换最终矩阵（骨骼可视化等附加变换）
    pub fn with_final(mut self, final_matrix: Matrix4<f32>) -> Self {
        self.final_matrix = final_matrix;
        self
    }

    pub fn object_to_clip_pos(&self, position: &Vector4<f32>) -> Vector4<f32> {
        self.final_matrix * position
    }
}

/// 着色器可见的绘制上下文
#[derive(Clone, Copy)]
pub struct ShaderContext<'a> {
    pub uniforms: &'a Uniforms,
    pub material: &'a Material,
    pub bones: Option<&'a HashMap<String, Bone>>,
    pub transforms: &'a TransformTree,
    pub frame: u64,
}

pub trait VertexShader: Debug {
    /// 物体空间顶点 → 裁剪空间顶点
    fn shade(
        &self,
        vertex: &Vertex,
        out: &mut ClipVertex,
        ctx: &ShaderContext<'_>,
    ) -> Result<(), String>;
}

pub trait FragmentShader: Debug {
    /// 插值后的片元 → 颜色，alpha 为 0 表示丢弃
    fn shade(&self, fragment: &ClipVertex, ctx: &ShaderContext<'_>) -> Color;
}

/// 先蒙皮（若有变形器），再乘以 `P·V·M`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVertexShader;

impl VertexShader for DefaultVertexShader {
    fn shade(
        &self,
        vertex: &Vertex,
        out: &mut ClipVertex,
        ctx: &ShaderContext<'_>,
    ) -> Result<(), String> {
        let position = match (&vertex.deformer, ctx.bones) {
            (Some(deformer), Some(bones)) => {
                deformer.deform(&vertex.position, bones, ctx.transforms, ctx.frame)?
            }
            _ => vertex.position,
        };
        out.position = ctx.uniforms.object_to_clip_pos(&position);
        out.uv = vertex.uv;
        out.normal = vertex.normal;
        Ok(())
    }
}

/// 采样主纹理
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureFragmentShader;

impl FragmentShader for TextureFragmentShader {
    fn shade(&self, fragment: &ClipVertex, ctx: &ShaderContext<'_>) -> Color {
        tex2d(ctx.material.main_tex.as_deref(), &fragment.uv)
    }
}

/// 纹理颜色乘以 Lambert 漫反射
///
/// 法线取物体空间，光照方向也应在物体空间给出。
#[derive(Debug, Clone, Copy)]
pub struct LambertFragmentShader {
    pub light_dir: Vector3<f32>,
    pub ambient: f32,
}

impl LambertFragmentShader {
    pub fn new(light_dir: Vector3<f32>, ambient: f32) -> Self {
        Self {
            light_dir: light_dir.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::y),
            ambient: ambient.clamp(0.0, 1.0),
        }
    }
}

impl FragmentShader for LambertFragmentShader {
    fn shade(&self, fragment: &ClipVertex, ctx: &ShaderContext<'_>) -> Color {
        let base = tex2d(ctx.material.main_tex.as_deref(), &fragment.uv);
        let factor = lambert(&fragment.normal, &self.light_dir);
        base.scaled(self.ambient + (1.0 - self.ambient) * factor)
    }
}

/// 纯色输出，用于线框与调试
#[derive(Debug, Clone, Copy)]
pub struct SolidColorShader(pub Color);

impl FragmentShader for SolidColorShader {
    fn shade(&self, _fragment: &ClipVertex, _ctx: &ShaderContext<'_>) -> Color {
        self.0
    }
}

/// 纹理采样，缺失纹理返回占位色
pub fn tex2d(texture: Option<&Texture>, uv: &Vector2<f32>) -> Color {
    match texture {
        Some(tex) => tex.sample(uv),
        None => Color::MISSING_TEXTURE,
    }
}

/// `max(0, n·(-light_dir))`，`light_dir` 为光线行进方向
pub fn lambert(normal: &Vector3<f32>, light_dir: &Vector3<f32>) -> f32 {
    match normal.try_normalize(f32::EPSILON) {
        Some(n) => n.dot(&-light_dir).max(0.0),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambert_is_clamped() {
        let down = Vector3::new(0.0, -1.0, 0.0);
        assert!((lambert(&Vector3::y(), &down) - 1.0).abs() < 1.0e-6);
        assert_eq!(lambert(&-Vector3::y(), &down), 0.0);
        assert_eq!(lambert(&Vector3::zeros(), &down), 0.0);
    }

    #[test]
    fn missing_texture_uses_placeholder() {
        assert_eq!(tex2d(None, &Vector2::zeros()), Color::MISSING_TEXTURE);
    }

    #[test]
    fn default_vertex_shader_projects_and_copies_attributes() {
        let tree = TransformTree::new();
        let material = Material::default();
        let model = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0));
        let uniforms = Uniforms::new(model, Matrix4::identity(), Matrix4::identity());
        let ctx = ShaderContext {
            uniforms: &uniforms,
            material: &material,
            bones: None,
            transforms: &tree,
            frame: 0,
        };
        let vertex = Vertex::new(Vector3::new(1.0, 2.0, 0.0), Vector2::new(0.25, 0.75), Vector3::z());
        let mut out = ClipVertex::default();
        DefaultVertexShader.shade(&vertex, &mut out, &ctx).unwrap();
        assert_eq!(out.position, Vector4::new(1.0, 2.0, 5.0, 1.0));
        assert_eq!(out.uv, Vector2::new(0.25, 0.75));
        assert_eq!(out.normal, Vector3::z());
    }
}
