use crate::material_system::color::Color;
use crate::material_system::shader::{
    DefaultVertexShader, FragmentShader, TextureFragmentShader, VertexShader,
};
use crate::material_system::texture::Texture;
use std::sync::Arc;

/// 材质：渲染状态开关 + 着色器 + 主纹理
///
/// 一个网格可以挂多个材质，每个材质依次覆盖 `triangle_count` 个三角形。
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub main_tex: Option<Arc<Texture>>,

    // ===== 渲染状态 =====
    /// 只画三条边
    pub wireframe: bool,
    pub wireframe_color: Color,
    pub backface_culling: bool,
    /// 经过齐次裁剪与透视除法；关闭时顶点直接视为视口坐标
    pub use_perspective: bool,
    pub z_test: bool,
    /// alpha < 255 时与目标颜色混合
    pub alpha_blend: bool,
    /// 本材质覆盖的三角形数量
    pub triangle_count: usize,

    // ===== 着色器 =====
    pub vertex_shader: Arc<dyn VertexShader>,
    pub fragment_shader: Arc<dyn FragmentShader>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Material".to_string(),
            main_tex: None,
            wireframe: false,
            wireframe_color: Color::BLACK,
            backface_culling: true,
            use_perspective: true,
            z_test: true,
            alpha_blend: true,
            triangle_count: usize::MAX,
            vertex_shader: Arc::new(DefaultVertexShader),
            fragment_shader: Arc::new(TextureFragmentShader),
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_texture(mut self, texture: Arc<Texture>) -> Self {
        self.main_tex = Some(texture);
        self
    }

    pub fn with_fragment_shader(mut self, shader: Arc<dyn FragmentShader>) -> Self {
        self.fragment_shader = shader;
        self
    }

    pub fn with_vertex_shader(mut self, shader: Arc<dyn VertexShader>) -> Self {
        self.vertex_shader = shader;
        self
    }

    /// 线框模式：不做深度测试，也不剔除背面
    pub fn wireframe(name: impl Into<String>, color: Color) -> Self {
        Self {
            wireframe: true,
            wireframe_color: color,
            backface_culling: false,
            z_test: false,
            ..Self::new(name)
        }
    }
}
