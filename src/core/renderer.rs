use crate::core::clipper::Clipper;
use crate::core::rasterizer::Rasterizer;
use crate::geometry::transform::TransformTree;
use crate::material_system::color::Color;
use crate::material_system::material::Material;
use crate::material_system::shader::{ShaderContext, Uniforms};
use crate::math::quaternion::from_to;
use crate::model::mesh::{ClipVertex, Mesh};
use crate::model::primitives::bone_mesh;
use nalgebra::{Matrix4, Vector3};

/// 一个相机一次绘制所需的可变状态
pub struct RenderPass<'a> {
    pub rasterizer: Rasterizer<'a>,
    pub clipper: &'a mut Clipper,
    pub transforms: &'a TransformTree,
    pub frame: u64,
}

/// 网格渲染器：网格 + 按三角形区间划分的材质
///
/// 第 i 个材质覆盖紧接在前一个材质之后的 `triangle_count` 个三角形；
/// 超出所有材质覆盖范围的三角形不绘制。
#[derive(Debug, Clone)]
pub struct MeshRenderer {
    pub mesh: Option<Mesh>,
    pub materials: Vec<Material>,
    /// 同时绘制骨骼
    pub bone_visible: bool,
    bone_mesh: Mesh,
    bone_material: Material,
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self {
            mesh: None,
            materials: vec![Material::default()],
            bone_visible: false,
            bone_mesh: bone_mesh(),
            bone_material: Material::wireframe("bone", Color::YELLOW),
        }
    }
}

impl MeshRenderer {
    pub fn new(mesh: Mesh, material: Material) -> Self {
        Self {
            mesh: Some(mesh),
            materials: vec![material],
            ..Self::default()
        }
    }

    /// 第一个子网格的材质
    pub fn material(&self) -> Option<&Material> {
        self.materials.first()
    }

    pub fn material_mut(&mut self) -> Option<&mut Material> {
        self.materials.first_mut()
    }

    pub fn set_bone_color(&mut self, color: Color) {
        self.bone_material.wireframe_color = color;
    }

    /// 绘制整个网格，`bone_visible` 时再叠加骨骼
    pub fn render_mesh(&self, pass: &mut RenderPass<'_>, uniforms: &Uniforms) -> Result<(), String> {
        self.render_range(pass, uniforms, 0, usize::MAX)
    }

    /// 只绘制 `[start, start + count)` 范围内的三角形
    pub fn render_range(
        &self,
        pass: &mut RenderPass<'_>,
        uniforms: &Uniforms,
        start: usize,
        count: usize,
    ) -> Result<(), String> {
        let Some(mesh) = &self.mesh else {
            return Ok(());
        };
        let end = start.saturating_add(count).min(mesh.triangle_count());

        let mut submesh_begin = 0usize;
        for material in &self.materials {
            let submesh_end = submesh_begin.saturating_add(material.triangle_count);
            let lo = submesh_begin.max(start);
            let hi = submesh_end.min(end);
            if lo < hi {
                draw_triangles(pass, mesh, material, uniforms, lo..hi)?;
            }
            if submesh_end >= end {
                break;
            }
            submesh_begin = submesh_end;
        }

        if self.bone_visible {
            self.render_bones(pass, mesh, uniforms)?;
        }
        Ok(())
    }

    /// 每根有父节点的骨骼画成一个从自身指向父节点的八面体线框
    fn render_bones(
        &self,
        pass: &mut RenderPass<'_>,
        mesh: &Mesh,
        uniforms: &Uniforms,
    ) -> Result<(), String> {
        let tree = pass.transforms;
        let mut names: Vec<&String> = mesh.bones.keys().collect();
        names.sort();

        for name in names {
            let id = mesh.bones[name].transform();
            let Some(parent) = tree.parent(id) else {
                continue;
            };
            let p0 = tree.get(id).position();
            let p1 = tree.get(parent).position();
            let dir = p1 - p0;
            let size = dir.norm();

            let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(size * 0.1, size, size * 0.1));
            let mut tr = from_to(&Vector3::y(), &dir).to_homogeneous();
            tr.fixed_view_mut::<3, 1>(0, 3).copy_from(&p0);

            let bone_uniforms = uniforms.with_final(uniforms.final_matrix * tr * scale);
            let range = 0..self.bone_mesh.triangle_count();
            draw_triangles(pass, &self.bone_mesh, &self.bone_material, &bone_uniforms, range)?;
        }
        Ok(())
    }
}

/// 顶点着色 → 齐次裁剪（开启透视时）→ 光栅化
fn draw_triangles(
    pass: &mut RenderPass<'_>,
    mesh: &Mesh,
    material: &Material,
    uniforms: &Uniforms,
    range: std::ops::Range<usize>,
) -> Result<(), String> {
    let ctx = ShaderContext {
        uniforms,
        material,
        bones: (!mesh.bones.is_empty()).then_some(&mesh.bones),
        transforms: pass.transforms,
        frame: pass.frame,
    };

    for i in range {
        let triangle = mesh.triangle(i)?;
        let mut out = [ClipVertex::default(); 3];
        for (vertex, slot) in triangle.vertices.iter().zip(out.iter_mut()) {
            material.vertex_shader.shade(vertex, slot, &ctx)?;
        }

        if material.use_perspective {
            for clipped in pass.clipper.clip(out) {
                pass.rasterizer.draw_triangle(&clipped.vertices, material, &ctx)?;
            }
        } else {
            pass.rasterizer.draw_triangle(&out, material, &ctx)?;
        }
    }
    Ok(())
}
