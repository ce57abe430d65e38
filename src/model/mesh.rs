use crate::geometry::transform::TransformTree;
use crate::skinning::{Bone, Deformer};
use nalgebra::{Vector2, Vector3, Vector4};
use std::collections::HashMap;

/// 网格顶点（物体空间）
#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: Vector4<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub deformer: Option<Deformer>,
}

impl Vertex {
    pub fn new(position: Vector3<f32>, uv: Vector2<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position: position.push(1.0),
            uv,
            normal,
            deformer: None,
        }
    }

    pub fn with_deformer(mut self, deformer: Deformer) -> Self {
        self.deformer = Some(deformer);
        self
    }
}

/// 着色器输出 / 裁剪与光栅化阶段的工作顶点
///
/// `position` 依阶段不同分别是裁剪空间坐标，或视口坐标（w 为 `1/clip.w`）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipVertex {
    pub position: Vector4<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
}

impl Default for ClipVertex {
    fn default() -> Self {
        Self {
            position: Vector4::new(0.0, 0.0, 0.0, 1.0),
            uv: Vector2::zeros(),
            normal: Vector3::zeros(),
        }
    }
}

impl ClipVertex {
    pub fn new(position: Vector4<f32>) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_uv(mut self, uv: Vector2<f32>) -> Self {
        self.uv = uv;
        self
    }
}

/// 三角形视图：借用网格中的三个顶点
#[derive(Debug, Clone, Copy)]
pub struct TriangleRef<'a> {
    pub vertices: [&'a Vertex; 3],
}

/// 三角网格，索引每 3 个构成一个三角形
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bones: HashMap<String, Bone>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            bones: HashMap::new(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 第 `index` 个三角形，索引越界时返回错误
    pub fn triangle(&self, index: usize) -> Result<TriangleRef<'_>, String> {
        let base = index * 3;
        let corners = self
            .indices
            .get(base..base + 3)
            .ok_or_else(|| format!("三角形 {} 超出网格 '{}' 范围", index, self.name))?;
        let fetch = |i: u32| {
            self.vertices.get(i as usize).ok_or_else(|| {
                format!("网格 '{}' 的顶点索引 {} 越界", self.name, i)
            })
        };
        Ok(TriangleRef {
            vertices: [fetch(corners[0])?, fetch(corners[1])?, fetch(corners[2])?],
        })
    }

    pub fn add_bone(&mut self, name: impl Into<String>, bone: Bone) {
        self.bones.insert(name.into(), bone);
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(name)
    }

    /// 打印骨骼层级：从没有父骨骼的骨骼开始逐个展开
    pub fn bone_hierarchy(&self, tree: &TransformTree) -> String {
        let mut names: Vec<&String> = self.bones.keys().collect();
        names.sort();
        let mut out = String::new();
        for name in names {
            let id = self.bones[name].transform();
            let parent_is_bone = tree
                .parent(id)
                .is_some_and(|p| self.bones.values().any(|b| b.transform() == p));
            if !parent_is_bone {
                out.push_str(&tree.hierarchy(id));
            }
        }
        out
    }

    /// 按面法线面积加权生成平滑顶点法线
    pub fn recompute_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= normals.len() || b >= normals.len() || c >= normals.len() {
                continue;
            }
            let p0 = self.vertices[a].position.xyz();
            let face = (self.vertices[b].position.xyz() - p0)
                .cross(&(self.vertices[c].position.xyz() - p0));
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal.try_normalize(1.0e-12).unwrap_or_else(Vector3::y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        let v = |x: f32, y: f32| Vertex::new(Vector3::new(x, y, 0.0), Vector2::new(x, y), Vector3::z());
        Mesh::new(
            "quad",
            vec![v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn triangles_borrow_vertices() {
        let mesh = quad();
        assert_eq!(mesh.triangle_count(), 2);
        let tri = mesh.triangle(1).unwrap();
        assert_eq!(tri.vertices[2].uv, Vector2::new(0.0, 1.0));
        assert!(mesh.triangle(2).is_err());
    }

    #[test]
    fn bad_index_is_reported() {
        let mut mesh = quad();
        mesh.indices[4] = 99;
        assert!(mesh.triangle(1).is_err());
    }

    #[test]
    fn recomputed_normals_face_out_of_ccw_winding() {
        let mut mesh = quad();
        mesh.vertices.iter_mut().for_each(|v| v.normal = Vector3::zeros());
        mesh.recompute_normals();
        for v in &mesh.vertices {
            assert!((v.normal - Vector3::z()).norm() < 1.0e-6);
        }
    }

    #[test]
    fn bone_hierarchy_starts_at_root_bones() {
        let mut tree = TransformTree::new();
        let hip = tree.create("hip");
        let knee = tree.create("knee");
        tree.add_child(hip, knee).unwrap();
        let mut mesh = quad();
        mesh.add_bone("hip", Bone::new(hip));
        mesh.add_bone("knee", Bone::new(knee));
        assert_eq!(mesh.bone_hierarchy(&tree), "hip\n  knee\n");
    }
}
