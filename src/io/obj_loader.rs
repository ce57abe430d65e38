use crate::model::mesh::{Mesh, Vertex};
use log::{debug, info, warn};
use nalgebra::{Vector2, Vector3};
use std::io::BufRead;
use std::path::Path;

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,  // 将所有面转换为三角形
        single_index: true, // 位置/纹理坐标/法线共用一套索引
        ignore_points: true,
        ignore_lines: true,
    }
}

/// 加载 OBJ 文件为单个网格，多个对象按顺序合并；MTL 材质被忽略
pub fn load_obj_mesh<P: AsRef<Path>>(obj_path: P) -> Result<Mesh, String> {
    let obj_path_ref = obj_path.as_ref();
    info!("加载 OBJ 文件: {:?}", obj_path_ref);

    let (models, _materials) = tobj::load_obj(obj_path_ref, &load_options())
        .map_err(|e| format!("加载 OBJ 失败: {}", e))?;

    let name = obj_path_ref
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("obj")
        .to_string();
    build_mesh(name, models)
}

/// 从内存读取 OBJ 文本，材质库引用一律忽略
pub fn load_obj_from_reader<R: BufRead>(name: &str, reader: &mut R) -> Result<Mesh, String> {
    let (models, _materials) =
        tobj::load_obj_buf(reader, &load_options(), |_| Err(tobj::LoadError::OpenFileFailed))
            .map_err(|e| format!("解析 OBJ 失败: {}", e))?;
    build_mesh(name.to_string(), models)
}

fn build_mesh(name: String, models: Vec<tobj::Model>) -> Result<Mesh, String> {
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut missing_normals = false;

    for model in models {
        let mesh = model.mesh;
        if mesh.indices.is_empty() {
            debug!("跳过没有索引的网格 '{}'", model.name);
            continue;
        }

        let has_normals = mesh.normals.len() == mesh.positions.len();
        let has_texcoords = mesh.texcoords.len() / 2 == mesh.positions.len() / 3;
        missing_normals |= !has_normals;
        if !has_texcoords {
            debug!("网格 '{}' 缺少纹理坐标，纹理映射可能不正确", model.name);
        }

        let base = vertices.len() as u32;
        for (i, p) in mesh.positions.chunks_exact(3).enumerate() {
            let normal = if has_normals {
                Vector3::new(
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                )
                .try_normalize(1e-12)
                .unwrap_or_else(Vector3::y)
            } else {
                Vector3::zeros()
            };
            // OBJ 的 v 轴向上，纹理原点在左上角
            let uv = if has_texcoords {
                Vector2::new(mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1])
            } else {
                Vector2::zeros()
            };
            vertices.push(Vertex::new(Vector3::new(p[0], p[1], p[2]), uv, normal));
        }

        let count = (mesh.positions.len() / 3) as u32;
        for &index in &mesh.indices {
            if index >= count {
                return Err(format!(
                    "网格 '{}' 的索引 {} 超出顶点数 {}",
                    model.name, index, count
                ));
            }
            indices.push(base + index);
        }
    }

    if indices.is_empty() {
        return Err(format!("OBJ '{}' 中没有可用的三角形", name));
    }

    let mut mesh = Mesh::new(name, vertices, indices);
    if missing_normals {
        warn!("网格 '{}' 缺少法线，计算平滑顶点法线", mesh.name);
        mesh.recompute_normals();
    }
    info!(
        "创建网格 '{}' 成功：{} 个顶点，{} 个三角形",
        mesh.name,
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// 平移到包围盒中心并缩放，使最长边为 `target_extent`，返回 (原中心, 缩放系数)
pub fn normalize_and_center(mesh: &mut Mesh, target_extent: f32) -> (Vector3<f32>, f32) {
    let mut positions = mesh.vertices.iter().map(|v| v.position.xyz());
    let Some(first) = positions.next() else {
        return (Vector3::zeros(), 1.0);
    };
    let (min, max) = positions.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)));

    let center = (min + max) * 0.5;
    let extent = max - min;
    let max_extent = extent.x.max(extent.y).max(extent.z);
    let scale_factor = if max_extent > 1e-6 {
        target_extent / max_extent
    } else {
        1.0
    };

    for vertex in &mut mesh.vertices {
        let p = (vertex.position.xyz() - center) * scale_factor;
        vertex.position = p.push(1.0);
    }
    (center, scale_factor)
}
