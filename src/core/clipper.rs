//! 齐次裁剪空间中的三角形裁剪
//!
//! 依次对近、远、下、上、左、右六个平面裁剪。每个工作三角形记录下一个待测平面，
//! 新拆出的三角形从当前平面的下一个开始测试，因此边界上的浮点抖动不会造成死循环。

use crate::model::mesh::ClipVertex;
use nalgebra::Vector4;

/// 视锥裁剪面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPlane {
    /// `-w <= z`
    Near,
    /// `z <= w`
    Far,
    /// `-w <= y`
    Bottom,
    /// `y <= w`
    Top,
    /// `-w <= x`
    Left,
    /// `x <= w`
    Right,
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Near,
        ClipPlane::Far,
        ClipPlane::Bottom,
        ClipPlane::Top,
        ClipPlane::Left,
        ClipPlane::Right,
    ];

    /// 有符号距离，非负即在内侧
    #[inline]
    pub fn distance(self, p: &Vector4<f32>) -> f32 {
        match self {
            ClipPlane::Near => p.w + p.z,
            ClipPlane::Far => p.w - p.z,
            ClipPlane::Bottom => p.w + p.y,
            ClipPlane::Top => p.w - p.y,
            ClipPlane::Left => p.w + p.x,
            ClipPlane::Right => p.w - p.x,
        }
    }

    #[inline]
    pub fn contains(self, p: &Vector4<f32>) -> bool {
        self.distance(p) >= 0.0
    }

    /// 线段 `from → to` 与平面交点的参数 `s`
    pub fn intersect_param(self, from: &Vector4<f32>, to: &Vector4<f32>) -> f32 {
        let d0 = self.distance(from);
        let d1 = self.distance(to);
        d0 / (d0 - d1)
    }

    /// 交点：位置、uv 与法线都按同一个 `s` 插值
    pub fn intersect(self, from: &ClipVertex, to: &ClipVertex) -> ClipVertex {
        let s = self.intersect_param(&from.position, &to.position);
        ClipVertex {
            position: from.position.lerp(&to.position, s),
            uv: from.uv.lerp(&to.uv, s),
            normal: from.normal.lerp(&to.normal, s),
        }
    }
}

/// 裁剪工作三角形
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipTriangle {
    pub vertices: [ClipVertex; 3],
    next_plane: usize,
}

impl ClipTriangle {
    pub fn new(vertices: [ClipVertex; 3]) -> Self {
        Self {
            vertices,
            next_plane: 0,
        }
    }

    pub fn next_plane(&self) -> usize {
        self.next_plane
    }
}

/// 可复用的裁剪器，内部缓冲在多次调用间保留容量
///
/// 一次 `clip` 的输出必须在下一次调用前用完。
#[derive(Debug, Default)]
pub struct Clipper {
    triangles: Vec<ClipTriangle>,
}

impl Clipper {
    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    /// 对六个视锥平面裁剪
    pub fn clip(&mut self, triangle: [ClipVertex; 3]) -> &[ClipTriangle] {
        self.clip_against(triangle, &ClipPlane::ALL)
    }

    /// 按给定顺序对若干平面裁剪
    pub fn clip_against(&mut self, triangle: [ClipVertex; 3], planes: &[ClipPlane]) -> &[ClipTriangle] {
        self.triangles.clear();
        self.triangles.push(ClipTriangle::new(triangle));

        let mut i = 0;
        while i < self.triangles.len() {
            if self.clip_slot(i, planes) {
                i += 1;
            }
        }
        &self.triangles
    }

    /// 处理第 `i` 个工作三角形；三角形被整体丢弃时返回 `false`，
    /// 此时换入该位置的三角形需要重新处理
    fn clip_slot(&mut self, i: usize, planes: &[ClipPlane]) -> bool {
        let mut j = self.triangles[i].next_plane;
        while j < planes.len() {
            let plane = planes[j];
            let tri = &mut self.triangles[i];
            let inside = tri.vertices.map(|v| plane.contains(&v.position));
            let count = inside.iter().filter(|&&b| b).count();

            match count {
                0 => {
                    self.triangles.swap_remove(i);
                    return false;
                }
                1 => {
                    // 内侧顶点转到 0 号位
                    let k = inside.iter().position(|&b| b).unwrap_or(0);
                    tri.vertices.rotate_left(k);
                    let [v0, v1, v2] = tri.vertices;
                    tri.vertices[1] = plane.intersect(&v0, &v1);
                    tri.vertices[2] = plane.intersect(&v0, &v2);
                }
                2 => {
                    // 外侧顶点转到 1 号位，四边形 {v0, p01, p21, v2} 拆成两个三角形
                    let k = inside.iter().position(|&b| !b).unwrap_or(1);
                    tri.vertices.rotate_left((k + 2) % 3);
                    let [v0, v1, v2] = tri.vertices;
                    let p01 = plane.intersect(&v0, &v1);
                    let p21 = plane.intersect(&v2, &v1);
                    tri.vertices[1] = p01;
                    self.triangles.push(ClipTriangle {
                        vertices: [p01, p21, v2],
                        next_plane: j + 1,
                    });
                }
                _ => {}
            }
            j += 1;
            self.triangles[i].next_plane = j;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Vector2, Vector3};

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
        ClipVertex::new(Vector4::new(x, y, z, w)).with_uv(Vector2::new(x, y))
    }

    fn area_2d(tri: &[ClipVertex; 3]) -> f32 {
        let [a, b, c] = tri.map(|v| v.position.xy());
        ((b - a).perp(&(c - a)) * 0.5).abs()
    }

    #[test]
    fn triangle_behind_one_plane_is_dropped() {
        let mut clipper = Clipper::new();
        // 三个顶点都在右平面外侧
        let tri = [vertex(2.0, 0.0, 0.0, 1.0), vertex(3.0, 0.5, 0.0, 1.0), vertex(2.5, -0.5, 0.2, 1.0)];
        assert!(clipper.clip(tri).is_empty());
        // 全部在近平面之前
        let tri = [vertex(0.0, 0.0, -2.0, 1.0), vertex(0.1, 0.0, -3.0, 1.0), vertex(0.0, 0.1, -2.5, 1.0)];
        assert!(clipper.clip(tri).is_empty());
    }

    #[test]
    fn triangle_inside_frustum_is_unchanged() {
        let mut clipper = Clipper::new();
        let tri = [vertex(-0.5, -0.5, 0.1, 1.0), vertex(0.5, -0.5, 0.2, 1.0), vertex(0.0, 0.5, 0.3, 1.0)];
        let out = clipper.clip(tri);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].vertices, tri);
    }

    #[test]
    fn inside_count_decides_split() {
        let mut clipper = Clipper::new();
        let tri = [vertex(0.0, 0.0, 0.0, 1.0), vertex(3.0, 0.0, 0.0, 1.0), vertex(0.0, 0.5, 0.0, 1.0)];
        let planes = [ClipPlane::Right];
        let out = clipper.clip_against(tri, &planes);
        // 只有 v1 在外：两个内侧顶点 → 两个三角形
        assert_eq!(out.len(), 2);

        let tri = [vertex(0.0, 0.0, 0.0, 1.0), vertex(3.0, 0.0, 0.0, 1.0), vertex(3.0, 2.0, 0.0, 1.0)];
        let out = clipper.clip_against(tri, &planes);
        assert_eq!(out.len(), 1);
        for v in &out[0].vertices {
            assert!(v.position.x <= 1.0 + 1.0e-6);
        }
        // uv 与位置同步插值
        assert!((out[0].vertices[1].uv - out[0].vertices[1].position.xy()).norm() < 1.0e-6);
    }

    #[test]
    fn outputs_lie_inside_clip_cube() {
        let mut clipper = Clipper::new();
        // 覆盖整个视口的大三角形，裁剪后恰为 [-1,1]² 正方形
        let tri = [vertex(-5.0, -5.0, 0.0, 1.0), vertex(5.0, -5.0, 0.0, 1.0), vertex(0.0, 5.0, 0.0, 1.0)];
        let out = clipper.clip(tri);
        let area: f32 = out.iter().map(|t| area_2d(&t.vertices)).sum();
        assert!((area - 4.0).abs() < 1.0e-4, "{}", area);

        let tri = [vertex(-5.0, -5.0, -0.5, 1.0), vertex(5.0, -5.0, 0.5, 1.0), vertex(0.0, 5.0, 2.5, 1.0)];
        let out = clipper.clip(tri);
        assert!(!out.is_empty());
        for t in out {
            for v in &t.vertices {
                for plane in ClipPlane::ALL {
                    assert!(plane.distance(&v.position) >= -1.0e-4, "{:?} {:?}", plane, v.position);
                }
            }
        }
    }

    #[test]
    fn single_plane_clip_preserves_area() {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut clipper = Clipper::new();
        for _ in 0..200 {
            let tri = [0, 1, 2].map(|_| {
                vertex(rng.random_range(-3.0..3.0), rng.random_range(-3.0..3.0), 0.0, 1.0)
            });
            let expected = clipped_area(&tri, 1.0);
            let total: f32 = clipper
                .clip_against(tri, &[ClipPlane::Right])
                .iter()
                .map(|t| area_2d(&t.vertices))
                .sum();
            assert!((total - expected).abs() < 1.0e-3, "{} vs {}", total, expected);
        }
    }

    #[test]
    fn intersection_interpolates_normal() {
        let mut from = vertex(0.0, 0.0, 0.0, 1.0);
        from.normal = Vector3::x();
        let mut to = vertex(3.0, 0.5, 0.0, 1.0);
        to.normal = Vector3::y();
        let p = ClipPlane::Right.intersect(&from, &to);
        // s = 1/3
        assert!((p.position - Vector4::new(1.0, 0.5 / 3.0, 0.0, 1.0)).norm() < 1.0e-6);
        assert!((p.normal - Vector3::new(2.0 / 3.0, 1.0 / 3.0, 0.0)).norm() < 1.0e-6);
    }

    #[test]
    fn near_plane_clip_matches_homogeneous_cut() {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut clipper = Clipper::new();
        for _ in 0..200 {
            // 顶点 z 取值在 -w 两侧，w 各不相同
            let tri = [0, 1, 2].map(|_| {
                let w = rng.random_range(0.5..4.0);
                vertex(
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-6.0..2.0),
                    w,
                )
            });
            let out = clipper.clip_against(tri, &[ClipPlane::Near]);
            let expected = near_cut_area(&tri);
            let total: f32 = out.iter().map(|t| area_xz(&t.vertices)).sum();
            assert!((total - expected).abs() < 1.0e-3 * expected.max(1.0), "{} vs {}", total, expected);
            for t in out {
                for v in &t.vertices {
                    assert!(ClipPlane::Near.distance(&v.position) >= -1.0e-4);
                }
            }
        }
    }

    /// 三角形在 (x, z + w) 平面上的面积，近平面即 `z + w = 0` 这条直线
    fn area_xz(tri: &[ClipVertex; 3]) -> f32 {
        let [a, b, c] = tri.map(|v| Vector2::new(v.position.x, v.position.z + v.position.w));
        ((b - a).perp(&(c - a)) * 0.5).abs()
    }

    /// 在 (x, z + w) 平面上保留 `z + w >= 0` 的部分
    fn near_cut_area(tri: &[ClipVertex; 3]) -> f32 {
        let flipped = tri.map(|v| {
            let mut out = v;
            // 映射为 x' = -(z + w)，复用 x' <= 0 的裁剪面积
            out.position = Vector4::new(-(v.position.z + v.position.w), v.position.x, 0.0, 1.0);
            out
        });
        clipped_area(&flipped, 0.0)
    }

    /// 参考实现：Sutherland–Hodgman 裁到 x <= limit 的多边形面积
    fn clipped_area(tri: &[ClipVertex; 3], limit: f32) -> f32 {
        let pts: Vec<_> = tri.iter().map(|v| v.position.xy()).collect();
        let mut poly = Vec::new();
        for i in 0..3 {
            let a = pts[i];
            let b = pts[(i + 1) % 3];
            let (ia, ib) = (a.x <= limit, b.x <= limit);
            if ia {
                poly.push(a);
            }
            if ia != ib {
                let s = (limit - a.x) / (b.x - a.x);
                poly.push(a + (b - a) * s);
            }
        }
        if poly.len() < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for i in 0..poly.len() {
            let a = poly[i];
            let b = poly[(i + 1) % poly.len()];
            twice += a.x * b.y - b.x * a.y;
        }
        twice.abs() * 0.5
    }
}
