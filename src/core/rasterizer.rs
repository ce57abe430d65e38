//! # 三角形光栅化
//!
//! 单线程软件光栅化器：深度测试、透视校正插值、alpha 混合，以及 Bresenham 线段。
//! 所有像素写入都经过 [`Rasterizer::set_pixel`]，越界访问是错误而不是静默忽略。

use crate::core::frame_buffer::FrameBuffer;
use crate::geometry::camera::Camera;
use crate::material_system::color::Color;
use crate::material_system::material::Material;
use crate::material_system::shader::ShaderContext;
use crate::model::mesh::ClipVertex;
use nalgebra::{Point2, Vector2};

/// 针对一个相机的绘制通道，独占帧缓冲
pub struct Rasterizer<'a> {
    frame: &'a mut FrameBuffer,
    camera: &'a Camera,
    /// 最近一次通过深度测试的像素下标及其旧深度
    prev_depth: Option<(usize, f32)>,
}

impl<'a> Rasterizer<'a> {
    pub fn new(frame: &'a mut FrameBuffer, camera: &'a Camera) -> Self {
        Self {
            frame,
            camera,
            prev_depth: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        self.camera
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &*self.frame
    }

    // ===== 像素写入 =====

    /// 写入一个像素
    ///
    /// alpha < 255 且 `blend` 打开时做 src-over 混合；完全透明的颜色不写颜色，
    /// 并把同一像素刚写入的深度恢复为测试前的值。
    pub fn set_pixel(&mut self, p: &Point2<i32>, color: Color, blend: bool) -> Result<(), String> {
        let index = self.frame.index(p.x, p.y)?;
        let prev = self.prev_depth.take();

        let mut color = color;
        if !color.is_opaque() {
            if color.is_clear() {
                if let Some((i, depth)) = prev {
                    if i == index {
                        self.frame.set_depth_at(index, depth);
                    }
                }
                return Ok(());
            }
            if blend {
                let dest = self.frame.color_at(index);
                color = Color::lerp(dest, color, color.a as f32 / 255.0);
            }
        }
        self.frame.set_color_at(index, color);
        Ok(())
    }

    /// 深度测试，较小或相等的深度获胜；通过时写入新深度并记住旧值
    pub fn z_test(&mut self, p: &Point2<i32>, z: f32) -> Result<bool, String> {
        let index = self.frame.index(p.x, p.y)?;
        let current = self.frame.depth_at(index);
        if current >= z {
            self.prev_depth = Some((index, current));
            self.frame.set_depth_at(index, z);
            return Ok(true);
        }
        Ok(false)
    }

    // ===== 2D 调试绘制 =====

    /// 屏幕坐标线段；`clip` 为真时先裁到视口内
    pub fn draw_line_2d(
        &mut self,
        from: Point2<i32>,
        to: Point2<i32>,
        color: Color,
        clip: bool,
    ) -> Result<(), String> {
        let (mut from, mut to) = (from, to);
        if clip && !self.camera.clip_line(&mut from, &mut to) {
            return Ok(());
        }
        bresenham(from, to, |p| self.set_pixel(&p, color, true))
    }

    /// 视口坐标（中心为原点，y 向上）线段，总是裁剪
    pub fn draw_line(
        &mut self,
        from: &Vector2<f32>,
        to: &Vector2<f32>,
        color: Color,
    ) -> Result<(), String> {
        let a = self.camera.world_to_screen(from);
        let b = self.camera.world_to_screen(to);
        self.draw_line_2d(a, b, color, true)
    }

    /// 圆或圆环；圆心为视口坐标，半径四舍五入为整数像素
    pub fn draw_arc_2d(
        &mut self,
        center: &Vector2<f32>,
        radius: f32,
        color: Color,
        fill: bool,
    ) -> Result<(), String> {
        let c = self.camera.world_to_screen(center);
        let (cx, cy) = (c.x as i64, c.y as i64);
        // 平方在 i64 中计算，圆心坐标可能已饱和到 i32 边界
        let r = radius.round().clamp(0.0, i32::MAX as f32) as i64;
        let outer = r * r;
        let inner = (r - 1) * (r - 1);

        let (min, max) = (self.camera.min(), self.camera.max());
        let x_min = (cx - r).max(min.x as i64) as i32;
        let x_max = (cx + r).min(max.x as i64 - 1) as i32;
        let y_min = (cy - r).max(min.y as i64) as i32;
        let y_max = (cy + r).min(max.y as i64 - 1) as i32;

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let (dx, dy) = (x as i64 - cx, y as i64 - cy);
                let sqr_dist = (dx * dx).saturating_add(dy * dy);
                if sqr_dist > outer || (!fill && sqr_dist < inner) {
                    continue;
                }
                self.set_pixel(&Point2::new(x, y), color, true)?;
            }
        }
        Ok(())
    }

    /// 填充矩形 `[min.x, min.x + width) × [min.y, min.y + height)`
    pub fn draw_rect_2d(
        &mut self,
        min: Point2<i32>,
        width: i32,
        height: i32,
        color: Color,
    ) -> Result<(), String> {
        for y in min.y..min.y + height {
            for x in min.x..min.x + width {
                self.set_pixel(&Point2::new(x, y), color, true)?;
            }
        }
        Ok(())
    }

    // ===== 三角形 =====

    /// 光栅化一个三角形
    ///
    /// 开启透视时顶点为裁剪空间坐标，先转换到视口坐标（w 保存 `1/clip.w`）；
    /// 否则顶点已经是视口坐标。
    pub fn draw_triangle(
        &mut self,
        triangle: &[ClipVertex; 3],
        material: &Material,
        ctx: &ShaderContext<'_>,
    ) -> Result<(), String> {
        let mut v = *triangle;
        if material.use_perspective {
            for vertex in v.iter_mut() {
                vertex.position = self.camera.clip_to_viewport(&vertex.position);
            }
        }
        let [pos0, pos1, pos2] = [v[0].position, v[1].position, v[2].position];

        if material.backface_culling {
            let area = (pos1.x - pos0.x) * (pos2.y - pos0.y) - (pos1.y - pos0.y) * (pos2.x - pos0.x);
            if area >= 0.0 {
                return Ok(());
            }
        }

        if material.wireframe {
            let color = material.wireframe_color;
            self.draw_line(&pos0.xy(), &pos1.xy(), color)?;
            self.draw_line(&pos1.xy(), &pos2.xy(), color)?;
            return self.draw_line(&pos2.xy(), &pos0.xy(), color);
        }

        let p0 = self.camera.world_to_screen(&pos0.xy());
        let p1 = self.camera.world_to_screen(&pos1.xy());
        let p2 = self.camera.world_to_screen(&pos2.xy());

        let (min, max) = (self.camera.min(), self.camera.max());
        let x_min = p0.x.min(p1.x).min(p2.x).max(min.x);
        let x_max = p0.x.max(p1.x).max(p2.x).min(max.x - 1);
        let y_min = p0.y.min(p1.y).min(p2.y).max(min.y);
        let y_max = p0.y.max(p1.y).max(p2.y).min(max.y - 1);

        let Some(solver) = Barycentric::new(&p0, &p1, &p2) else {
            return Ok(());
        };

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let point = Point2::new(x, y);
                let Some((mut s, mut t, mut t2)) = solver.solve(&point) else {
                    continue;
                };
                self.prev_depth = None;

                if material.z_test {
                    let z = pos0.z * s + pos1.z * t + pos2.z * t2;
                    if !self.z_test(&point, z)? {
                        continue;
                    }
                }
                if material.use_perspective {
                    let inv_w = 1.0 / (s * pos0.w + t * pos1.w + t2 * pos2.w);
                    s *= inv_w * pos0.w;
                    t *= inv_w * pos1.w;
                    t2 *= inv_w * pos2.w;
                }

                let fragment = ClipVertex {
                    position: pos0 * s + pos1 * t + pos2 * t2,
                    uv: v[0].uv * s + v[1].uv * t + v[2].uv * t2,
                    normal: v[0].normal,
                };
                let color = material.fragment_shader.shade(&fragment, ctx);
                self.set_pixel(&point, color, material.alpha_blend)?;
            }
        }
        Ok(())
    }
}

/// 屏幕三角形的重心系数求解器，`div` 预先取倒数
///
/// 在 f64 中求解：饱和到 i32 边界的顶点坐标相减不会溢出，点积也不会超出范围。
struct Barycentric {
    p2: Point2<f64>,
    u: Vector2<f64>,
    v: Vector2<f64>,
    uu: f64,
    vv: f64,
    uv: f64,
    inv_div: f64,
}

impl Barycentric {
    /// 退化三角形返回 `None`
    fn new(p0: &Point2<i32>, p1: &Point2<i32>, p2: &Point2<i32>) -> Option<Self> {
        let p2 = p2.cast::<f64>();
        let u = p0.cast::<f64>() - p2;
        let v = p1.cast::<f64>() - p2;
        let (uu, vv, uv) = (u.dot(&u), v.dot(&v), u.dot(&v));
        let div = uv * uv - uu * vv;
        // 整数坐标，精确为 0
        if div == 0.0 {
            return None;
        }
        Some(Self {
            p2,
            u,
            v,
            uu,
            vv,
            uv,
            inv_div: 1.0 / div,
        })
    }

    /// 三个系数都落在 `[0, 1]` 时返回 `(s, t, 1 - s - t)`
    fn solve(&self, p: &Point2<i32>) -> Option<(f32, f32, f32)> {
        let d = p.cast::<f64>() - self.p2;
        let (pu, pv) = (d.dot(&self.u), d.dot(&self.v));
        let s = ((pv * self.uv - pu * self.vv) * self.inv_div) as f32;
        let t = ((pu * self.uv - pv * self.uu) * self.inv_div) as f32;
        let t2 = 1.0 - s - t;
        let unit = 0.0..=1.0;
        (unit.contains(&s) && unit.contains(&t) && unit.contains(&t2)).then_some((s, t, t2))
    }
}

/// 屏幕点 `p` 关于三角形 `p0 p1 p2` 的系数 `(s, t, 1 - s - t)`，在三角形外或退化时为 `None`
pub fn barycentric(
    p: &Point2<i32>,
    p0: &Point2<i32>,
    p1: &Point2<i32>,
    p2: &Point2<i32>,
) -> Option<(f32, f32, f32)> {
    Barycentric::new(p0, p1, p2)?.solve(p)
}

/// 整数 Bresenham，两端点都包含在内
pub fn bresenham<F>(from: Point2<i32>, to: Point2<i32>, mut plot: F) -> Result<(), String>
where
    F: FnMut(Point2<i32>) -> Result<(), String>,
{
    // 端点差在 i64 中计算，未裁剪的线段端点可能相距超过 i32 范围
    let w = (to.x as i64 - from.x as i64).abs();
    let h = (to.y as i64 - from.y as i64).abs();
    let dir_x = if to.x >= from.x { 1 } else { -1 };
    let dir_y = if to.y >= from.y { 1 } else { -1 };
    let (mut x, mut y) = (from.x, from.y);

    if w > h {
        let mut d = 2 * h - w;
        for _ in 0..=w {
            plot(Point2::new(x, y))?;
            if d >= 0 {
                d -= 2 * w;
                y = y.wrapping_add(dir_y);
            }
            d += 2 * h;
            x = x.wrapping_add(dir_x);
        }
    } else {
        let mut d = 2 * w - h;
        for _ in 0..=h {
            plot(Point2::new(x, y))?;
            if d >= 0 {
                d -= 2 * h;
                x = x.wrapping_add(dir_x);
            }
            d += 2 * w;
            y = y.wrapping_add(dir_y);
        }
    }
    Ok(())
}
