use crate::geometry::pose::Pose;
use crate::geometry::transform::Transform;
use crate::math::{DEG2RAD, safe_w};
use nalgebra::{Matrix4, Point2, UnitQuaternion, Vector2, Vector3, Vector4};

/// 设备像素坐标下的视口矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 覆盖整个设备的视口
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// 限制在 `width × height` 的设备范围内
    pub fn clamped(&self, width: usize, height: usize) -> Self {
        let (dw, dh) = (width as i32, height as i32);
        let x = self.x.clamp(0, dw);
        let y = self.y.clamp(0, dh);
        Self {
            x,
            y,
            width: self.width.clamp(0, dw - x),
            height: self.height.clamp(0, dh - y),
        }
    }

    pub fn contains(&self, p: &Point2<i32>) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// 透视相机：持有自身变换、视口与投影参数
///
/// 观察空间约定相机朝向 +Z，投影后 `clip.w` 等于观察空间深度。
#[derive(Debug, Clone)]
pub struct Camera {
    /// 垂直视场角（角度制）
    pub fov: f32,
    /// 近裁剪面距离
    pub z_near: f32,
    /// 远裁剪面距离
    pub z_far: f32,
    /// 视口（设备像素）
    viewport: Viewport,
    /// 相机的世界变换，不参与场景层级
    transform: Transform,
}

impl Camera {
    pub fn new(name: impl Into<String>, viewport: Viewport) -> Self {
        Self {
            fov: 90.0,
            z_near: 10.0,
            z_far: 100.0,
            viewport,
            transform: Transform::new(name),
        }
    }

    pub fn with_projection(mut self, fov: f32, z_near: f32, z_far: f32) -> Self {
        self.fov = fov;
        self.z_near = z_near;
        self.z_far = z_far;
        self
    }

    pub fn name(&self) -> &str {
        &self.transform.name
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// 把相机放到 `eye`，令 +Z 朝向 `target`
    pub fn look_at(&mut self, eye: Vector3<f32>, target: Vector3<f32>, up: Vector3<f32>) {
        let dir = target - eye;
        let rotation = if dir.norm_squared() > f32::EPSILON {
            UnitQuaternion::face_towards(&dir, &up)
        } else {
            UnitQuaternion::identity()
        };
        self.transform
            .set_pose(Pose::from_rotation_position(rotation, eye));
    }

    // ===== 视口 =====

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// 设置视口并裁到设备分辨率内
    pub fn set_viewport(&mut self, viewport: Viewport, resolution: (usize, usize)) {
        self.viewport = viewport.clamped(resolution.0, resolution.1);
    }

    /// 高宽比 `height / width`
    pub fn aspect_ratio(&self) -> f32 {
        self.viewport.height as f32 / self.viewport.width as f32
    }

    pub fn min(&self) -> Point2<i32> {
        Point2::new(self.viewport.x, self.viewport.y)
    }

    pub fn max(&self) -> Point2<i32> {
        Point2::new(
            self.viewport.x + self.viewport.width,
            self.viewport.y + self.viewport.height,
        )
    }

    // ===== 矩阵 =====

    /// 世界 → 相机
    pub fn view(&self) -> Matrix4<f32> {
        self.transform.inv_trs()
    }

    /// 对称透视投影，z 从 `[z_near, z_far]` 映射到 NDC `[-1, 1]`
    pub fn perspective(&self) -> Matrix4<f32> {
        let d = 1.0 / (self.fov * 0.5 * DEG2RAD).tan();
        let a = self.aspect_ratio();
        let (n, f) = (self.z_near, self.z_far);
        let big_a = -(n + f) / (n - f);
        let big_b = f - big_a * f;
        #[rustfmt::skip]
        let m = Matrix4::new(
            d * a, 0.0, 0.0,   0.0,
            0.0,   d,   0.0,   0.0,
            0.0,   0.0, big_a, big_b,
            0.0,   0.0, 1.0,   0.0,
        );
        m
    }

    pub fn view_perspective(&self) -> Matrix4<f32> {
        self.perspective() * self.view()
    }

    // ===== 坐标转换 =====

    /// 齐次除法，w 为 0 时以 ε 代替
    pub fn clip_to_ndc(&self, p: &Vector4<f32>) -> Vector4<f32> {
        p / safe_w(p.w)
    }

    pub fn ndc_to_viewport(&self, p: &Vector4<f32>) -> Vector4<f32> {
        Vector4::new(
            p.x * self.viewport.width as f32 * 0.5,
            p.y * self.viewport.height as f32 * 0.5,
            p.z,
            p.w,
        )
    }

    /// 裁剪空间 → 以视口中心为原点的坐标，w 分量保存 `1/clip.w`
    pub fn clip_to_viewport(&self, p: &Vector4<f32>) -> Vector4<f32> {
        let inv_w = 1.0 / safe_w(p.w);
        Vector4::new(
            p.x * inv_w * self.viewport.width as f32 * 0.5,
            p.y * inv_w * self.viewport.height as f32 * 0.5,
            p.z * inv_w,
            inv_w,
        )
    }

    /// 视口中心坐标（y 向上）→ 设备像素（y 向下），四舍五入为整数
    pub fn world_to_screen(&self, p: &Vector2<f32>) -> Point2<i32> {
        let vp = &self.viewport;
        Point2::new(
            (vp.x as f32 + p.x + vp.width as f32 * 0.5).round() as i32,
            (vp.y as f32 - p.y + vp.height as f32 * 0.5).round() as i32,
        )
    }

    pub fn screen_to_world(&self, p: &Point2<i32>) -> Vector3<f32> {
        let vp = &self.viewport;
        Vector3::new(
            p.x as f32 - vp.width as f32 * 0.5 - vp.x as f32,
            -(p.y as f32 - vp.height as f32 * 0.5 - vp.y as f32),
            0.0,
        )
    }

    /// 把屏幕线段裁到视口内，端点原地改写并重新取整
    ///
    /// 两端点严格位于同一边界外侧时直接剔除，恰好落在边界上的线段保留。
    /// 裁剪后仍有端点落在视口外（线段从角外擦过）同样返回 `false`：
    /// 返回 `true` 的端点会被逐像素写入，越界写入是致命错误。
    pub fn clip_line(&self, from: &mut Point2<i32>, to: &mut Point2<i32>) -> bool {
        let bounds = ClipBounds {
            x_min: self.viewport.x as f32,
            x_max: (self.viewport.x + self.viewport.width - 1) as f32,
            y_min: self.viewport.y as f32,
            y_max: (self.viewport.y + self.viewport.height - 1) as f32,
        };
        let mut a = Vector2::new(from.x as f32, from.y as f32);
        let mut b = Vector2::new(to.x as f32, to.y as f32);

        if (a.x < bounds.x_min && b.x < bounds.x_min)
            || (a.x > bounds.x_max && b.x > bounds.x_max)
            || (a.y < bounds.y_min && b.y < bounds.y_min)
            || (a.y > bounds.y_max && b.y > bounds.y_max)
        {
            return false;
        }

        bounds.clamp_endpoint(&mut b, &a);
        bounds.clamp_endpoint(&mut a, &b);

        *from = Point2::new(a.x.round() as i32, a.y.round() as i32);
        *to = Point2::new(b.x.round() as i32, b.y.round() as i32);
        self.viewport.contains(from) && self.viewport.contains(to)
    }
}

struct ClipBounds {
    x_min: f32,
    x_max: f32,
    y_min: f32,
    y_max: f32,
}

impl ClipBounds {
    /// 沿 `anchor → p` 方向把 `p` 依次推回右、左、上、下边界
    fn clamp_endpoint(&self, p: &mut Vector2<f32>, anchor: &Vector2<f32>) {
        if p.x > self.x_max {
            Self::snap(p, anchor, 0, self.x_max);
        }
        if p.x < self.x_min {
            Self::snap(p, anchor, 0, self.x_min);
        }
        if p.y < self.y_min {
            Self::snap(p, anchor, 1, self.y_min);
        }
        if p.y > self.y_max {
            Self::snap(p, anchor, 1, self.y_max);
        }
    }

    /// `s = (boundary - a) / (c - a)`
    fn snap(p: &mut Vector2<f32>, anchor: &Vector2<f32>, axis: usize, boundary: f32) {
        let delta = p[axis] - anchor[axis];
        if delta.abs() <= f32::EPSILON {
            return;
        }
        let s = (boundary - anchor[axis]) / delta;
        *p = anchor.lerp(p, s);
        p[axis] = boundary;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_4x4() -> Camera {
        Camera::new("main", Viewport::new(0, 0, 4, 4)).with_projection(90.0, 1.0, 100.0)
    }

    #[test]
    fn perspective_maps_near_and_far_to_ndc_bounds() {
        let cam = camera_4x4();
        let p = cam.perspective();
        let near = cam.clip_to_ndc(&(p * Vector4::new(0.0, 0.0, 1.0, 1.0)));
        let far = cam.clip_to_ndc(&(p * Vector4::new(0.0, 0.0, 100.0, 1.0)));
        assert!((near.z + 1.0).abs() < 1.0e-5);
        assert!((far.z - 1.0).abs() < 1.0e-5);
        // w 等于观察空间深度
        let clip = p * Vector4::new(1.0, 2.0, 7.0, 1.0);
        assert_eq!(clip.w, 7.0);
    }

    #[test]
    fn clip_to_viewport_keeps_inverse_w() {
        let cam = camera_4x4();
        let v = cam.clip_to_viewport(&Vector4::new(1.0, -1.0, 0.5, 2.0));
        assert_eq!(v, Vector4::new(1.0, -1.0, 0.25, 0.5));
        let ndc = cam.clip_to_ndc(&Vector4::new(1.0, -1.0, 0.5, 2.0));
        assert_eq!(cam.ndc_to_viewport(&ndc).xy(), v.xy());
        assert!(cam.clip_to_ndc(&Vector4::new(1.0, 0.0, 0.0, 0.0)).x.is_finite());
    }

    #[test]
    fn world_screen_round_trip() {
        let mut cam = camera_4x4();
        cam.set_viewport(Viewport::new(2, 1, 6, 4), (10, 10));
        let screen = cam.world_to_screen(&Vector2::new(-1.0, 1.0));
        assert_eq!(screen, Point2::new(4, 2));
        let back = cam.screen_to_world(&screen);
        assert_eq!(back, Vector3::new(-1.0, 1.0, 0.0));
    }

    #[test]
    fn set_viewport_clamps_to_device() {
        let mut cam = camera_4x4();
        cam.set_viewport(Viewport::new(-5, 3, 100, 100), (8, 6));
        assert_eq!(cam.viewport(), Viewport::new(0, 3, 8, 3));
        assert_eq!(cam.min(), Point2::new(0, 3));
        assert_eq!(cam.max(), Point2::new(8, 6));
        assert!((cam.aspect_ratio() - 3.0 / 8.0).abs() < 1.0e-6);
    }

    #[test]
    fn clip_line_rejects_segments_outside_one_edge() {
        let cam = Camera::new("c", Viewport::new(0, 0, 10, 10));
        let mut a = Point2::new(-5, 2);
        let mut b = Point2::new(-1, 8);
        assert!(!cam.clip_line(&mut a, &mut b));
        let mut a = Point2::new(3, 12);
        let mut b = Point2::new(7, 20);
        assert!(!cam.clip_line(&mut a, &mut b));
    }

    #[test]
    fn clip_line_clamps_crossing_segment() {
        let cam = Camera::new("c", Viewport::new(0, 0, 10, 10));
        let mut a = Point2::new(-10, 5);
        let mut b = Point2::new(20, 5);
        assert!(cam.clip_line(&mut a, &mut b));
        assert_eq!(a, Point2::new(0, 5));
        assert_eq!(b, Point2::new(9, 5));

        let mut a = Point2::new(4, 4);
        let mut b = Point2::new(4, 30);
        assert!(cam.clip_line(&mut a, &mut b));
        assert_eq!((a, b), (Point2::new(4, 4), Point2::new(4, 9)));
    }

    #[test]
    fn clip_line_keeps_segments_on_the_border() {
        let cam = Camera::new("c", Viewport::new(0, 0, 10, 10));
        let mut a = Point2::new(0, 2);
        let mut b = Point2::new(0, 7);
        assert!(cam.clip_line(&mut a, &mut b));
        assert_eq!((a, b), (Point2::new(0, 2), Point2::new(0, 7)));

        let mut a = Point2::new(3, 9);
        let mut b = Point2::new(12, 9);
        assert!(cam.clip_line(&mut a, &mut b));
        assert_eq!((a, b), (Point2::new(3, 9), Point2::new(9, 9)));
    }

    #[test]
    fn clip_line_reports_segments_missing_the_corner() {
        let cam = Camera::new("c", Viewport::new(0, 0, 10, 10));
        let mut a = Point2::new(-6, 5);
        let mut b = Point2::new(5, -6);
        assert!(!cam.clip_line(&mut a, &mut b));
    }

    #[test]
    fn look_at_points_forward_axis_at_target() {
        let mut cam = camera_4x4();
        cam.look_at(Vector3::new(0.0, 0.0, -5.0), Vector3::zeros(), Vector3::y());
        let view_space = cam.view() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((view_space.xyz() - Vector3::new(0.0, 0.0, 5.0)).norm() < 1.0e-5);
    }
}
