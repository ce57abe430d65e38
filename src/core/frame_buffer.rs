use crate::geometry::camera::Viewport;
use crate::material_system::color::Color;

/// 帧缓冲区实现：设备级 RGBA8 颜色缓冲 + f32 深度缓冲
///
/// 多个相机共享同一颜色缓冲，各自只清除自己视口范围内的深度。
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    /// NDC 深度，数值越小越近，清空值为 +∞
    depth_buffer: Vec<f32>,
    /// 按行存储的 RGBA，每像素 4 字节
    color_buffer: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let num_pixels = width * height;
        FrameBuffer {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; num_pixels],
            color_buffer: vec![0; num_pixels * 4],
        }
    }

    /// 像素坐标 → 线性下标，越界为错误
    pub fn index(&self, x: i32, y: i32) -> Result<usize, String> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return Err(format!(
                "像素坐标 ({}, {}) 超出缓冲区范围 {}x{}",
                x, y, self.width, self.height
            ));
        }
        Ok(y as usize * self.width + x as usize)
    }

    pub fn clear_color(&mut self, color: Color) {
        let rgba = color.to_array();
        for pixel in self.color_buffer.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    pub fn clear_depth(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
    }

    /// 只重置视口范围内的深度
    pub fn clear_depth_region(&mut self, viewport: &Viewport) {
        let region = viewport.clamped(self.width, self.height);
        for y in region.y..region.y + region.height {
            let start = y as usize * self.width + region.x as usize;
            self.depth_buffer[start..start + region.width as usize].fill(f32::INFINITY);
        }
    }

    pub fn color_at(&self, index: usize) -> Color {
        let i = index * 4;
        Color::new(
            self.color_buffer[i],
            self.color_buffer[i + 1],
            self.color_buffer[i + 2],
            self.color_buffer[i + 3],
        )
    }

    pub fn set_color_at(&mut self, index: usize, color: Color) {
        let i = index * 4;
        self.color_buffer[i..i + 4].copy_from_slice(&color.to_array());
    }

    pub fn depth_at(&self, index: usize) -> f32 {
        self.depth_buffer[index]
    }

    pub fn set_depth_at(&mut self, index: usize, depth: f32) {
        self.depth_buffer[index] = depth;
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Result<Color, String> {
        Ok(self.color_at(self.index(x, y)?))
    }

    pub fn get_depth(&self, x: i32, y: i32) -> Result<f32, String> {
        Ok(self.depth_at(self.index(x, y)?))
    }

    /// 获取 RGBA 颜色缓冲区数据
    pub fn get_color_buffer_bytes(&self) -> &[u8] {
        &self.color_buffer
    }

    /// 获取深度缓冲区数据
    pub fn get_depth_buffer_f32(&self) -> &[f32] {
        &self.depth_buffer
    }
}
