use crate::material_system::color::Color;
use image::RgbaImage;
use log::warn;
use nalgebra::Vector2;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum TextureData {
    Image(Arc<RgbaImage>),
    Checker { cell: u32, even: Color, odd: Color },
    SolidColor(Color),
}

/// 纹理：uv 原点在左上角，v 向下
#[derive(Debug, Clone)]
pub struct Texture {
    pub data: TextureData,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Option<Self> {
        match image::open(path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                Some(Texture {
                    width: rgba.width(),
                    height: rgba.height(),
                    data: TextureData::Image(Arc::new(rgba)),
                })
            }
            Err(e) => {
                warn!("无法加载纹理: {}", e);
                None
            }
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Texture {
            width: image.width(),
            height: image.height(),
            data: TextureData::Image(Arc::new(image)),
        }
    }

    /// 程序化棋盘格
    pub fn checker(width: u32, height: u32, cell: u32, even: Color, odd: Color) -> Self {
        Texture {
            data: TextureData::Checker {
                cell: cell.max(1),
                even,
                odd,
            },
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn solid_color(color: Color) -> Self {
        Texture {
            data: TextureData::SolidColor(color),
            width: 1,
            height: 1,
        }
    }

    pub fn get_type_description(&self) -> &'static str {
        match &self.data {
            TextureData::Image(_) => "图像纹理",
            TextureData::Checker { .. } => "棋盘格纹理",
            TextureData::SolidColor(_) => "单色纹理",
        }
    }

    /// 读取纹素，坐标越界时钳制到边缘
    pub fn get_color(&self, x: i32, y: i32) -> Color {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        match &self.data {
            TextureData::Image(img) => Color::from(img.get_pixel(x, y).0),
            TextureData::Checker { cell, even, odd } => {
                if (x / cell + y / cell) % 2 == 0 {
                    *even
                } else {
                    *odd
                }
            }
            TextureData::SolidColor(color) => *color,
        }
    }

    /// 最近点采样：`x = round(u·width)`，`y = round(v·height)`
    pub fn sample(&self, uv: &Vector2<f32>) -> Color {
        let x = (uv.x * self.width as f32).round() as i32;
        let y = (uv.y * self.height as f32).round() as i32;
        self.get_color(x, y)
    }
}

/// 加载失败时退回单色纹理
pub fn load_texture<P: AsRef<Path>>(path: P, default_color: Color) -> Texture {
    Texture::from_file(path).unwrap_or_else(|| {
        warn!("无法加载纹理，使用默认颜色 {}", default_color);
        Texture::solid_color(default_color)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn sample_rounds_and_clamps() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([10, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([20, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([30, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([40, 0, 0, 255]));
        let tex = Texture::from_image(img);

        assert_eq!(tex.sample(&Vector2::new(0.0, 0.0)).r, 10);
        assert_eq!(tex.sample(&Vector2::new(0.5, 0.0)).r, 20);
        assert_eq!(tex.sample(&Vector2::new(1.0, 1.0)).r, 40);
        assert_eq!(tex.sample(&Vector2::new(-3.0, 0.6)).r, 30);
    }

    #[test]
    fn checker_alternates_cells() {
        let tex = Texture::checker(8, 8, 4, Color::WHITE, Color::BLACK);
        assert_eq!(tex.get_color(0, 0), Color::WHITE);
        assert_eq!(tex.get_color(4, 0), Color::BLACK);
        assert_eq!(tex.get_color(5, 5), Color::WHITE);
    }

    #[test]
    fn missing_file_falls_back_to_solid_color() {
        let tex = load_texture("definitely/not/here.png", Color::GRAY);
        assert_eq!(tex.get_color(0, 0), Color::GRAY);
    }
}
