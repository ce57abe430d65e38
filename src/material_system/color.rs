use std::fmt;

/// 8 位 RGBA 颜色，非预乘 alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 235, 4);
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const GRAY: Color = Color::rgb(128, 128, 128);
    /// 完全透明：写入时不改颜色并撤销深度写入
    pub const CLEAR: Color = Color::new(0, 0, 0, 0);
    /// 缺失纹理时的占位色
    pub const MISSING_TEXTURE: Color = Color::rgb(224, 124, 235);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    pub fn is_clear(&self) -> bool {
        self.a == 0
    }

    /// 逐通道线性插值，结果向下取整
    pub fn lerp(from: Color, to: Color, s: f32) -> Color {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * s).floor().clamp(0.0, 255.0) as u8;
        Color {
            r: mix(from.r, to.r),
            g: mix(from.g, to.g),
            b: mix(from.b, to.b),
            a: mix(from.a, to.a),
        }
    }

    /// RGB 乘以系数，alpha 不变
    pub fn scaled(&self, factor: f32) -> Color {
        let mul = |c: u8| (c as f32 * factor).floor().clamp(0.0, 255.0) as u8;
        Color {
            r: mul(self.r),
            g: mul(self.g),
            b: mul(self.b),
            a: self.a,
        }
    }

    pub fn with_alpha(&self, a: u8) -> Color {
        Color { a, ..*self }
    }

    /// 小端打包：`r | g<<8 | b<<16 | a<<24`
    pub fn to_u32(&self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    pub fn from_u32(packed: u32) -> Color {
        let [r, g, b, a] = packed.to_le_bytes();
        Color { r, g, b, a }
    }

    pub fn to_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[u8; 4]> for Color {
    fn from(c: [u8; 4]) -> Self {
        Color::new(c[0], c[1], c[2], c[3])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// 解析 "r,g,b" 或 "r,g,b,a"（0-255）
pub fn parse_color(s: &str) -> Result<Color, String> {
    let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(format!("颜色需要3或4个逗号分隔的值: '{}'", s));
    }
    let mut channels = [255u8; 4];
    for (i, part) in parts.iter().enumerate() {
        channels[i] = part
            .parse::<u8>()
            .map_err(|e| format!("无效颜色分量 '{}': {}", part, e))?;
    }
    Ok(Color::from(channels))
}
