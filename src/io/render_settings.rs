use crate::material_system::color::{Color, parse_color};
use crate::math::quaternion::{RotationOrder, euler};
use crate::skinning::SkinType;
use log::warn;
use nalgebra::{UnitQuaternion, Vector3};

/// 🔥 **纯数据结构** - 所有可通过TOML配置的渲染参数
///
/// 向量类参数以 "x,y,z" 字符串保存，便于原样写回 TOML；使用时按需解析。
#[derive(Debug, Clone)]
pub struct RenderSettings {
    // ===== 🔥 **文件路径设置** =====
    /// 输入OBJ文件的路径，未指定时使用内置的蒙皮柱体
    pub obj: Option<String>,
    /// 显式指定要使用的纹理文件，未指定时使用棋盘格
    pub texture: Option<String>,
    /// 输出文件的基础名称
    pub output: String,
    /// 输出图像的目录
    pub output_dir: String,

    // ===== 🔥 **渲染基础设置** =====
    /// 设备宽度（像素）
    pub width: usize,
    /// 设备高度（像素）
    pub height: usize,
    /// 渲染并保存的帧数
    pub frames: usize,
    /// 启用深度测试
    pub z_test: bool,
    /// 启用背面剔除
    pub backface_culling: bool,
    /// 以线框模式渲染
    pub wireframe: bool,
    /// 使用透视投影与齐次裁剪
    pub use_perspective: bool,
    /// alpha 小于 255 时与背景混合
    pub alpha_blend: bool,
    /// 同时保存深度图
    pub save_depth: bool,
    /// 背景颜色，格式为"r,g,b"（0-255）
    pub background: String,

    // ===== 🔥 **相机参数** =====
    /// 相机位置，格式为"x,y,z"
    pub camera_position: String,
    /// 相机旋转（欧拉角，度，YXZ 顺序）
    pub camera_rotation: String,
    /// 垂直视场角（度）
    pub camera_fov: f32,
    pub z_near: f32,
    pub z_far: f32,

    // ===== 🔥 **物体变换控制** =====
    /// 物体位置 (x,y,z)
    pub object_position: String,
    /// 物体旋转 (欧拉角，度，YXZ 顺序)
    pub object_rotation: String,
    /// 物体缩放 (x,y,z)
    pub object_scale: String,
    /// 每帧绕 Y 轴旋转的角度（度）
    pub spin_speed: f32,

    // ===== 🔥 **蒙皮设置** =====
    /// 内置柱体使用骨骼蒙皮
    pub skinning: bool,
    /// "linear" / "dual_quaternion" / "blend" / "spherical"
    pub skin_type: String,
    /// 动画过程中关节的最大弯曲角度（度）
    pub bend_angle: f32,
    /// 叠加绘制骨骼线框
    pub show_bones: bool,

    // ===== 🔥 **光照基础参数** =====
    /// 启用 Lambert 光照
    pub use_lighting: bool,
    /// 光线方向（指向光源），格式为"x,y,z"
    pub light_dir: String,
    /// 环境光强度因子
    pub ambient: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            // ===== 文件路径设置 =====
            obj: None,
            texture: None,
            output: "frame".to_string(),
            output_dir: "output_rust".to_string(),

            // ===== 渲染基础设置 =====
            width: 512,
            height: 512,
            frames: 1,
            z_test: true,
            backface_culling: true,
            wireframe: false,
            use_perspective: true,
            alpha_blend: true,
            save_depth: false,
            background: "40,44,52".to_string(),

            // ===== 相机参数 =====
            camera_position: "0,1,-4".to_string(),
            camera_rotation: "0,0,0".to_string(),
            camera_fov: 60.0,
            z_near: 0.1,
            z_far: 100.0,

            // ===== 物体变换控制 =====
            object_position: "0,0,0".to_string(),
            object_rotation: "0,0,0".to_string(),
            object_scale: "1,1,1".to_string(),
            spin_speed: 0.0,

            // ===== 蒙皮设置 =====
            skinning: true,
            skin_type: "dual_quaternion".to_string(),
            bend_angle: 60.0,
            show_bones: false,

            // ===== 光照基础参数 =====
            use_lighting: true,
            light_dir: "-1,1,-1".to_string(),
            ambient: 0.3,
        }
    }
}

/// 辅助函数用于解析逗号分隔的浮点数
pub fn parse_vec3(s: &str) -> Result<Vector3<f32>, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("需要3个逗号分隔的值".to_string());
    }
    let mut values = [0.0f32; 3];
    for (value, part) in values.iter_mut().zip(parts.iter()) {
        *value = part
            .trim()
            .parse::<f32>()
            .map_err(|e| format!("无效数字 '{}': {}", part, e))?;
    }
    Ok(Vector3::from(values))
}

impl RenderSettings {
    // ===== 🔥 **按需计算方法** =====

    pub fn get_background_color(&self) -> Color {
        parse_color(&self.background).unwrap_or_else(|e| {
            warn!("无效的背景颜色 '{}': {}, 使用黑色", self.background, e);
            Color::BLACK
        })
    }

    pub fn get_camera_position(&self) -> Vector3<f32> {
        parse_vec3(&self.camera_position).unwrap_or_else(|_| Vector3::new(0.0, 1.0, -4.0))
    }

    pub fn get_camera_rotation(&self) -> UnitQuaternion<f32> {
        euler_from_str(&self.camera_rotation)
    }

    /// 解析物体变换参数：(位置, 旋转, 缩放)
    pub fn get_object_transform_components(
        &self,
    ) -> (Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>) {
        let position = parse_vec3(&self.object_position).unwrap_or_else(|_| Vector3::zeros());
        let rotation = euler_from_str(&self.object_rotation);
        let scale = parse_vec3(&self.object_scale).unwrap_or_else(|_| Vector3::new(1.0, 1.0, 1.0));
        (position, rotation, scale)
    }

    pub fn get_light_dir(&self) -> Vector3<f32> {
        parse_vec3(&self.light_dir)
            .ok()
            .and_then(|d| d.try_normalize(f32::EPSILON))
            .unwrap_or_else(|| Vector3::new(-1.0, 1.0, -1.0).normalize())
    }

    pub fn get_skin_type(&self) -> SkinType {
        SkinType::parse(&self.skin_type).unwrap_or_else(|| {
            warn!("未知的蒙皮类型 '{}', 使用 linear", self.skin_type);
            SkinType::Linear
        })
    }

    /// 获取渲染模式的描述字符串
    pub fn get_mode_description(&self) -> String {
        let geometry = if self.obj.is_some() {
            "OBJ模型".to_string()
        } else if self.skinning {
            format!("蒙皮柱体({})", self.get_skin_type().as_str())
        } else {
            "静态柱体".to_string()
        };
        let shading = if self.wireframe {
            "线框"
        } else if self.use_lighting {
            "Lambert光照"
        } else {
            "纹理"
        };
        format!("{} / {}", geometry, shading)
    }

    /// 验证渲染参数
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("错误: 图像宽度和高度必须大于0".to_string());
        }

        if self.frames == 0 {
            return Err("错误: 帧数必须大于0".to_string());
        }

        if let Some(obj_path) = &self.obj {
            if !std::path::Path::new(obj_path).exists() {
                return Err(format!("错误: 找不到OBJ文件 '{}'", obj_path));
            }
        }

        if self.output_dir.trim().is_empty() {
            return Err("错误: 输出目录不能为空".to_string());
        }

        if self.output.trim().is_empty() {
            return Err("错误: 输出文件名不能为空".to_string());
        }

        if !(self.camera_fov > 0.0 && self.camera_fov < 180.0) {
            return Err(format!("错误: 视场角 {} 必须在 (0, 180) 之间", self.camera_fov));
        }

        if !(self.z_near > 0.0 && self.z_far > self.z_near) {
            return Err(format!(
                "错误: 裁剪面需要满足 0 < z_near < z_far，当前为 {} / {}",
                self.z_near, self.z_far
            ));
        }

        let vectors = [
            ("相机位置", &self.camera_position),
            ("相机旋转", &self.camera_rotation),
            ("物体位置", &self.object_position),
            ("物体旋转", &self.object_rotation),
            ("物体缩放", &self.object_scale),
            ("光线方向", &self.light_dir),
        ];
        for (label, value) in vectors {
            if parse_vec3(value).is_err() {
                return Err(format!("错误: {}格式不正确，应为 x,y,z 格式", label));
            }
        }

        parse_color(&self.background).map_err(|e| format!("错误: 背景颜色格式不正确: {}", e))?;

        Ok(())
    }
}

fn euler_from_str(s: &str) -> UnitQuaternion<f32> {
    let degrees = parse_vec3(s).unwrap_or_else(|_| Vector3::zeros());
    euler(degrees.x, degrees.y, degrees.z, RotationOrder::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vectors() {
        assert_eq!(parse_vec3(" 1, -2.5 ,3").unwrap(), Vector3::new(1.0, -2.5, 3.0));
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("1,a,2").is_err());
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = RenderSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.get_skin_type(), SkinType::DualQuaternion);
        assert_eq!(settings.get_background_color(), Color::rgb(40, 44, 52));
    }

    #[test]
    fn rejects_bad_values() {
        let mut settings = RenderSettings {
            z_near: 10.0,
            z_far: 1.0,
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());

        settings = RenderSettings {
            light_dir: "0,1".to_string(),
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());

        settings = RenderSettings {
            obj: Some("definitely/missing.obj".to_string()),
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_skin_type_falls_back_to_linear() {
        let settings = RenderSettings {
            skin_type: "quadratic".to_string(),
            ..RenderSettings::default()
        };
        assert_eq!(settings.get_skin_type(), SkinType::Linear);
    }
}
