use crate::io::render_settings::{RenderSettings, parse_vec3};
use crate::material_system::color::parse_color;
use crate::skinning::SkinType;
use log::warn;
use std::path::Path;
use toml::Value;

/// TOML配置管理器 - 统一处理所有配置的读写
pub struct TomlConfigLoader;

impl TomlConfigLoader {
    /// 从TOML文件加载完整配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<RenderSettings, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("读取配置文件失败: {}", e))?;

        Self::load_from_content(&content)
    }

    /// 从TOML内容字符串加载配置
    pub fn load_from_content(content: &str) -> Result<RenderSettings, String> {
        let toml_value: Value =
            toml::from_str(content).map_err(|e| format!("解析TOML失败: {}", e))?;

        Self::parse_toml_to_settings(toml_value)
    }

    /// 保存配置到TOML文件
    pub fn save_to_file<P: AsRef<Path>>(settings: &RenderSettings, path: P) -> Result<(), String> {
        let toml_content = Self::settings_to_toml(settings);
        std::fs::write(path, toml_content).map_err(|e| format!("写入配置文件失败: {}", e))
    }

    /// 生成示例配置文件：四帧弯曲的对偶四元数蒙皮柱体
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), String> {
        let settings = RenderSettings {
            frames: 4,
            show_bones: true,
            spin_speed: 15.0,
            ..Default::default()
        };

        Self::save_to_file(&settings, path).map_err(|e| format!("创建示例配置失败: {}", e))
    }

    // ===== TOML -> RenderSettings 转换 =====

    fn parse_toml_to_settings(toml: Value) -> Result<RenderSettings, String> {
        let mut settings = RenderSettings::default();

        // [files] 部分
        if let Some(files) = toml.get("files").and_then(|v| v.as_table()) {
            Self::parse_files_section(&mut settings, files)?;
        }

        // [render] 部分
        if let Some(render) = toml.get("render").and_then(|v| v.as_table()) {
            Self::parse_render_section(&mut settings, render)?;
        }

        // [camera] 部分
        if let Some(camera) = toml.get("camera").and_then(|v| v.as_table()) {
            Self::parse_camera_section(&mut settings, camera)?;
        }

        // [object] 部分
        if let Some(object) = toml.get("object").and_then(|v| v.as_table()) {
            Self::parse_object_section(&mut settings, object)?;
        }

        // [skinning] 部分
        if let Some(skinning) = toml.get("skinning").and_then(|v| v.as_table()) {
            Self::parse_skinning_section(&mut settings, skinning)?;
        }

        // [lighting] 部分
        if let Some(lighting) = toml.get("lighting").and_then(|v| v.as_table()) {
            Self::parse_lighting_section(&mut settings, lighting)?;
        }

        Ok(settings)
    }

    // ===== 各个section的解析方法 =====

    fn parse_files_section(
        settings: &mut RenderSettings,
        files: &toml::Table,
    ) -> Result<(), String> {
        if let Some(obj) = files.get("obj").and_then(|v| v.as_str()) {
            settings.obj = Some(obj.to_string());
        }
        if let Some(texture) = files.get("texture").and_then(|v| v.as_str()) {
            settings.texture = Some(texture.to_string());
        }
        if let Some(output) = files.get("output").and_then(|v| v.as_str()) {
            settings.output = output.to_string();
        }
        if let Some(output_dir) = files.get("output_dir").and_then(|v| v.as_str()) {
            settings.output_dir = output_dir.to_string();
        }
        Ok(())
    }

    fn parse_render_section(
        settings: &mut RenderSettings,
        render: &toml::Table,
    ) -> Result<(), String> {
        if let Some(width) = positive_integer(render, "width") {
            settings.width = width;
        }
        if let Some(height) = positive_integer(render, "height") {
            settings.height = height;
        }
        if let Some(frames) = positive_integer(render, "frames") {
            settings.frames = frames;
        }
        if let Some(z_test) = render.get("z_test").and_then(|v| v.as_bool()) {
            settings.z_test = z_test;
        }
        if let Some(backface_culling) = render.get("backface_culling").and_then(|v| v.as_bool()) {
            settings.backface_culling = backface_culling;
        }
        if let Some(wireframe) = render.get("wireframe").and_then(|v| v.as_bool()) {
            settings.wireframe = wireframe;
        }
        if let Some(use_perspective) = render.get("use_perspective").and_then(|v| v.as_bool()) {
            settings.use_perspective = use_perspective;
        }
        if let Some(alpha_blend) = render.get("alpha_blend").and_then(|v| v.as_bool()) {
            settings.alpha_blend = alpha_blend;
        }
        if let Some(save_depth) = render.get("save_depth").and_then(|v| v.as_bool()) {
            settings.save_depth = save_depth;
        }
        if let Some(background) = render.get("background").and_then(|v| v.as_str()) {
            match parse_color(background) {
                Ok(_) => settings.background = background.to_string(),
                Err(e) => warn!("无效的背景颜色 '{}': {}, 使用默认值", background, e),
            }
        }
        Ok(())
    }

    fn parse_camera_section(
        settings: &mut RenderSettings,
        camera: &toml::Table,
    ) -> Result<(), String> {
        if let Some(position) = vec3_string(camera, "position") {
            settings.camera_position = position;
        }
        if let Some(rotation) = vec3_string(camera, "rotation") {
            settings.camera_rotation = rotation;
        }
        if let Some(fov) = float(camera, "fov") {
            if fov > 0.0 && fov < 180.0 {
                settings.camera_fov = fov;
            } else {
                warn!("无效的视场角 {}, 使用默认值 {}", fov, settings.camera_fov);
            }
        }
        if let Some(z_near) = float(camera, "z_near") {
            settings.z_near = z_near;
        }
        if let Some(z_far) = float(camera, "z_far") {
            settings.z_far = z_far;
        }
        Ok(())
    }

    fn parse_object_section(
        settings: &mut RenderSettings,
        object: &toml::Table,
    ) -> Result<(), String> {
        if let Some(position) = vec3_string(object, "position") {
            settings.object_position = position;
        }
        if let Some(rotation) = vec3_string(object, "rotation") {
            settings.object_rotation = rotation;
        }
        if let Some(scale) = vec3_string(object, "scale") {
            settings.object_scale = scale;
        }
        if let Some(spin_speed) = float(object, "spin_speed") {
            settings.spin_speed = spin_speed;
        }
        Ok(())
    }

    fn parse_skinning_section(
        settings: &mut RenderSettings,
        skinning: &toml::Table,
    ) -> Result<(), String> {
        if let Some(enabled) = skinning.get("enabled").and_then(|v| v.as_bool()) {
            settings.skinning = enabled;
        }
        if let Some(skin_type) = skinning.get("skin_type").and_then(|v| v.as_str()) {
            if SkinType::parse(skin_type).is_some() {
                settings.skin_type = skin_type.to_string();
            } else {
                warn!("未知的蒙皮类型 '{}', 使用默认值 {}", skin_type, settings.skin_type);
            }
        }
        if let Some(bend_angle) = float(skinning, "bend_angle") {
            settings.bend_angle = bend_angle;
        }
        if let Some(show_bones) = skinning.get("show_bones").and_then(|v| v.as_bool()) {
            settings.show_bones = show_bones;
        }
        Ok(())
    }

    fn parse_lighting_section(
        settings: &mut RenderSettings,
        lighting: &toml::Table,
    ) -> Result<(), String> {
        if let Some(use_lighting) = lighting.get("use_lighting").and_then(|v| v.as_bool()) {
            settings.use_lighting = use_lighting;
        }
        if let Some(light_dir) = vec3_string(lighting, "light_dir") {
            settings.light_dir = light_dir;
        }
        if let Some(ambient) = float(lighting, "ambient") {
            if (0.0..=1.0).contains(&ambient) {
                settings.ambient = ambient;
            } else {
                warn!("环境光强度 {} 超出 [0, 1], 使用默认值 {}", ambient, settings.ambient);
            }
        }
        Ok(())
    }

    // ===== RenderSettings -> TOML 转换 =====

    fn settings_to_toml(settings: &RenderSettings) -> String {
        let mut content = String::new();

        // 文件头注释
        content.push_str("# 🔥 蒙皮光栅化渲染器配置文件\n");
        content.push_str("# 基于RenderSettings默认值生成的示例配置\n\n");

        // [files] 部分
        content.push_str("[files]\n");
        if let Some(obj) = &settings.obj {
            content.push_str(&format!("obj = \"{}\"\n", obj));
        } else {
            content.push_str("# obj = \"path/to/your/model.obj\"  # 不设置时渲染内置蒙皮柱体\n");
        }
        if let Some(texture) = &settings.texture {
            content.push_str(&format!("texture = \"{}\"\n", texture));
        } else {
            content.push_str("# texture = \"path/to/texture.png\"  # 不设置时使用棋盘格\n");
        }
        content.push_str(&format!("output = \"{}\"\n", settings.output));
        content.push_str(&format!("output_dir = \"{}\"\n", settings.output_dir));
        content.push('\n');

        // [render] 部分
        content.push_str("[render]\n");
        content.push_str(&format!("width = {}\n", settings.width));
        content.push_str(&format!("height = {}\n", settings.height));
        content.push_str(&format!("frames = {}\n", settings.frames));
        content.push_str(&format!("z_test = {}\n", settings.z_test));
        content.push_str(&format!(
            "backface_culling = {}\n",
            settings.backface_culling
        ));
        content.push_str(&format!("wireframe = {}\n", settings.wireframe));
        content.push_str(&format!("use_perspective = {}\n", settings.use_perspective));
        content.push_str(&format!("alpha_blend = {}\n", settings.alpha_blend));
        content.push_str(&format!("save_depth = {}\n", settings.save_depth));
        content.push_str(&format!("background = \"{}\"\n", settings.background));
        content.push('\n');

        // [camera] 部分
        content.push_str("[camera]\n");
        content.push_str(&format!("position = \"{}\"\n", settings.camera_position));
        content.push_str(&format!("rotation = \"{}\"\n", settings.camera_rotation));
        content.push_str(&format!("fov = {}\n", settings.camera_fov));
        content.push_str(&format!("z_near = {}\n", settings.z_near));
        content.push_str(&format!("z_far = {}\n", settings.z_far));
        content.push('\n');

        // [object] 部分
        content.push_str("[object]\n");
        content.push_str(&format!("position = \"{}\"\n", settings.object_position));
        content.push_str(&format!("rotation = \"{}\"\n", settings.object_rotation));
        content.push_str(&format!("scale = \"{}\"\n", settings.object_scale));
        content.push_str(&format!("spin_speed = {}\n", settings.spin_speed));
        content.push('\n');

        // [skinning] 部分
        content.push_str("[skinning]\n");
        content.push_str(&format!("enabled = {}\n", settings.skinning));
        content.push_str(&format!(
            "skin_type = \"{}\"  # linear / dual_quaternion / blend / spherical\n",
            settings.skin_type
        ));
        content.push_str(&format!("bend_angle = {}\n", settings.bend_angle));
        content.push_str(&format!("show_bones = {}\n", settings.show_bones));
        content.push('\n');

        // [lighting] 部分
        content.push_str("[lighting]\n");
        content.push_str(&format!("use_lighting = {}\n", settings.use_lighting));
        content.push_str(&format!("light_dir = \"{}\"\n", settings.light_dir));
        content.push_str(&format!("ambient = {}\n", settings.ambient));

        content
    }
}

/// TOML 中整数与浮点都接受
fn float(table: &toml::Table, key: &str) -> Option<f32> {
    match table.get(key)? {
        Value::Float(f) => Some(*f as f32),
        Value::Integer(i) => Some(*i as f32),
        other => {
            warn!("配置项 '{}' 需要数字，得到 {}", key, other);
            None
        }
    }
}

fn positive_integer(table: &toml::Table, key: &str) -> Option<usize> {
    let value = table.get(key)?.as_integer()?;
    if value > 0 {
        Some(value as usize)
    } else {
        warn!("配置项 '{}' 必须大于0，得到 {}, 使用默认值", key, value);
        None
    }
}

/// 读取 "x,y,z" 字符串，格式错误时警告并保留默认值
fn vec3_string(table: &toml::Table, key: &str) -> Option<String> {
    let s = table.get(key)?.as_str()?;
    match parse_vec3(s) {
        Ok(_) => Some(s.to_string()),
        Err(e) => {
            warn!("无效的 {} '{}': {}, 使用默认值", key, s, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_sections() {
        let content = r#"
            [files]
            obj = "model.obj"
            output = "shot"

            [render]
            width = 320
            height = 200
            frames = 3
            wireframe = true
            background = "1,2,3"

            [camera]
            position = "0,0,-10"
            fov = 45

            [object]
            spin_speed = 12.5

            [skinning]
            skin_type = "linear"
            bend_angle = 30

            [lighting]
            use_lighting = false
            ambient = 0.5
        "#;
        let settings = TomlConfigLoader::load_from_content(content).unwrap();
        assert_eq!(settings.obj.as_deref(), Some("model.obj"));
        assert_eq!(settings.output, "shot");
        assert_eq!((settings.width, settings.height, settings.frames), (320, 200, 3));
        assert!(settings.wireframe);
        assert_eq!(settings.background, "1,2,3");
        assert_eq!(settings.camera_position, "0,0,-10");
        assert_eq!(settings.camera_fov, 45.0);
        assert_eq!(settings.spin_speed, 12.5);
        assert_eq!(settings.get_skin_type(), SkinType::Linear);
        assert_eq!(settings.bend_angle, 30.0);
        assert!(!settings.use_lighting);
        assert_eq!(settings.ambient, 0.5);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let content = r#"
            [render]
            width = -5
            background = "red"

            [camera]
            fov = 200.0
            position = "1,2"

            [skinning]
            skin_type = "cubic"
        "#;
        let defaults = RenderSettings::default();
        let settings = TomlConfigLoader::load_from_content(content).unwrap();
        assert_eq!(settings.width, defaults.width);
        assert_eq!(settings.background, defaults.background);
        assert_eq!(settings.camera_fov, defaults.camera_fov);
        assert_eq!(settings.camera_position, defaults.camera_position);
        assert_eq!(settings.skin_type, defaults.skin_type);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(TomlConfigLoader::load_from_content("[render\nwidth = 1").is_err());
    }

    #[test]
    fn generated_config_reads_back() {
        let settings = RenderSettings {
            obj: Some("a.obj".to_string()),
            frames: 7,
            skin_type: "blend".to_string(),
            ambient: 0.25,
            ..RenderSettings::default()
        };
        let text = TomlConfigLoader::settings_to_toml(&settings);
        let back = TomlConfigLoader::load_from_content(&text).unwrap();
        assert_eq!(back.obj, settings.obj);
        assert_eq!(back.frames, 7);
        assert_eq!(back.skin_type, "blend");
        assert_eq!(back.ambient, 0.25);
        assert_eq!(back.camera_fov, settings.camera_fov);
        assert_eq!(back.z_near, settings.z_near);
    }
}
