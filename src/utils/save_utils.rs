use crate::core::frame_buffer::FrameBuffer;
use image::ColorType;
use log::{debug, info, warn};
use std::path::Path;

/// 保存RGBA图像数据到PNG文件
///
/// # 参数
/// * `path` - 输出文件路径
/// * `data` - RGBA数据（u8数组）
/// * `width` - 图像宽度
/// * `height` - 图像高度
pub fn save_image<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<(), String> {
    let path = path.as_ref();
    image::save_buffer(path, data, width, height, ColorType::Rgba8)
        .map_err(|e| format!("保存图像到 {:?} 时出错: {}", path, e))?;
    info!("图像已保存到 {:?}", path);
    Ok(())
}

/// 将深度缓冲数据归一化到指定的百分位数范围
///
/// 非有限值（未写入的像素）映射为 1.0，即最远处。
///
/// # 参数
/// * `depth_buffer` - 深度数据（f32数组）
/// * `min_percentile` - 最小百分位（例如，1.0表示第1百分位）
/// * `max_percentile` - 最大百分位（例如，99.0表示第99百分位）
pub fn normalize_depth(depth_buffer: &[f32], min_percentile: f32, max_percentile: f32) -> Vec<f32> {
    let mut finite_depths: Vec<f32> = depth_buffer
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .collect();

    let (min_clip, max_clip) = if finite_depths.len() >= 2 {
        finite_depths.sort_unstable_by(|a, b| a.total_cmp(b));

        let last = finite_depths.len() - 1;
        let percentile_index =
            |p: f32| ((p / 100.0 * last as f32).round() as usize).min(last);
        let mut min_clip = finite_depths[percentile_index(min_percentile)];
        let mut max_clip = finite_depths[percentile_index(max_percentile)];

        // 范围过小时退回到绝对最小/最大值
        if (max_clip - min_clip).abs() < 1e-6 {
            min_clip = finite_depths[0];
            max_clip = finite_depths[last];
            if (max_clip - min_clip).abs() < 1e-6 {
                max_clip = min_clip + 1.0;
            }
        }
        debug!(
            "使用百分位数归一化深度: [{:.1}%, {:.1}%] -> [{:.3}, {:.3}]",
            min_percentile, max_percentile, min_clip, max_clip
        );
        (min_clip, max_clip)
    } else {
        warn!("没有足够的有限深度值进行百分位裁剪，使用 NDC 范围 [-1, 1]");
        (-1.0, 1.0)
    };

    let inv_range = 1.0 / (max_clip - min_clip);
    depth_buffer
        .iter()
        .map(|&depth| {
            if depth.is_finite() {
                ((depth.clamp(min_clip, max_clip) - min_clip) * inv_range).clamp(0.0, 1.0)
            } else {
                1.0
            }
        })
        .collect()
}

/// 深度图转为灰度 RGBA：越近越亮
pub fn depth_to_grayscale(normalized: &[f32]) -> Vec<u8> {
    normalized
        .iter()
        .flat_map(|&d| {
            let v = ((1.0 - d) * 255.0).round() as u8;
            [v, v, v, 255]
        })
        .collect()
}

/// 保存帧缓冲的颜色（和可选的深度图），返回写出的颜色图路径
pub fn save_render_result(
    frame_buffer: &FrameBuffer,
    output_dir: &str,
    output_name: &str,
    save_depth: bool,
) -> Result<String, String> {
    std::fs::create_dir_all(output_dir)
        .map_err(|e| format!("创建输出目录 '{}' 失败: {}", output_dir, e))?;

    let (width, height) = (frame_buffer.width as u32, frame_buffer.height as u32);
    let color_path = Path::new(output_dir)
        .join(format!("{}_color.png", output_name))
        .to_str()
        .ok_or_else(|| "创建彩色输出路径字符串失败".to_string())?
        .to_string();
    save_image(&color_path, frame_buffer.get_color_buffer_bytes(), width, height)?;

    if save_depth {
        let normalized = normalize_depth(frame_buffer.get_depth_buffer_f32(), 1.0, 99.0);
        let depth_path = Path::new(output_dir).join(format!("{}_depth.png", output_name));
        save_image(&depth_path, &depth_to_grayscale(&normalized), width, height)?;
    }

    Ok(color_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_finite_depths_and_sends_empty_pixels_far() {
        let depth = [0.0, 0.5, 1.0, f32::INFINITY];
        let normalized = normalize_depth(&depth, 0.0, 100.0);
        assert_eq!(normalized, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn constant_depth_does_not_divide_by_zero() {
        let normalized = normalize_depth(&[0.3, 0.3, 0.3], 1.0, 99.0);
        assert!(normalized.iter().all(|d| d.is_finite()));
        assert_eq!(normalized[0], 0.0);
    }

    #[test]
    fn grayscale_is_brighter_when_nearer() {
        let pixels = depth_to_grayscale(&[0.0, 1.0]);
        assert_eq!(pixels, vec![255, 255, 255, 255, 0, 0, 0, 255]);
    }
}
