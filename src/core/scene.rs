use crate::core::clipper::Clipper;
use crate::core::frame_buffer::FrameBuffer;
use crate::core::rasterizer::Rasterizer;
use crate::core::renderer::{MeshRenderer, RenderPass};
use crate::geometry::camera::{Camera, Viewport};
use crate::geometry::transform::{TransformId, TransformTree};
use crate::material_system::color::Color;
use crate::material_system::shader::Uniforms;
use log::debug;

/// 场景中的可渲染对象：层级中的一个变换节点 + 网格渲染器
#[derive(Debug, Clone)]
pub struct GameObject {
    pub name: String,
    pub transform: TransformId,
    pub renderer: MeshRenderer,
}

/// 表示一个完整的 3D 场景：变换层级、相机、对象与设备帧缓冲
///
/// 第 0 个相机为主相机。所有相机共享一块颜色缓冲，各自只清除自己视口内的深度。
pub struct Scene {
    /// 对象与骨骼共用的变换层级
    pub transforms: TransformTree,
    /// 每帧开始时清屏的颜色，`None` 表示保留上一帧
    pub background: Option<Color>,
    cameras: Vec<Camera>,
    objects: Vec<GameObject>,
    frame_buffer: FrameBuffer,
    clipper: Clipper,
    frame_number: u64,
}

impl Scene {
    /// 创建指定设备分辨率的空场景
    pub fn new(width: usize, height: usize) -> Self {
        Scene {
            transforms: TransformTree::new(),
            background: Some(Color::BLACK),
            cameras: Vec::new(),
            objects: Vec::new(),
            frame_buffer: FrameBuffer::new(width, height),
            clipper: Clipper::new(),
            frame_number: 0,
        }
    }

    /// 设备分辨率 `(width, height)`
    pub fn resolution(&self) -> (usize, usize) {
        (self.frame_buffer.width, self.frame_buffer.height)
    }

    // ===== 相机 =====

    /// 添加相机，视口裁到设备分辨率内，返回相机下标
    pub fn add_camera(&mut self, mut camera: Camera) -> usize {
        let resolution = self.resolution();
        let viewport = camera.viewport();
        camera.set_viewport(viewport, resolution);
        if camera.viewport() != viewport {
            debug!("相机 '{}' 的视口被裁剪为 {:?}", camera.name(), camera.viewport());
        }
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    /// 主相机（第 0 个）
    pub fn main_camera(&self) -> Option<&Camera> {
        self.cameras.first()
    }

    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    pub fn camera_mut(&mut self, index: usize) -> Option<&mut Camera> {
        self.cameras.get_mut(index)
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// 修改相机视口，同样裁到设备分辨率内
    pub fn set_camera_viewport(&mut self, index: usize, viewport: Viewport) -> Result<(), String> {
        let resolution = self.resolution();
        let camera = self
            .cameras
            .get_mut(index)
            .ok_or_else(|| format!("相机下标 {} 不存在", index))?;
        camera.set_viewport(viewport, resolution);
        Ok(())
    }

    // ===== 对象 =====

    /// 为对象新建一个根变换节点并加入场景
    pub fn add_object(&mut self, name: impl Into<String>, renderer: MeshRenderer) -> usize {
        let name = name.into();
        let transform = self.transforms.create(name.clone());
        self.push_object(GameObject {
            name,
            transform,
            renderer,
        })
    }

    /// 加入一个已经挂在层级中的对象
    pub fn push_object(&mut self, object: GameObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn object(&self, index: usize) -> Option<&GameObject> {
        self.objects.get(index)
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut GameObject> {
        self.objects.get_mut(index)
    }

    pub fn find_object(&self, name: &str) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    // ===== 帧 =====

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    /// 渲染一帧
    ///
    /// 帧号先加一，蒙皮缓存以帧号为键。对每个相机：清除其视口深度，
    /// 计算 V、P，再以 `P·V·M` 绘制每个对象。像素越界等错误会中止本帧。
    pub fn render_frame(&mut self) -> Result<(), String> {
        self.frame_number += 1;
        if let Some(background) = self.background {
            self.frame_buffer.clear_color(background);
        }

        for camera in &self.cameras {
            self.frame_buffer.clear_depth_region(&camera.viewport());
            let view = camera.view();
            let perspective = camera.perspective();

            let mut pass = RenderPass {
                rasterizer: Rasterizer::new(&mut self.frame_buffer, camera),
                clipper: &mut self.clipper,
                transforms: &self.transforms,
                frame: self.frame_number,
            };
            for object in &self.objects {
                let model = self.transforms.trs(object.transform);
                let uniforms = Uniforms::new(model, view, perspective);
                object.renderer.render_mesh(&mut pass, &uniforms)?;
            }
        }

        debug!(
            "第 {} 帧完成：{} 个相机，{} 个对象",
            self.frame_number,
            self.cameras.len(),
            self.objects.len()
        );
        Ok(())
    }
}
