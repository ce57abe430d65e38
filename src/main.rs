use log::{debug, info};
use skinned_rasterizer::core::renderer::MeshRenderer;
use skinned_rasterizer::core::scene::Scene;
use skinned_rasterizer::geometry::camera::{Camera, Viewport};
use skinned_rasterizer::geometry::pose::Pose;
use skinned_rasterizer::geometry::transform::TransformId;
use skinned_rasterizer::io::obj_loader::{load_obj_mesh, normalize_and_center};
use skinned_rasterizer::io::render_settings::RenderSettings;
use skinned_rasterizer::io::simple_cli::SimpleCli;
use skinned_rasterizer::material_system::color::Color;
use skinned_rasterizer::material_system::material::Material;
use skinned_rasterizer::material_system::shader::LambertFragmentShader;
use skinned_rasterizer::material_system::texture::{Texture, load_texture};
use skinned_rasterizer::math::quaternion::angle_axis;
use skinned_rasterizer::model::mesh::Mesh;
use skinned_rasterizer::model::primitives::skinned_column;
use skinned_rasterizer::utils::save_utils::save_render_result;
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;
use std::time::Instant;

/// 演示场景：一个对象，内置柱体时还有可弯曲的关节
struct DemoScene {
    scene: Scene,
    object: TransformId,
    base_rotation: UnitQuaternion<f32>,
    joint: Option<TransformId>,
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = SimpleCli::process()?;
    settings.validate()?;
    info!(
        "渲染 {}x{}，{} 帧，模式: {}",
        settings.width,
        settings.height,
        settings.frames,
        settings.get_mode_description()
    );

    let start_time = Instant::now();
    let mut demo = build_scene(&settings)?;
    info!("场景构建完成，耗时 {:?}", start_time.elapsed());

    for frame in 0..settings.frames {
        let frame_start = Instant::now();
        animate(&mut demo, &settings, frame);
        demo.scene.render_frame()?;

        let name = format!("{}_{:03}", settings.output, frame);
        let path = save_render_result(
            demo.scene.frame_buffer(),
            &settings.output_dir,
            &name,
            settings.save_depth,
        )?;
        debug!("第 {} 帧渲染耗时 {:?}，输出 {}", frame, frame_start.elapsed(), path);
    }

    info!("全部完成，总耗时 {:?}", start_time.elapsed());
    Ok(())
}

fn build_scene(settings: &RenderSettings) -> Result<DemoScene, String> {
    let mut scene = Scene::new(settings.width, settings.height);
    scene.background = Some(settings.get_background_color());

    let mut camera = Camera::new("main", Viewport::full(settings.width, settings.height))
        .with_projection(settings.camera_fov, settings.z_near, settings.z_far);
    camera.transform_mut().set_pose(Pose::from_rotation_position(
        settings.get_camera_rotation(),
        settings.get_camera_position(),
    ));
    scene.add_camera(camera);

    let texture = match &settings.texture {
        Some(path) => load_texture(path, Color::MISSING_TEXTURE),
        None => Texture::checker(256, 256, 32, Color::WHITE, Color::GRAY),
    };

    let mut material = Material {
        wireframe: settings.wireframe,
        wireframe_color: Color::WHITE,
        backface_culling: settings.backface_culling,
        use_perspective: settings.use_perspective,
        z_test: settings.z_test,
        alpha_blend: settings.alpha_blend,
        ..Material::new("main")
    }
    .with_texture(Arc::new(texture));
    if settings.use_lighting {
        material = material.with_fragment_shader(Arc::new(LambertFragmentShader::new(
            settings.get_light_dir(),
            settings.ambient,
        )));
    }

    let (mesh, joint) = match &settings.obj {
        Some(path) => {
            let mut mesh = load_obj_mesh(path)?;
            let (center, scale) = normalize_and_center(&mut mesh, 2.0);
            debug!("模型中心 {:?}，缩放系数 {:.3}", center, scale);
            (mesh, None)
        }
        None => {
            let column = skinned_column(
                &mut scene.transforms,
                2.0,
                0.3,
                12,
                0.4,
                settings.get_skin_type(),
            )?;
            if settings.skinning {
                info!("骨骼层级:\n{}", column.mesh.bone_hierarchy(&scene.transforms));
                (column.mesh, Some(column.joint))
            } else {
                (rigid(column.mesh), None)
            }
        }
    };

    let mut renderer = MeshRenderer::new(mesh, material);
    renderer.bone_visible = settings.show_bones && joint.is_some();
    let index = scene.add_object("model", renderer);
    let object = scene
        .object(index)
        .map(|o| o.transform)
        .ok_or_else(|| "对象创建失败".to_string())?;

    let (position, base_rotation, scale) = settings.get_object_transform_components();
    scene
        .transforms
        .set_local_transform(object, scale, base_rotation, position);

    Ok(DemoScene {
        scene,
        object,
        base_rotation,
        joint,
    })
}

/// 去掉蒙皮，得到静态网格
fn rigid(mut mesh: Mesh) -> Mesh {
    for vertex in &mut mesh.vertices {
        vertex.deformer = None;
    }
    mesh.bones.clear();
    mesh
}

/// 第 `frame` 帧：物体绕 Y 轴自转，关节从 0 弯到 `bend_angle`
fn animate(demo: &mut DemoScene, settings: &RenderSettings, frame: usize) {
    let spin = angle_axis(settings.spin_speed * frame as f32, &Vector3::y());
    demo.scene
        .transforms
        .set_local_rotation(demo.object, spin * demo.base_rotation);

    if let Some(joint) = demo.joint {
        let t = if settings.frames > 1 {
            frame as f32 / (settings.frames - 1) as f32
        } else {
            1.0
        };
        let bend = angle_axis(settings.bend_angle * t, &Vector3::z());
        demo.scene.transforms.set_local_rotation(joint, bend);
    }
}
