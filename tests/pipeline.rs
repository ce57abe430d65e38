use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use skinned_rasterizer::core::clipper::Clipper;
use skinned_rasterizer::core::frame_buffer::FrameBuffer;
use skinned_rasterizer::core::rasterizer::Rasterizer;
use skinned_rasterizer::core::renderer::MeshRenderer;
use skinned_rasterizer::core::scene::Scene;
use skinned_rasterizer::geometry::camera::{Camera, Viewport};
use skinned_rasterizer::geometry::transform::TransformTree;
use skinned_rasterizer::material_system::color::Color;
use skinned_rasterizer::material_system::material::Material;
use skinned_rasterizer::material_system::shader::{ShaderContext, SolidColorShader, Uniforms};
use skinned_rasterizer::math::quaternion::angle_axis;
use skinned_rasterizer::model::mesh::{ClipVertex, Mesh, Vertex};
use skinned_rasterizer::model::primitives::skinned_column;
use skinned_rasterizer::skinning::SkinType;
use std::sync::Arc;

fn small_camera() -> Camera {
    Camera::new("main", Viewport::full(4, 4)).with_projection(90.0, 1.0, 100.0)
}

fn red() -> Material {
    Material::new("red").with_fragment_shader(Arc::new(SolidColorShader(Color::RED)))
}

/// 视空间 z = 2 处的三角形，y 向上顺时针（正面）
fn triangle_at_depth_two() -> [Vector3<f32>; 3] {
    [
        Vector3::new(-1.5, -1.5, 2.0),
        Vector3::new(0.0, 1.5, 2.0),
        Vector3::new(1.5, -1.5, 2.0),
    ]
}

fn triangle_mesh(corners: [Vector3<f32>; 3]) -> Mesh {
    let vertices = corners
        .iter()
        .map(|p| Vertex::new(*p, Vector2::zeros(), -Vector3::z()))
        .collect();
    Mesh::new("triangle", vertices, vec![0, 1, 2])
}

#[test]
fn depth_matches_projection_through_scene() {
    let mut scene = Scene::new(4, 4);
    scene.add_camera(small_camera());
    scene.add_object(
        "triangle",
        MeshRenderer::new(triangle_mesh(triangle_at_depth_two()), red()),
    );
    scene.render_frame().unwrap();

    let fb = scene.frame_buffer();
    assert_eq!(fb.get_pixel(2, 2).unwrap(), Color::RED);
    // A = 101/99, B = -200/99，NDC 深度为 (2A + B) / 2 = 1/99
    let depth = fb.get_depth(2, 2).unwrap();
    assert!((depth - 1.0 / 99.0).abs() < 1e-5, "depth = {}", depth);
}

#[test]
fn clipped_and_direct_paths_agree_for_inside_triangle() {
    let camera = small_camera();
    let material = red();
    let tree = TransformTree::new();
    let uniforms = Uniforms::new(Matrix4::identity(), camera.view(), camera.perspective());
    let ctx = ShaderContext {
        uniforms: &uniforms,
        material: &material,
        bones: None,
        transforms: &tree,
        frame: 1,
    };
    let clip = triangle_at_depth_two()
        .map(|p| ClipVertex::new(uniforms.object_to_clip_pos(&p.push(1.0))));

    let mut direct = FrameBuffer::new(4, 4);
    Rasterizer::new(&mut direct, &camera)
        .draw_triangle(&clip, &material, &ctx)
        .unwrap();

    let mut clipped = FrameBuffer::new(4, 4);
    let mut clipper = Clipper::new();
    let pieces = clipper.clip(clip);
    assert_eq!(pieces.len(), 1);
    let mut raster = Rasterizer::new(&mut clipped, &camera);
    for piece in pieces {
        raster.draw_triangle(&piece.vertices, &material, &ctx).unwrap();
    }

    assert_eq!(direct.get_color_buffer_bytes(), clipped.get_color_buffer_bytes());
    assert_eq!(direct.get_depth_buffer_f32(), clipped.get_depth_buffer_f32());
}

#[test]
fn triangle_crossing_near_plane_stays_in_range() {
    let mut scene = Scene::new(16, 16);
    scene.add_camera(Camera::new("main", Viewport::full(16, 16)).with_projection(90.0, 1.0, 100.0));
    // 一个顶点在相机后方
    let corners = [
        Vector3::new(-3.0, -1.0, 4.0),
        Vector3::new(0.0, 1.0, -2.0),
        Vector3::new(3.0, -1.0, 4.0),
    ];
    let material = Material {
        backface_culling: false,
        ..red()
    };
    scene.add_object("crossing", MeshRenderer::new(triangle_mesh(corners), material));
    scene.render_frame().unwrap();

    let fb = scene.frame_buffer();
    let drawn: Vec<f32> = fb
        .get_depth_buffer_f32()
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .collect();
    assert!(!drawn.is_empty());
    assert!(drawn.iter().all(|d| (-1.0 - 1e-4..=1.0 + 1e-4).contains(d)));
}

#[test]
fn overlapping_objects_resolve_by_depth_in_any_order() {
    let render = |near_first: bool| {
        let mut scene = Scene::new(8, 8);
        scene.add_camera(Camera::new("main", Viewport::full(8, 8)).with_projection(90.0, 1.0, 100.0));
        let near = triangle_mesh(triangle_at_depth_two());
        let far = triangle_mesh(triangle_at_depth_two().map(|p| p * 2.0));
        let blue = Material::new("blue").with_fragment_shader(Arc::new(SolidColorShader(Color::BLUE)));
        if near_first {
            scene.add_object("near", MeshRenderer::new(near, red()));
            scene.add_object("far", MeshRenderer::new(far, blue));
        } else {
            scene.add_object("far", MeshRenderer::new(far, blue));
            scene.add_object("near", MeshRenderer::new(near, red()));
        }
        scene.render_frame().unwrap();
        scene.frame_buffer().get_color_buffer_bytes().to_vec()
    };

    let a = render(true);
    let b = render(false);
    assert_eq!(a, b);
    // 中心像素属于近处的红色三角形
    let center = (4 * 8 + 4) * 4;
    assert_eq!(&a[center..center + 4], &Color::RED.to_array());
}

#[test]
fn skinned_column_renders_under_both_skin_types() {
    for skin_type in [SkinType::Linear, SkinType::DualQuaternion] {
        let mut scene = Scene::new(48, 48);
        let mut camera = Camera::new("main", Viewport::full(48, 48)).with_projection(60.0, 0.1, 50.0);
        camera.look_at(Vector3::new(0.0, 1.0, -5.0), Vector3::new(0.0, 1.0, 0.0), Vector3::y());
        scene.add_camera(camera);

        let column = skinned_column(&mut scene.transforms, 2.0, 0.3, 8, 0.4, skin_type).unwrap();
        let joint = column.joint;
        let mut renderer = MeshRenderer::new(column.mesh, red());
        renderer.bone_visible = true;
        scene.add_object("column", renderer);

        scene.render_frame().unwrap();
        let straight = scene.frame_buffer().get_color_buffer_bytes().to_vec();

        scene.transforms.set_local_rotation(joint, angle_axis(90.0, &Vector3::z()));
        scene.render_frame().unwrap();
        let bent = scene.frame_buffer().get_color_buffer_bytes();

        assert_eq!(scene.frame_number(), 2);
        let red_pixels = bent
            .chunks_exact(4)
            .filter(|p| *p == Color::RED.to_array())
            .count();
        assert!(red_pixels > 0, "{:?}", skin_type);
        assert_ne!(straight.as_slice(), bent, "{:?}", skin_type);
    }
}

#[test]
fn huge_viewport_coordinates_rasterize_without_overflow() {
    let camera = small_camera();
    let material = Material {
        use_perspective: false,
        ..red()
    };
    let tree = TransformTree::new();
    let uniforms = Uniforms::new(Matrix4::identity(), Matrix4::identity(), Matrix4::identity());
    let ctx = ShaderContext {
        uniforms: &uniforms,
        material: &material,
        bones: None,
        transforms: &tree,
        frame: 1,
    };
    // 屏幕坐标饱和到 i32 边界，三角形覆盖整个视口
    let triangle = [
        ClipVertex::new(Vector4::new(-3.0e9, -3.0e9, 0.5, 1.0)),
        ClipVertex::new(Vector4::new(0.0, 3.0e9, 0.5, 1.0)),
        ClipVertex::new(Vector4::new(3.0e9, -3.0e9, 0.5, 1.0)),
    ];

    let mut frame = FrameBuffer::new(4, 4);
    Rasterizer::new(&mut frame, &camera)
        .draw_triangle(&triangle, &material, &ctx)
        .unwrap();
    assert_eq!(frame.get_pixel(2, 2).unwrap(), Color::RED);
    assert!((frame.get_depth(2, 2).unwrap() - 0.5).abs() < 1e-5);
}

#[test]
fn clip_space_helpers_agree() {
    let camera = small_camera();
    let clip = Vector4::new(1.0, -1.0, 0.5, 2.0);
    let ndc = camera.clip_to_ndc(&clip);
    let viewport = camera.clip_to_viewport(&clip);
    assert_eq!(ndc, Vector4::new(0.5, -0.5, 0.25, 1.0));
    assert_eq!(viewport.xy(), camera.ndc_to_viewport(&ndc).xy());
    assert_eq!(viewport.w, 0.5);
}
