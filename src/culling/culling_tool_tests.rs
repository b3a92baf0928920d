use std::sync::Arc;
use glam::{Mat4, Vec3};
use super::*;
use crate::camera::Camera;
use crate::config::CullingConfig;
use crate::lifecycle::RenderLifecycle;
use crate::scene::{GeometryBuffer, Mesh, NodeMesh, Scene, SceneNode, VertexFormat};

fn test_camera() -> Camera {
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    Camera::new(view, projection, Vec3::new(0.0, 0.0, 5.0), 0.1, 100.0, (640, 360))
}

fn small_config() -> CullingConfig {
    CullingConfig {
        worker_threads: 2,
        bins_w: 2,
        bins_h: 1,
        max_jobs: 8,
        occlusion_width: 64,
        occlusion_height: 64,
        ..CullingConfig::default()
    }
}

fn unit_box_at(center: Vec3) -> AABB {
    AABB { min: center - Vec3::splat(0.5), max: center + Vec3::splat(0.5) }
}

/// Quad occluder buffer: a wall at local z = 0 spanning ±`half`.
fn wall_buffer(half: f32) -> Arc<GeometryBuffer> {
    GeometryBuffer::new(
        VertexFormat::Instanceable,
        vec![
            Vec3::new(-half, -half, 0.0),
            Vec3::new(half, -half, 0.0),
            Vec3::new(half, half, 0.0),
            Vec3::new(-half, half, 0.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
        0,
        0,
        0,
    )
}

// ============================================================================
// Frustum soundness
// ============================================================================

#[test]
fn test_box_outside_all_planes_is_culled() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), false);

    assert!(tool.is_view_culled(&unit_box_at(Vec3::new(500.0, 0.0, 0.0))));
    assert!(tool.is_view_culled(&unit_box_at(Vec3::new(0.0, 0.0, 200.0))));
}

#[test]
fn test_box_containing_camera_is_not_culled() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), false);

    // Box around the eye position
    let bounds = AABB {
        min: Vec3::new(-1.0, -1.0, 4.0),
        max: Vec3::new(1.0, 1.0, 6.0),
    };
    assert!(!tool.is_view_culled(&bounds));
}

#[test]
fn test_box_in_front_of_camera_is_not_culled() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), false);

    assert!(!tool.is_view_culled(&unit_box_at(Vec3::ZERO)));
    assert!(!tool.is_culled(&unit_box_at(Vec3::ZERO)));
}

#[test]
fn test_sphere_culling() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), false);

    assert!(!tool.is_sphere_culled(Vec3::ZERO, 1.0));
    assert!(tool.is_sphere_culled(Vec3::new(500.0, 0.0, 0.0), 1.0));
    // Radius large enough to reach back into the frustum
    assert!(!tool.is_sphere_culled(Vec3::new(500.0, 0.0, 0.0), 600.0));
}

// ============================================================================
// Shadow init
// ============================================================================

#[test]
fn test_shadow_init_requires_cascade() {
    let mut tool = CullingTool::new(small_config());
    let camera = test_camera();
    assert!(tool.init_shadow(&camera, 0).is_err());
}

#[test]
fn test_shadow_init_skips_near_plane() {
    let mut tool = CullingTool::new(small_config());
    let mut camera = test_camera();
    // Light looking down -z from the origin
    let cascade = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 1.0, 50.0);
    camera.set_cascades(vec![cascade]);

    tool.init_shadow(&camera, 0).unwrap();

    // Between the light and its near plane: visible for shadow casting
    let bounds = unit_box_at(Vec3::new(0.0, 0.0, -0.4));
    assert!(!tool.is_view_culled(&bounds));

    // The main init would have culled the same box
    tool.init(
        &Camera::new(
            Mat4::IDENTITY,
            cascade,
            Vec3::ZERO,
            1.0,
            50.0,
            (640, 360),
        ),
        false,
    );
    assert!(tool.is_view_culled(&bounds));
}

#[test]
fn test_shadow_init_disables_occlusion() {
    let mut tool = CullingTool::new(small_config());
    let mut camera = test_camera();
    camera.set_cascades(vec![Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 1.0, 50.0)]);
    tool.init_shadow(&camera, 0).unwrap();

    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::ZERO)));
}

// ============================================================================
// Occlusion conservativeness
// ============================================================================

#[test]
fn test_no_occluders_means_nothing_occlusion_culled() {
    let mut tool = CullingTool::new(small_config());
    let scene = Scene::new();
    tool.init(&test_camera(), true);
    tool.process_occluders(&scene); // zero occluders submitted

    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::ZERO)));
    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -50.0))));
}

#[test]
fn test_occlusion_disabled_returns_false() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), false);
    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::ZERO)));
}

#[test]
fn test_camera_inside_box_is_not_occlusion_culled() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), true);

    let bounds = AABB {
        min: Vec3::new(-1.0, -1.0, 4.0),
        max: Vec3::new(1.0, 1.0, 6.0),
    };
    assert!(!tool.is_occlusion_culled(&bounds));
}

#[test]
fn test_box_straddling_eye_plane_is_visible() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), true);

    // Spans from in front of the eye to behind it: negative minimum w
    let bounds = AABB {
        min: Vec3::new(-0.5, -0.5, 0.0),
        max: Vec3::new(0.5, 0.5, 20.0),
    };
    assert!(!tool.is_occlusion_culled(&bounds));
}

// ============================================================================
// Occluder registration and processing
// ============================================================================

#[test]
fn test_occluder_dedup_per_buffer() {
    let mut tool = CullingTool::new(small_config());
    tool.init(&test_camera(), true);

    let buffer = wall_buffer(10.0);
    let mesh = Mesh::new(vec![Arc::clone(&buffer)]);
    let mut scene = Scene::new();
    let a = scene.add_node(SceneNode::new_occluder(
        NodeMesh::Static(Arc::clone(&mesh)),
        Mat4::IDENTITY,
    ));
    let b = scene.add_node(SceneNode::new_occluder(
        NodeMesh::Static(mesh),
        Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
    ));

    tool.add_occluder(&buffer, a);
    tool.add_occluder(&buffer, b);
    assert_eq!(tool.occluder_count(), 1);

    tool.clear_occluders();
    assert_eq!(tool.occluder_count(), 0);
}

#[test]
fn test_wall_occludes_box_behind_it() {
    // Wall at z = 0 facing the camera at z = 5; winding None so the
    // quad's orientation cannot accidentally back-face out
    let mut config = small_config();
    config.occluder_winding = crate::occlusion::BackfaceWinding::None;
    let mut tool = CullingTool::new(config);
    let camera = test_camera();
    tool.init(&camera, true);

    let buffer = wall_buffer(50.0);
    let mesh = Mesh::new(vec![Arc::clone(&buffer)]);
    let mut scene = Scene::new();
    let key = scene.add_node(SceneNode::new_occluder(
        NodeMesh::Static(mesh),
        Mat4::IDENTITY,
    ));

    tool.add_occluder(&buffer, key);
    tool.process_occluders(&scene);

    // Box behind the wall (from the camera's point of view)
    assert!(tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));
    assert!(tool.is_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));
    // Box between camera and wall stays visible
    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, 2.5))));
    // View test alone would keep the hidden box
    assert!(!tool.is_view_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));
}

#[test]
fn test_new_frame_clears_occlusion() {
    let mut config = small_config();
    config.occluder_winding = crate::occlusion::BackfaceWinding::None;
    let mut tool = CullingTool::new(config);
    let camera = test_camera();

    let buffer = wall_buffer(50.0);
    let mesh = Mesh::new(vec![Arc::clone(&buffer)]);
    let mut scene = Scene::new();
    let key = scene.add_node(SceneNode::new_occluder(
        NodeMesh::Static(mesh),
        Mat4::IDENTITY,
    ));

    tool.init(&camera, true);
    tool.add_occluder(&buffer, key);
    tool.process_occluders(&scene);
    assert!(tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));

    // Next frame: buffer cleared, occluders re-registered from scratch
    tool.init(&camera, true);
    assert_eq!(tool.occluder_count(), 0);
    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));
}

#[test]
fn test_paused_lifecycle_skips_occluders() {
    let mut config = small_config();
    config.occluder_winding = crate::occlusion::BackfaceWinding::None;
    let mut tool = CullingTool::new(config);
    let lifecycle = Arc::new(RenderLifecycle::new());
    lifecycle.start();
    tool.set_lifecycle(Arc::clone(&lifecycle));

    let buffer = wall_buffer(50.0);
    let mesh = Mesh::new(vec![Arc::clone(&buffer)]);
    let mut scene = Scene::new();
    let key = scene.add_node(SceneNode::new_occluder(
        NodeMesh::Static(mesh),
        Mat4::IDENTITY,
    ));

    lifecycle.request_pause();
    tool.init(&test_camera(), true);
    tool.add_occluder(&buffer, key);
    tool.process_occluders(&scene);

    // Nothing was rasterized while paused
    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));

    lifecycle.resume();
    tool.init(&test_camera(), true);
    tool.add_occluder(&buffer, key);
    tool.process_occluders(&scene);
    assert!(tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));
}

#[test]
fn test_removed_node_is_skipped() {
    let mut config = small_config();
    config.occluder_winding = crate::occlusion::BackfaceWinding::None;
    let mut tool = CullingTool::new(config);

    let buffer = wall_buffer(50.0);
    let mesh = Mesh::new(vec![Arc::clone(&buffer)]);
    let mut scene = Scene::new();
    let key = scene.add_node(SceneNode::new_occluder(
        NodeMesh::Static(mesh),
        Mat4::IDENTITY,
    ));

    tool.init(&test_camera(), true);
    tool.add_occluder(&buffer, key);
    scene.remove_node(key);
    tool.process_occluders(&scene);

    assert!(!tool.is_occlusion_culled(&unit_box_at(Vec3::new(0.0, 0.0, -20.0))));
}
