use glam::Mat4;
use super::*;
use super::super::depth_buffer::{BackfaceWinding, ClipPlanes, CullingResult};

fn projection() -> Mat4 {
    Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0)
}

/// Screen-filling quad at view depth `d` (two CCW triangles).
fn quad_at_depth(d: f32) -> (Vec<f32>, Vec<u32>) {
    let positions = vec![
        -d, -d, -d,
        d, -d, -d,
        d, d, -d,
        -d, d, -d,
    ];
    let indices = vec![0, 1, 2, 0, 2, 3];
    (positions, indices)
}

fn small_pool() -> CullingThreadpool {
    CullingThreadpool::new(2, 2, 1, 8, 64, 64)
}

// ============================================================================
// Completeness: submit → flush → query
// ============================================================================

#[test]
fn test_flushed_quad_occludes() {
    let mut pool = small_pool();
    pool.wake_threads();

    let (positions, indices) = quad_at_depth(0.5);
    pool.set_matrix(Some(projection()));
    pool.render_triangles(&positions, &indices, BackfaceWinding::Cw, ClipPlanes::empty());
    pool.flush();

    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 1.0),
        CullingResult::Occluded
    );
    pool.suspend_threads();
}

#[test]
fn test_empty_flush_leaves_everything_visible() {
    let pool = small_pool();
    pool.wake_threads();
    pool.flush();

    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 100.0),
        CullingResult::Visible
    );
    pool.suspend_threads();
}

#[test]
fn test_multi_chunk_submission() {
    let mut pool = small_pool();
    pool.wake_threads();
    pool.set_matrix(Some(projection()));

    // One submission spanning several jobs: repeat the quad until the
    // triangle count exceeds multiple chunks
    let (positions, indices) = quad_at_depth(0.5);
    let mut many_indices = Vec::new();
    while many_indices.len() / 3 < TRIS_PER_JOB * 2 + 100 {
        many_indices.extend_from_slice(&indices);
    }
    pool.render_triangles(&positions, &many_indices, BackfaceWinding::Cw, ClipPlanes::empty());
    pool.flush();

    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 1.0),
        CullingResult::Occluded
    );
    pool.suspend_threads();
}

#[test]
fn test_caller_buffers_may_mutate_after_submit() {
    let mut pool = small_pool();
    pool.wake_threads();
    pool.set_matrix(Some(projection()));

    let (mut positions, mut indices) = quad_at_depth(0.5);
    pool.render_triangles(&positions, &indices, BackfaceWinding::Cw, ClipPlanes::empty());

    // Stomp the caller's buffers immediately: the pool copied them
    positions.iter_mut().for_each(|v| *v = 9999.0);
    indices.clear();

    pool.flush();
    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 1.0),
        CullingResult::Occluded
    );
    pool.suspend_threads();
}

// ============================================================================
// Frame lifecycle
// ============================================================================

#[test]
fn test_clear_buffer_resets_occlusion() {
    let mut pool = small_pool();
    pool.wake_threads();
    pool.set_matrix(Some(projection()));

    let (positions, indices) = quad_at_depth(0.5);
    pool.render_triangles(&positions, &indices, BackfaceWinding::Cw, ClipPlanes::empty());
    pool.flush();
    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 1.0),
        CullingResult::Occluded
    );

    pool.clear_buffer();
    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 1.0),
        CullingResult::Visible
    );
    pool.suspend_threads();
}

#[test]
fn test_wake_suspend_cycles() {
    let mut pool = small_pool();
    pool.set_matrix(Some(projection()));
    let (positions, indices) = quad_at_depth(0.5);

    for _ in 0..3 {
        pool.wake_threads();
        pool.render_triangles(&positions, &indices, BackfaceWinding::Cw, ClipPlanes::empty());
        pool.flush();
        pool.suspend_threads();
    }

    assert_eq!(
        pool.test_rect(-1.0, -1.0, 1.0, 1.0, 1.0),
        CullingResult::Occluded
    );
}

#[test]
fn test_drop_without_wake() {
    // Workers park at spawn; dropping must join them cleanly
    let pool = small_pool();
    drop(pool);
}

#[test]
fn test_resolution_accessor() {
    let pool = small_pool();
    assert_eq!(pool.resolution(), (64, 64));
}

// ============================================================================
// test_triangles
// ============================================================================

#[test]
fn test_triangle_query_against_occluder() {
    let mut pool = small_pool();
    pool.wake_threads();
    pool.set_matrix(Some(projection()));

    let (positions, indices) = quad_at_depth(0.5);
    pool.render_triangles(&positions, &indices, BackfaceWinding::Cw, ClipPlanes::empty());
    pool.flush();
    pool.suspend_threads();

    let (far_positions, far_indices) = quad_at_depth(20.0);
    assert_eq!(
        pool.test_triangles(&far_positions, &far_indices),
        CullingResult::Occluded
    );
    let (near_positions, near_indices) = quad_at_depth(0.2);
    assert_eq!(
        pool.test_triangles(&near_positions, &near_indices),
        CullingResult::Visible
    );
}
