/// Culling tool — per-camera visibility answers.
///
/// Owns the frame's camera snapshot (frustum planes, frustum bounds,
/// eye position) and the occluder geometry cache, and combines two
/// independent vetoes: the analytic 6-plane frustum test and a
/// conservative occlusion query. Either test alone may cull a box;
/// neither may cull a box that is actually visible.
///
/// One instance serves one caller thread and one camera at a time. A
/// second camera needing occlusion must use its own instance (the
/// coverage buffer cannot be shared across cameras within a frame).

use std::sync::Arc;
use glam::{Mat4, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};
use crate::camera::{Camera, Frustum};
use crate::config::CullingConfig;
use crate::engine_trace;
use crate::error::{Error, Result};
use crate::lifecycle::RenderLifecycle;
use crate::occlusion::{ClipPlanes, CullingResult, CullingThreadpool};
use crate::scene::{AABB, GeometryBuffer, Scene, SceneNodeKey};

// ===== OCCLUDER ENTRY =====

/// Occluder-ready geometry for one buffer, plus the nodes using it.
///
/// Conversion from the buffer's triangle soup happens once per buffer
/// per frame, no matter how many nodes share the mesh.
struct OccluderEntry {
    /// Flattened local-space xyz positions
    positions: Vec<f32>,
    /// Triangle indices
    indices: Vec<u32>,
    /// Local-space bounds, for the per-node clip classification
    bounds: AABB,
    /// Nodes rasterizing this buffer this frame
    nodes: FxHashSet<SceneNodeKey>,
}

impl OccluderEntry {
    fn from_buffer(buffer: &GeometryBuffer) -> Self {
        let mut positions = Vec::with_capacity(buffer.positions().len() * 3);
        for p in buffer.positions() {
            positions.extend_from_slice(&[p.x, p.y, p.z]);
        }
        Self {
            positions,
            indices: buffer.indices().to_vec(),
            bounds: *buffer.bounding_box(),
            nodes: FxHashSet::default(),
        }
    }
}

// ===== CULLING TOOL =====

/// Frustum + occlusion visibility tester.
pub struct CullingTool {
    config: CullingConfig,
    /// Injected pause controller; occluder submission is skipped while
    /// the device is paused
    lifecycle: Option<Arc<RenderLifecycle>>,

    // Per-frame camera snapshot, valid from `init` to the next `init`
    frustum: Frustum,
    frustum_box: AABB,
    camera_position: Vec3,
    projection_view: Mat4,
    near: f32,
    /// Shadow frusta ignore the near plane: their near side is the
    /// light's split plane, not a visibility boundary
    skip_near_plane: bool,

    /// Whether occlusion queries are live this frame
    occlusion_active: bool,
    /// Created on first occlusion-enabled `init`, reused across frames
    threadpool: Option<CullingThreadpool>,
    /// Occluder geometry registered this frame, keyed by buffer id
    occluders: FxHashMap<u64, OccluderEntry>,
}

impl CullingTool {
    /// Create a tool. `init` must be called before any query.
    pub fn new(config: CullingConfig) -> Self {
        Self {
            config,
            lifecycle: None,
            frustum: Frustum::from_view_projection(&Mat4::IDENTITY),
            frustum_box: AABB { min: Vec3::ZERO, max: Vec3::ZERO },
            camera_position: Vec3::ZERO,
            projection_view: Mat4::IDENTITY,
            near: 0.0,
            skip_near_plane: false,
            occlusion_active: false,
            threadpool: None,
            occluders: FxHashMap::default(),
        }
    }

    /// Inject the pause/resume controller.
    pub fn set_lifecycle(&mut self, lifecycle: Arc<RenderLifecycle>) {
        self.lifecycle = Some(lifecycle);
    }

    // ===== PER-FRAME SETUP =====

    /// Capture a camera for this frame.
    ///
    /// Extracts the frustum planes and bounds and, if requested,
    /// prepares the occlusion buffer: the threadpool is constructed
    /// once on first use, reused across frames, and its buffer cleared
    /// here for the new frame.
    pub fn init(&mut self, camera: &Camera, enable_occlusion: bool) {
        let projection_view = camera.view_projection_matrix();
        self.frustum = Frustum::from_view_projection(&projection_view);
        self.frustum_box = Frustum::world_bounds(&projection_view);
        self.projection_view = projection_view;
        self.camera_position = camera.position();
        self.near = camera.near();
        self.skip_near_plane = false;
        self.occluders.clear();

        self.occlusion_active = enable_occlusion && self.config.occlusion_enabled;
        if self.occlusion_active {
            if self.threadpool.is_none() {
                self.threadpool = Some(CullingThreadpool::new(
                    self.config.worker_threads,
                    self.config.bins_w,
                    self.config.bins_h,
                    self.config.max_jobs,
                    self.config.occlusion_width,
                    self.config.occlusion_height,
                ));
            }
            let pool = self.threadpool.as_ref().unwrap();
            pool.clear_buffer();
            pool.set_near_clip(self.near);
        }
    }

    /// Capture a directional-light/shadow camera for this frame.
    ///
    /// Identical to `init` except the near-plane test is skipped and
    /// occlusion is never enabled: shadow casters are not occlusion
    /// tested against the main view.
    pub fn init_shadow(&mut self, camera: &Camera, cascade: usize) -> Result<()> {
        let projection_view = *camera.cascade_projection_view(cascade).ok_or_else(|| {
            Error::InvalidOperation(format!(
                "shadow init with cascade {} but camera has {}",
                cascade,
                camera.cascade_count()
            ))
        })?;
        self.frustum = Frustum::from_view_projection(&projection_view);
        self.frustum_box = Frustum::world_bounds(&projection_view);
        self.projection_view = projection_view;
        self.camera_position = camera.position();
        self.near = camera.near();
        self.skip_near_plane = true;
        self.occlusion_active = false;
        self.occluders.clear();
        Ok(())
    }

    // ===== VISIBILITY QUERIES =====

    /// Frustum veto: true if the box is fully outside the frustum.
    pub fn is_view_culled(&self, bounds: &AABB) -> bool {
        // Early out for boxes nowhere near the frustum volume
        if !bounds.intersects(&self.frustum_box) {
            return true;
        }
        self.frustum
            .culls_corners(&bounds.corners(), self.skip_near_plane)
    }

    /// Occlusion veto: true if every projected pixel of the box is
    /// behind a rasterized occluder.
    ///
    /// Conservative: false when occlusion is off, when the eye is
    /// inside the box, or when the box straddles the eye plane
    /// (negative minimum post-divide w).
    pub fn is_occlusion_culled(&self, bounds: &AABB) -> bool {
        if !self.occlusion_active {
            return false;
        }
        let pool = match &self.threadpool {
            Some(pool) => pool,
            None => return false,
        };
        // Cannot be occluded from inside the box
        if bounds.contains_point(self.camera_position) {
            return false;
        }

        let mut xmin = f32::INFINITY;
        let mut xmax = f32::NEG_INFINITY;
        let mut ymin = f32::INFINITY;
        let mut ymax = f32::NEG_INFINITY;
        let mut wmin = f32::INFINITY;
        for corner in bounds.corners() {
            let clip = self.projection_view * corner.extend(1.0);
            wmin = wmin.min(clip.w);
            if clip.w <= 0.0 {
                continue;
            }
            xmin = xmin.min(clip.x / clip.w);
            xmax = xmax.max(clip.x / clip.w);
            ymin = ymin.min(clip.y / clip.w);
            ymax = ymax.max(clip.y / clip.w);
        }
        // Straddling the eye plane: unconditionally visible
        if wmin < 0.0 {
            return false;
        }

        pool.test_rect(xmin, ymin, xmax, ymax, wmin) == CullingResult::Occluded
    }

    /// Combined visibility veto.
    pub fn is_culled(&self, bounds: &AABB) -> bool {
        self.is_view_culled(bounds) || self.is_occlusion_culled(bounds)
    }

    /// Frustum veto for a bounding sphere (light volumes).
    pub fn is_sphere_culled(&self, center: Vec3, radius: f32) -> bool {
        self.frustum.culls_sphere(center, radius, self.skip_near_plane)
    }

    // ===== OCCLUDERS =====

    /// Register a node's geometry buffer as an occluder for this frame.
    ///
    /// Conversion to occluder-ready arrays happens once per buffer; a
    /// mesh shared by many nodes is converted a single time.
    pub fn add_occluder(&mut self, buffer: &GeometryBuffer, node: SceneNodeKey) {
        let entry = self
            .occluders
            .entry(buffer.id())
            .or_insert_with(|| OccluderEntry::from_buffer(buffer));
        entry.nodes.insert(node);
    }

    /// Drop all registered occluders.
    pub fn clear_occluders(&mut self) {
        self.occluders.clear();
    }

    /// Number of distinct occluder buffers currently registered.
    pub fn occluder_count(&self) -> usize {
        self.occluders.len()
    }

    /// Rasterize all registered occluders into the coverage buffer.
    ///
    /// Wakes the workers for the submission window and suspends them
    /// after; flushes before returning so subsequent queries see every
    /// submitted triangle. Skipped entirely while the device is paused
    /// or occlusion is off.
    pub fn process_occluders(&mut self, scene: &Scene) {
        if !self.occlusion_active {
            return;
        }
        if let Some(lifecycle) = &self.lifecycle {
            if lifecycle.is_paused() {
                engine_trace!("nova3d::CullingTool", "Occluders skipped: device paused");
                return;
            }
        }
        let pool = match &mut self.threadpool {
            Some(pool) => pool,
            None => return,
        };

        pool.wake_threads();
        for entry in self.occluders.values() {
            for &node_key in &entry.nodes {
                let node = match scene.node(node_key) {
                    Some(node) => node,
                    None => continue, // removed since registration
                };
                let mvp = self.projection_view * *node.world_matrix();
                let clip_mask = match classify_clip_planes(&entry.bounds, &mvp) {
                    Some(mask) => mask,
                    None => continue, // fully outside one plane
                };
                pool.set_matrix(Some(mvp));
                pool.render_triangles(
                    &entry.positions,
                    &entry.indices,
                    self.config.occluder_winding,
                    clip_mask,
                );
            }
        }
        pool.flush();
        pool.suspend_threads();
    }
}

/// Classify a box against the clip planes of `mvp`.
///
/// Returns `None` if all 8 corners are outside one plane (the occluder
/// cannot appear on screen), otherwise the set of planes the box
/// straddles, so the rasterizer clips conservatively instead of
/// culling.
fn classify_clip_planes(bounds: &AABB, mvp: &Mat4) -> Option<ClipPlanes> {
    const PLANES: [ClipPlanes; 5] = [
        ClipPlanes::LEFT,
        ClipPlanes::RIGHT,
        ClipPlanes::BOTTOM,
        ClipPlanes::TOP,
        ClipPlanes::NEAR,
    ];
    let mut outside = [0u32; 5];

    for corner in bounds.corners() {
        let clip = *mvp * corner.extend(1.0);
        if clip.x < -clip.w {
            outside[0] += 1;
        }
        if clip.x > clip.w {
            outside[1] += 1;
        }
        if clip.y < -clip.w {
            outside[2] += 1;
        }
        if clip.y > clip.w {
            outside[3] += 1;
        }
        if clip.w <= 0.0 {
            outside[4] += 1;
        }
    }

    let mut mask = ClipPlanes::empty();
    for (count, plane) in outside.iter().zip(PLANES) {
        if *count == 8 {
            return None;
        }
        if *count > 0 {
            mask |= plane;
        }
    }
    Some(mask)
}

#[cfg(test)]
#[path = "culling_tool_tests.rs"]
mod tests;
