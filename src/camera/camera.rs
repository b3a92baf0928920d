/// Camera — immutable-for-the-frame view state.
///
/// A plain data container: view and projection matrices, eye position,
/// clip distances and viewport size, plus optional shadow-cascade
/// projection-view matrices for directional lights. The culling
/// components snapshot what they need from it at `init` time and never
/// hold a reference afterward.

use glam::{Mat4, Vec3};

/// Per-frame camera state consumed by the culling pipeline.
///
/// Projection matrices are expected in the zero-to-one depth convention
/// (`Mat4::perspective_rh` / `Mat4::orthographic_rh`).
#[derive(Debug, Clone)]
pub struct Camera {
    /// World-to-view matrix
    view: Mat4,
    /// View-to-clip matrix
    projection: Mat4,
    /// World-space eye position
    position: Vec3,
    /// Near clip distance
    near: f32,
    /// Far clip distance
    far: f32,
    /// Viewport size in pixels (width, height)
    viewport: (u32, u32),
    /// Projection-view matrices of shadow cascades, near to far
    cascades: Vec<Mat4>,
}

impl Camera {
    /// Create a camera snapshot from caller-computed matrices.
    pub fn new(
        view: Mat4,
        projection: Mat4,
        position: Vec3,
        near: f32,
        far: f32,
        viewport: (u32, u32),
    ) -> Self {
        Self {
            view,
            projection,
            position,
            near,
            far,
            viewport,
            cascades: Vec::new(),
        }
    }

    /// Replace the shadow-cascade projection-view matrices.
    pub fn set_cascades(&mut self, cascades: Vec<Mat4>) {
        self.cascades = cascades;
    }

    // ===== ACCESSORS =====

    /// World-to-view matrix
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// View-to-clip matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    /// Combined projection * view matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }

    /// World-space eye position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Near clip distance
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Far clip distance
    pub fn far(&self) -> f32 {
        self.far
    }

    /// Viewport size in pixels
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Number of shadow cascades
    pub fn cascade_count(&self) -> usize {
        self.cascades.len()
    }

    /// Projection-view matrix of one shadow cascade
    pub fn cascade_projection_view(&self, index: usize) -> Option<&Mat4> {
        self.cascades.get(index)
    }

    /// Far-plane corners in view space: (far-left-down, far-right-up).
    ///
    /// Used by the cluster generator to interpolate tile boundary rays
    /// across the far plane.
    pub fn far_corners_view(&self) -> (Vec3, Vec3) {
        let inv_proj = self.projection.inverse();
        let fld = inv_proj.project_point3(Vec3::new(-1.0, -1.0, 1.0));
        let fru = inv_proj.project_point3(Vec3::new(1.0, 1.0, 1.0));
        (fld, fru)
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
