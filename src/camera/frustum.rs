/// Frustum — six clipping planes for visibility culling.
///
/// Each plane is represented as a Vec4 (A, B, C, D) where:
/// - (A, B, C) is the inward-pointing normal
/// - D is the signed distance
/// - A point P is inside the frustum if dot(plane, P_homogeneous) >= 0 for all planes
///
/// The caller is responsible for computing and setting the frustum.
/// `from_view_projection()` extracts it from a projection-view matrix.

use glam::{Mat4, Vec3, Vec4};
use crate::scene::AABB;

/// Frustum plane indices
pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

/// Six frustum planes for culling.
///
/// Each plane is (A, B, C, D) where Ax + By + Cz + D = 0.
/// Normal (A, B, C) points inward (toward the visible volume).
/// Works with both perspective and orthographic projections.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Frustum planes: left, right, bottom, top, near, far
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Uses the Gribb & Hartmann method. Works for both perspective
    /// and orthographic projections.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let m = vp.to_cols_array_2d();

        // Gribb & Hartmann: extract planes from rows of the VP matrix
        // Each plane is normalized so that (A, B, C) is a unit vector
        let mut planes = [
            // Left:   row3 + row0
            Vec4::new(m[0][3] + m[0][0], m[1][3] + m[1][0], m[2][3] + m[2][0], m[3][3] + m[3][0]),
            // Right:  row3 - row0
            Vec4::new(m[0][3] - m[0][0], m[1][3] - m[1][0], m[2][3] - m[2][0], m[3][3] - m[3][0]),
            // Bottom: row3 + row1
            Vec4::new(m[0][3] + m[0][1], m[1][3] + m[1][1], m[2][3] + m[2][1], m[3][3] + m[3][1]),
            // Top:    row3 - row1
            Vec4::new(m[0][3] - m[0][1], m[1][3] - m[1][1], m[2][3] - m[2][1], m[3][3] - m[3][1]),
            // Near:   row3 + row2
            Vec4::new(m[0][3] + m[0][2], m[1][3] + m[1][2], m[2][3] + m[2][2], m[3][3] + m[3][2]),
            // Far:    row3 - row2
            Vec4::new(m[0][3] - m[0][2], m[1][3] - m[1][2], m[2][3] - m[2][2], m[3][3] - m[3][2]),
        ];

        // Normalize each plane
        for plane in &mut planes {
            let normal_len = Vec3::new(plane.x, plane.y, plane.z).length();
            if normal_len > 0.0 {
                *plane /= normal_len;
            }
        }

        Self { planes }
    }

    /// Test whether one plane fully culls all 8 corners of a box.
    ///
    /// A plane culls the box only if every corner is on its negative
    /// side; a corner on or inside any plane keeps the box alive for
    /// that plane. With `skip_near` the near plane is ignored (shadow
    /// frusta clip differently: their near side is the light's split
    /// plane, not a visibility boundary).
    ///
    /// Returns `true` if the box is fully outside some plane.
    /// May return false negatives for boxes outside an edge but inside
    /// every single plane (conservative: never culls a visible box).
    pub fn culls_corners(&self, corners: &[Vec3; 8], skip_near: bool) -> bool {
        for (idx, plane) in self.planes.iter().enumerate() {
            if skip_near && idx == PLANE_NEAR {
                continue;
            }
            let normal = Vec3::new(plane.x, plane.y, plane.z);
            let mut outside = 0;
            for corner in corners {
                if normal.dot(*corner) + plane.w < 0.0 {
                    outside += 1;
                }
            }
            if outside == 8 {
                return true;
            }
        }
        false
    }

    /// Test whether the frustum fully culls a sphere.
    ///
    /// Returns `true` if the sphere center is farther than `radius`
    /// behind any plane.
    pub fn culls_sphere(&self, center: Vec3, radius: f32, skip_near: bool) -> bool {
        for (idx, plane) in self.planes.iter().enumerate() {
            if skip_near && idx == PLANE_NEAR {
                continue;
            }
            let normal = Vec3::new(plane.x, plane.y, plane.z);
            if normal.dot(center) + plane.w < -radius {
                return true;
            }
        }
        false
    }

    /// World-space bounding box of the frustum volume.
    ///
    /// Unprojects the 8 corners of the NDC cube (zero-to-one depth)
    /// through the inverse projection-view matrix. Used as a cheap
    /// AABB/AABB early-out before the per-plane corner test.
    pub fn world_bounds(vp: &Mat4) -> AABB {
        let inv = vp.inverse();
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for x in [-1.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for z in [0.0f32, 1.0] {
                    let corner = inv.project_point3(Vec3::new(x, y, z));
                    min = min.min(corner);
                    max = max.max(corner);
                }
            }
        }
        AABB { min, max }
    }
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
