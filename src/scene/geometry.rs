/// Geometry types for the scene system.
///
/// A GeometryBuffer is the unit of batching: nodes whose meshes share a
/// buffer are instanced together by the draw-call batcher. Buffers carry
/// a process-unique identity so they can key hash maps without the
/// caller threading references around.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use glam::{Mat4, Vec3};

// ===== AABB =====

/// Axis-Aligned Bounding Box in local space
///
/// Used for frustum culling. Stored in local space and transformed
/// by the world matrix at culling time.
#[derive(Debug, Clone, Copy)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    /// Transform this local-space AABB by a matrix, returning a new AABB.
    ///
    /// Uses the Arvo method: projects each matrix axis onto the AABB extents
    /// for an exact (tight) result without transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        AABB { min: new_min, max: new_max }
    }

    /// Test if this AABB intersects (overlaps) another AABB.
    ///
    /// Returns `true` if the two AABBs overlap or touch.
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Test if a point lies inside (or on the boundary of) this AABB.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.x <= point.x && point.x <= self.max.x
        && self.min.y <= point.y && point.y <= self.max.y
        && self.min.z <= point.z && point.z <= self.max.z
    }

    /// The 8 corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Smallest AABB enclosing a set of points.
    ///
    /// Returns a degenerate box at the origin for an empty slice.
    pub fn from_points(points: &[Vec3]) -> AABB {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        if points.is_empty() {
            min = Vec3::ZERO;
            max = Vec3::ZERO;
        }
        AABB { min, max }
    }
}

// ===== VERTEX FORMAT =====

/// Vertex format of a geometry buffer.
///
/// Only `Instanceable` buffers share the layout the instanced draw path
/// expects; meshes mixing other formats are skipped by the batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// The shared instanceable layout (position/normal/uv/joints)
    Instanceable,
    /// Any other layout; drawable only by non-instanced paths
    Plain,
}

// ===== GEOMETRY BUFFER =====

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A GPU-resident geometry range plus the CPU-side triangle soup.
///
/// `first_index` / `vertex_offset` locate the range inside the shared
/// vertex/index pools the GPU collaborator owns; positions and indices
/// stay available on the CPU for occluder conversion.
pub struct GeometryBuffer {
    /// Process-unique identity (hash map key for buckets/occluders)
    id: u64,
    /// Vertex format of this buffer
    format: VertexFormat,
    /// Local-space bounds of the positions
    bounding_box: AABB,
    /// Local-space vertex positions
    positions: Vec<Vec3>,
    /// Triangle indices into `positions`
    indices: Vec<u32>,
    /// Base index inside the shared index pool
    first_index: u32,
    /// Base vertex inside the shared vertex pool
    vertex_offset: i32,
    /// Material identity assigned by the resource system
    material: u32,
}

impl GeometryBuffer {
    /// Create a buffer from triangle geometry.
    ///
    /// # Arguments
    ///
    /// * `format` - Vertex format of the source data
    /// * `positions` - Local-space vertex positions
    /// * `indices` - Triangle list indices (3 per triangle)
    /// * `first_index` - Base index in the shared index pool
    /// * `vertex_offset` - Base vertex in the shared vertex pool
    /// * `material` - Material identity
    pub fn new(
        format: VertexFormat,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        first_index: u32,
        vertex_offset: i32,
        material: u32,
    ) -> Arc<Self> {
        let bounding_box = AABB::from_points(&positions);
        Arc::new(Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            format,
            bounding_box,
            positions,
            indices,
            first_index,
            vertex_offset,
            material,
        })
    }

    // ===== ACCESSORS =====

    /// Process-unique buffer identity
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Vertex format
    pub fn format(&self) -> VertexFormat {
        self.format
    }

    /// Local-space bounding box
    pub fn bounding_box(&self) -> &AABB {
        &self.bounding_box
    }

    /// Local-space vertex positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Triangle indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Base index in the shared index pool
    pub fn first_index(&self) -> u32 {
        self.first_index
    }

    /// Base vertex in the shared vertex pool
    pub fn vertex_offset(&self) -> i32 {
        self.vertex_offset
    }

    /// Material identity
    pub fn material(&self) -> u32 {
        self.material
    }
}

// ===== MESH =====

/// A mesh: an ordered set of geometry buffers drawn together.
pub struct Mesh {
    buffers: Vec<Arc<GeometryBuffer>>,
}

impl Mesh {
    /// Create a mesh from its geometry buffers.
    pub fn new(buffers: Vec<Arc<GeometryBuffer>>) -> Arc<Self> {
        Arc::new(Self { buffers })
    }

    /// Geometry buffers, in draw order
    pub fn buffers(&self) -> &[Arc<GeometryBuffer>] {
        &self.buffers
    }

    /// Number of geometry buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
