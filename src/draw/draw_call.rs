/// Draw-call batcher — turns the frame's candidate nodes into the
/// minimum set of instanced indirect draws, culling as it goes.
///
/// Nodes surviving the visibility tests are grouped by geometry
/// buffer; each non-empty group becomes one indirect-draw descriptor
/// whose `first_instance` is the running sum of prior groups, so the
/// descriptor list and the packed per-instance array always agree on
/// offsets. The GPU collaborator uploads both and issues the draws.
///
/// Frame protocol: `prepare` → `add_node`* → `generate` → consume.
/// Calling `add_node` outside that window is caller discipline, not
/// checked here.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use rustc_hash::FxHashMap;
use crate::camera::Camera;
use crate::config::CullingConfig;
use crate::culling::CullingTool;
use crate::engine_warn;
use crate::scene::{GeometryBuffer, Scene, SceneNodeKey, VertexFormat};
use crate::utils::SlotTable;
use std::sync::Arc;

// ===== GPU RECORDS =====

/// One instanced indirect draw, laid out for direct GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawCommand {
    /// Indices to draw per instance
    pub index_count: u32,
    /// Number of instances
    pub instance_count: u32,
    /// Base index in the shared index pool
    pub first_index: u32,
    /// Base vertex added to each index
    pub vertex_offset: i32,
    /// Base instance: running sum of prior descriptors' counts
    pub first_instance: u32,
}

/// Per-instance data, one entry per surviving instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectData {
    /// World transform, column-major
    pub transform: [f32; 16],
    /// Slot in the material table
    pub material_slot: u32,
    /// Pad to a 16-byte boundary for SSBO rules
    pub _padding: [u32; 3],
}

impl ObjectData {
    fn new(world: &Mat4, material_slot: u32) -> Self {
        Self {
            transform: world.to_cols_array(),
            material_slot,
            _padding: [0; 3],
        }
    }
}

// ===== RENDER BUCKET =====

/// Surviving instances sharing one geometry buffer.
struct RenderBucket {
    buffer: Arc<GeometryBuffer>,
    instances: Vec<(SceneNodeKey, Mat4)>,
}

// ===== BATCHER =====

/// Per-frame draw-call batching over a visibility tester.
pub struct DrawCallBatcher {
    culling_tool: CullingTool,
    /// Buckets in insertion order; descriptor emission follows it
    buckets: Vec<RenderBucket>,
    bucket_index: FxHashMap<u64, usize>,
    commands: Vec<IndirectDrawCommand>,
    object_data: Vec<ObjectData>,
    /// Animated nodes needing skinning upload, deduplicated
    skinning_nodes: Vec<SceneNodeKey>,
    material_slots: SlotTable,
}

impl DrawCallBatcher {
    pub fn new(config: CullingConfig) -> Self {
        let material_capacity = config.material_slot_capacity;
        Self {
            culling_tool: CullingTool::new(config),
            buckets: Vec::new(),
            bucket_index: FxHashMap::default(),
            commands: Vec::new(),
            object_data: Vec::new(),
            skinning_nodes: Vec::new(),
            material_slots: SlotTable::new(material_capacity),
        }
    }

    /// The visibility tester this batcher culls with.
    ///
    /// Occlusion is disabled by `prepare`; a caller wanting occlusion
    /// culling re-initializes the tool through this accessor and runs
    /// `add_occluder`/`process_occluders` before feeding nodes.
    pub fn culling_tool(&self) -> &CullingTool {
        &self.culling_tool
    }

    /// Mutable access to the visibility tester.
    pub fn culling_tool_mut(&mut self) -> &mut CullingTool {
        &mut self.culling_tool
    }

    // ===== FRAME PROTOCOL =====

    /// Reset buckets and outputs and capture this frame's camera.
    ///
    /// Occlusion is disabled at this layer. If the material table
    /// overflowed last frame it is rebuilt here.
    pub fn prepare(&mut self, camera: &Camera) {
        self.buckets.clear();
        self.bucket_index.clear();
        self.commands.clear();
        self.object_data.clear();
        self.skinning_nodes.clear();

        if self.material_slots.needs_rebuild() {
            engine_warn!(
                "nova3d::DrawCallBatcher",
                "Material slot table overflowed, rebuilding"
            );
            self.material_slots.reset();
        }

        self.culling_tool.init(camera, false);
    }

    /// Consider one node for drawing this frame.
    ///
    /// Static meshes must have every buffer in the instanceable vertex
    /// format; mixed-format meshes cannot be homogeneously instanced
    /// and are dropped from consideration. Each surviving buffer joins
    /// its bucket after a per-buffer cull of its world-space bounds.
    pub fn add_node(&mut self, scene: &Scene, key: SceneNodeKey) {
        let node = match scene.node(key) {
            Some(node) => node,
            None => return,
        };
        let mesh = Arc::clone(node.mesh().current_mesh());

        if !node.mesh().is_animated() {
            let instanceable = mesh
                .buffers()
                .iter()
                .all(|buffer| buffer.format() == VertexFormat::Instanceable);
            if !instanceable {
                return;
            }
        }

        let world = *node.world_matrix();
        let mut added_skinning = false;
        for buffer in mesh.buffers() {
            let world_bounds = buffer.bounding_box().transformed(&world);
            if self.culling_tool.is_culled(&world_bounds) {
                continue;
            }

            let index = match self.bucket_index.get(&buffer.id()).copied() {
                Some(index) => index,
                None => {
                    let index = self.buckets.len();
                    self.bucket_index.insert(buffer.id(), index);
                    self.buckets.push(RenderBucket {
                        buffer: Arc::clone(buffer),
                        instances: Vec::new(),
                    });
                    index
                }
            };
            self.buckets[index].instances.push((key, world));

            if node.mesh().is_animated() && !added_skinning {
                added_skinning = true;
                if !self.skinning_nodes.contains(&key) {
                    self.skinning_nodes.push(key);
                }
            }
        }
    }

    /// Flatten the buckets into descriptors and per-instance data.
    ///
    /// Buckets are visited in insertion order; `first_instance` values
    /// are contiguous running sums, so descriptor N+1 starts exactly
    /// where descriptor N's instances end.
    pub fn generate(&mut self) {
        self.commands.clear();
        self.object_data.clear();

        let mut accumulated_instance = 0u32;
        for bucket in &self.buckets {
            if bucket.instances.is_empty() {
                continue;
            }
            let material_slot = self.material_slots.acquire(bucket.buffer.material());

            for (_key, world) in &bucket.instances {
                self.object_data.push(ObjectData::new(world, material_slot));
            }

            let instance_count = bucket.instances.len() as u32;
            self.commands.push(IndirectDrawCommand {
                index_count: bucket.buffer.index_count(),
                instance_count,
                first_index: bucket.buffer.first_index(),
                vertex_offset: bucket.buffer.vertex_offset(),
                first_instance: accumulated_instance,
            });
            accumulated_instance += instance_count;
        }
    }

    // ===== OUTPUTS =====

    /// Indirect-draw descriptors, in bucket insertion order
    pub fn commands(&self) -> &[IndirectDrawCommand] {
        &self.commands
    }

    /// Packed per-instance data, aligned with the descriptors
    pub fn object_data(&self) -> &[ObjectData] {
        &self.object_data
    }

    /// Animated nodes needing skinning upload this frame
    pub fn skinning_nodes(&self) -> &[SceneNodeKey] {
        &self.skinning_nodes
    }

    /// Whether the material table overflowed and awaits a rebuild
    pub fn needs_material_rebuild(&self) -> bool {
        self.material_slots.needs_rebuild()
    }

    /// Triangles submitted by the generated draws (telemetry).
    pub fn poly_count(&self) -> u32 {
        self.commands
            .iter()
            .map(|cmd| (cmd.index_count / 3) * cmd.instance_count)
            .sum()
    }
}

#[cfg(test)]
#[path = "draw_call_tests.rs"]
mod tests;
