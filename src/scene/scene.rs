/// Scene node storage.
///
/// Uses a SlotMap for O(1) insert/remove with stable keys; the batcher
/// and occluder cache hold keys, never references, so nodes may be
/// removed between frames without invalidating anything.

use std::sync::Arc;
use glam::Mat4;
use slotmap::{SlotMap, new_key_type};
use super::geometry::Mesh;

new_key_type! {
    /// Stable key for a SceneNode within a Scene.
    ///
    /// Keys remain valid even after other nodes are removed.
    /// A key becomes invalid only when its own node is removed.
    pub struct SceneNodeKey;
}

// ===== NODE MESH =====

/// Closed set of mesh-bearing node kinds.
///
/// Both variants expose the same capability — the mesh to draw this
/// frame — so downstream code resolves it once instead of inspecting
/// node types repeatedly. Animated meshes additionally mark the node
/// for skinning upload by the GPU collaborator.
pub enum NodeMesh {
    /// A rigid mesh
    Static(Arc<Mesh>),
    /// A skinned mesh; the current pose's mesh is referenced
    Animated(Arc<Mesh>),
}

impl NodeMesh {
    /// The mesh to draw this frame, regardless of kind.
    pub fn current_mesh(&self) -> &Arc<Mesh> {
        match self {
            NodeMesh::Static(mesh) => mesh,
            NodeMesh::Animated(mesh) => mesh,
        }
    }

    /// Whether this node requires skinning data upload.
    pub fn is_animated(&self) -> bool {
        matches!(self, NodeMesh::Animated(_))
    }
}

// ===== SCENE NODE =====

/// A renderable node: a mesh variant plus its world transform.
pub struct SceneNode {
    /// Mesh payload
    mesh: NodeMesh,
    /// Local-to-world matrix (pre-computed by the caller)
    world: Mat4,
    /// Whether this node's geometry should be rasterized as an occluder
    occluder: bool,
}

impl SceneNode {
    /// Create a node.
    pub fn new(mesh: NodeMesh, world: Mat4) -> Self {
        Self { mesh, world, occluder: false }
    }

    /// Create a node whose geometry doubles as an occluder.
    pub fn new_occluder(mesh: NodeMesh, world: Mat4) -> Self {
        Self { mesh, world, occluder: true }
    }

    // ===== ACCESSORS =====

    /// Mesh payload
    pub fn mesh(&self) -> &NodeMesh {
        &self.mesh
    }

    /// Local-to-world matrix
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Update the local-to-world matrix
    pub fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
    }

    /// Whether this node is an occluder source
    pub fn is_occluder(&self) -> bool {
        self.occluder
    }
}

// ===== SCENE =====

/// A collection of scene nodes with stable keys.
pub struct Scene {
    nodes: SlotMap<SceneNodeKey, SceneNode>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key() }
    }

    /// Add a node, returning its stable key.
    pub fn add_node(&mut self, node: SceneNode) -> SceneNodeKey {
        self.nodes.insert(node)
    }

    /// Remove a node. Returns the node if the key was valid.
    pub fn remove_node(&mut self, key: SceneNodeKey) -> Option<SceneNode> {
        self.nodes.remove(key)
    }

    /// Look up a node by key.
    pub fn node(&self, key: SceneNodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    /// Look up a node mutably by key.
    pub fn node_mut(&mut self, key: SceneNodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    /// Iterate over all (key, node) pairs.
    pub fn nodes(&self) -> impl Iterator<Item = (SceneNodeKey, &SceneNode)> {
        self.nodes.iter()
    }

    /// Iterate over all node keys.
    pub fn node_keys(&self) -> impl Iterator<Item = SceneNodeKey> + '_ {
        self.nodes.keys()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove all nodes.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
