/*!
# Nova3D Culling Core

CPU visibility and batching pipeline for the Nova3D renderer.

Once per frame and per camera this crate decides which scene instances
are actually visible and packs the survivors into GPU-submittable
indirect-draw parameters:

- **CullingThreadpool**: software occlusion rasterization scheduled
  across a worker pool with per-bin job queues
- **CullingTool**: analytic frustum test combined with occlusion
  queries against the shared coverage+depth buffer
- **ClusterDataGenerator**: screen-tile × depth-bin light/object
  membership bitsets for forward shading
- **DrawCallBatcher**: per-geometry instance buckets flattened into
  indirect-draw descriptors with running base-instance offsets

GPU submission, mesh loading, and window/device lifetime are external
collaborators: this crate produces draw *parameters*, never API calls.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod lifecycle;
pub mod camera;
pub mod scene;
pub mod occlusion;
pub mod culling;
pub mod cluster;
pub mod draw;
pub mod utils;

// Main nova3d namespace module
pub mod nova3d {
    // Error types
    pub use crate::error::{Error, Nova3dError, Nova3dResult, Result};

    // Engine singleton (logging services)
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they are crate-level
    }

    // Configuration
    pub use crate::config::CullingConfig;

    // Lifecycle controller
    pub use crate::lifecycle::{RenderLifecycle, LifecycleState};

    // Camera sub-module
    pub mod camera {
        pub use crate::camera::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Occlusion sub-module
    pub mod occlusion {
        pub use crate::occlusion::*;
    }

    // Culling sub-module
    pub mod culling {
        pub use crate::culling::*;
    }

    // Cluster sub-module
    pub mod cluster {
        pub use crate::cluster::*;
    }

    // Draw sub-module
    pub mod draw {
        pub use crate::draw::*;
    }
}

// Re-export math library at crate root
pub use glam;
