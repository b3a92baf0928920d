/// Configuration inputs for the culling core.
///
/// These are the externally-supplied constants of the pipeline: the
/// caller decides them once at startup and passes the struct to the
/// components that need it. Nothing in this crate reads global state
/// for configuration.

use crate::occlusion::BackfaceWinding;

/// Tuning constants for the visibility and batching pipeline.
///
/// All fields have sensible defaults; construct with
/// `CullingConfig::default()` and override what you need.
#[derive(Debug, Clone)]
pub struct CullingConfig {
    /// Master switch for software occlusion culling.
    pub occlusion_enabled: bool,

    /// Occlusion buffer width in pixels. Much smaller than the final
    /// render target; the buffer only answers conservative queries.
    pub occlusion_width: u32,

    /// Occlusion buffer height in pixels.
    pub occlusion_height: u32,

    /// Worker thread count for the occlusion raster threadpool.
    pub worker_threads: u32,

    /// Screen bin columns for occluder rasterization.
    /// `bins_w * bins_h` must be >= `worker_threads`.
    pub bins_w: u32,

    /// Screen bin rows for occluder rasterization.
    pub bins_h: u32,

    /// Capacity of the job ring buffer shared by all bins.
    pub max_jobs: u32,

    /// Triangle winding treated as back-facing by the occluder
    /// rasterizer.
    pub occluder_winding: BackfaceWinding,

    /// Resolution scale applied to the camera viewport before tile
    /// slicing in the cluster generator.
    pub render_scale: f32,

    /// Cluster tile size in (scaled) pixels.
    pub tile_size: u32,

    /// Number of quantized depth bins per tile slice.
    pub depth_divisions: u32,

    /// Objects per deferred cluster task.
    pub cluster_chunk_size: u32,

    /// Capacity of the batcher's material slot table. Slot 0 is
    /// reserved as the overflow fallback.
    pub material_slot_capacity: u32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            occlusion_enabled: true,
            occlusion_width: 640,
            occlusion_height: 360,
            worker_threads: 4,
            bins_w: 4,
            bins_h: 4,
            max_jobs: 64,
            occluder_winding: BackfaceWinding::Cw,
            render_scale: 1.0,
            tile_size: 64,
            depth_divisions: 32,
            cluster_chunk_size: 32,
            material_slot_capacity: 256,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
