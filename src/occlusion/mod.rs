//! Software occlusion culling — threadpool-scheduled occluder
//! rasterization over a shared conservative coverage+depth buffer.

mod depth_buffer;
mod job_queue;
mod threadpool;

pub use depth_buffer::{
    BackfaceWinding, ClipPlanes, CullingResult, MaskedDepthBuffer, ScissorRect, TriList,
};
pub use job_queue::TRIS_PER_JOB;
pub use threadpool::CullingThreadpool;
