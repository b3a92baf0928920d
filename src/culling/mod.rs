//! Visibility testing — analytic frustum culling combined with
//! occlusion queries against the threadpool's coverage+depth buffer.

mod culling_tool;

pub use culling_tool::CullingTool;
