//! Draw-call batching — per-geometry instance buckets flattened into
//! indirect-draw descriptors and a packed per-instance data array.

mod draw_call;

pub use draw_call::{DrawCallBatcher, IndirectDrawCommand, ObjectData};
