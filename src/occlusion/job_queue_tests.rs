use std::sync::Arc;
use super::*;

// Single-threaded walk of the queue protocol. The unsafe accessors are
// exercised under exactly the exclusivity rules the workers follow.

fn publish_job(queue: &RenderJobQueue) {
    let job = queue.job(queue.write_ptr());
    let binning = unsafe { job.binning_mut() };
    binning.positions = Arc::new(vec![0.0; 9]);
    binning.indices.clear();
    binning.indices.extend_from_slice(&[0, 1, 2]);
    binning.matrix = None;
    queue.advance_write_job();
}

// ============================================================================
// Initial state
// ============================================================================

#[test]
fn test_new_queue_is_empty() {
    let queue = RenderJobQueue::new(2, 4);
    assert!(queue.is_pipeline_empty());
    assert!(queue.can_write());
    assert!(!queue.can_bin());
    assert!(queue.claim_binning_job().is_none());
    assert!(queue.claim_render_job(0).is_none());
}

// ============================================================================
// Publish → bin → render
// ============================================================================

#[test]
fn test_publish_makes_binning_available() {
    let queue = RenderJobQueue::new(2, 4);
    publish_job(&queue);

    assert!(!queue.is_pipeline_empty());
    assert!(queue.can_bin());

    let claimed = queue.claim_binning_job();
    assert_eq!(claimed, Some(0));
    // A second claim finds nothing
    assert!(queue.claim_binning_job().is_none());
}

#[test]
fn test_render_waits_for_binning_completion() {
    let queue = RenderJobQueue::new(2, 4);
    publish_job(&queue);

    let ptr = queue.claim_binning_job().unwrap();
    // Not yet finished: renderers must not see the job
    assert!(queue.claim_render_job(0).is_none());

    queue.finish_binning_job(ptr);
    assert_eq!(queue.claim_render_job(0), Some(0));
}

#[test]
fn test_pipeline_empties_after_all_bins_advance() {
    let queue = RenderJobQueue::new(2, 4);
    publish_job(&queue);
    let ptr = queue.claim_binning_job().unwrap();
    queue.finish_binning_job(ptr);

    // Bin 0 renders
    assert_eq!(queue.claim_render_job(0), Some(0));
    queue.advance_render_job(0);
    assert!(!queue.is_pipeline_empty());

    // Bin 1 renders
    assert_eq!(queue.claim_render_job(1), Some(0));
    queue.advance_render_job(1);
    assert!(queue.is_pipeline_empty());
}

#[test]
fn test_bin_lock_excludes_second_claim() {
    let queue = RenderJobQueue::new(1, 4);
    publish_job(&queue);
    let ptr = queue.claim_binning_job().unwrap();
    queue.finish_binning_job(ptr);

    assert_eq!(queue.claim_render_job(0), Some(0));
    // Lock held: a second claim on the same bin fails
    assert!(queue.claim_render_job(0).is_none());

    queue.advance_render_job(0);
    // Released, but nothing left to render
    assert!(queue.claim_render_job(0).is_none());
}

// ============================================================================
// Backpressure
// ============================================================================

#[test]
fn test_ring_fills_at_capacity() {
    let queue = RenderJobQueue::new(1, 2);
    publish_job(&queue);
    publish_job(&queue);
    assert!(!queue.can_write());

    // Draining one job frees a slot
    let ptr = queue.claim_binning_job().unwrap();
    queue.finish_binning_job(ptr);
    assert_eq!(queue.claim_render_job(0), Some(0));
    queue.advance_render_job(0);
    assert!(queue.can_write());
}

#[test]
fn test_best_global_bin_prefers_least_advanced() {
    let queue = RenderJobQueue::new(2, 4);
    publish_job(&queue);
    let ptr = queue.claim_binning_job().unwrap();
    queue.finish_binning_job(ptr);

    // Advance bin 0 past the job; bin 1 is now least advanced
    assert_eq!(queue.claim_render_job(0), Some(0));
    queue.advance_render_job(0);
    assert_eq!(queue.best_global_bin(), Some(1));

    queue.claim_render_job(1);
    queue.advance_render_job(1);
    assert!(queue.best_global_bin().is_none());
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn test_reset_restores_initial_state() {
    let queue = RenderJobQueue::new(2, 4);
    publish_job(&queue);
    let ptr = queue.claim_binning_job().unwrap();
    queue.finish_binning_job(ptr);
    for bin in 0..2 {
        queue.claim_render_job(bin);
        queue.advance_render_job(bin);
    }

    queue.reset();
    assert!(queue.is_pipeline_empty());
    assert!(queue.can_write());
    assert!(!queue.can_bin());
    assert_eq!(queue.write_ptr(), 0);
}
