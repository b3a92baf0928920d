/// Culling threadpool — decouples occluder submission from
/// rasterization.
///
/// The screen is partitioned into `bins_w * bins_h` disjoint
/// rectangles, each with an independent FIFO of render jobs over the
/// shared job ring. Workers are long-lived OS threads toggled between
/// a busy-spin active state (the occluder-submission window) and a
/// condvar-parked suspended state.
///
/// Exactly one thread may submit triangles per pool instance; queries
/// may come from that same thread at any time. `test_rect` and
/// `test_triangles` do not wait for outstanding jobs — a caller that
/// must not under-cull calls `flush` first. False "visible" answers
/// are safe, false "occluded" answers are not.

use std::sync::{Arc, Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use glam::Mat4;
use crate::engine_debug;
use super::depth_buffer::{
    BackfaceWinding, ClipPlanes, CullingResult, MaskedDepthBuffer, ScissorRect, TriList,
};
use super::job_queue::{RenderJobQueue, TRIS_PER_JOB};

// ===== SHARED STATE =====

/// State shared between the owner thread and the workers.
struct PoolShared {
    queue: RenderJobQueue,
    buffer: MaskedDepthBuffer,
    rects: Vec<ScissorRect>,
    num_threads: u32,
    num_bins: u32,
    bins_w: u32,
    /// Workers exit their loops once set
    kill: AtomicBool,
    /// Workers park on the condvar while set
    suspend: AtomicBool,
    /// Number of workers currently parked
    suspended_count: Mutex<u32>,
    suspended_cv: Condvar,
}

// ===== WORKER LOOP =====

fn thread_main(shared: Arc<PoolShared>, thread_idx: u32) {
    loop {
        let mut thread_is_idle = true;
        let mut thread_bin_idx = thread_idx;

        // Park until woken (low CPU load sleep)
        {
            let mut count = shared.suspended_count.lock().unwrap();
            *count += 1;
            while shared.suspend.load(Ordering::Acquire) && !shared.kill.load(Ordering::Acquire) {
                count = shared.suspended_cv.wait(count).unwrap();
            }
            *count -= 1;
        }

        // Loop until suspended again
        while !shared.suspend.load(Ordering::Acquire) || !thread_is_idle {
            if shared.kill.load(Ordering::Acquire) {
                return;
            }

            thread_is_idle = false;

            // Prio 1: Process any render jobs local to this thread
            // (round-robin over the bins beyond the thread count)
            let bin_idx = thread_bin_idx;
            thread_bin_idx = if thread_bin_idx + shared.num_threads < shared.num_bins {
                thread_bin_idx + shared.num_threads
            } else {
                thread_idx
            };
            if let Some(ptr) = shared.queue.claim_render_job(bin_idx) {
                render_bin(&shared, ptr, bin_idx);
                shared.queue.advance_render_job(bin_idx);
                continue;
            }

            // Prio 2: Process any outstanding binning jobs
            if shared.queue.can_bin() {
                if let Some(ptr) = shared.queue.claim_binning_job() {
                    bin_job(&shared, ptr);
                }
                continue;
            }

            // Prio 3: No local work, steal from the least advanced bin
            if shared.num_bins > shared.num_threads {
                if let Some(bin_idx) = shared.queue.best_global_bin() {
                    if let Some(ptr) = shared.queue.claim_render_job(bin_idx) {
                        render_bin(&shared, ptr, bin_idx);
                        shared.queue.advance_render_job(bin_idx);
                    }
                    continue;
                }
            }

            // No work available: yield this thread
            thread::yield_now();
            thread_is_idle = true;
        }

        if shared.kill.load(Ordering::Acquire) {
            return;
        }
    }
}

fn render_bin(shared: &PoolShared, ptr: u32, bin_idx: u32) {
    let job = shared.queue.job(ptr);
    // Exclusive: bin lock held, binning publication observed
    let list = unsafe { job.tri_list(bin_idx as usize) };
    if list.tri_count() > 0 {
        shared
            .buffer
            .render_trilist(list, &shared.rects[bin_idx as usize]);
    }
}

fn bin_job(shared: &PoolShared, ptr: u32) {
    let job = shared.queue.job(ptr);
    // Exclusive: this worker won the binning compare-exchange
    let binning = unsafe { job.binning() };
    // Collect the per-bin lists; each cell is distinct storage
    let mut lists: Vec<&mut TriList> = (0..shared.num_bins)
        .map(|bin| unsafe { job.tri_list_mut(bin as usize) })
        .collect();
    for list in lists.iter_mut() {
        list.clear();
    }

    shared.buffer.bin_triangles(
        &binning.positions,
        &binning.indices,
        binning.matrix.as_ref(),
        binning.winding,
        binning.clip_mask,
        shared.bins_w,
        shared.num_bins / shared.bins_w,
        &mut lists,
    );
    shared.queue.finish_binning_job(ptr);
}

// ===== PUBLIC API =====

/// Producer/consumer job system for software occlusion rasterization.
pub struct CullingThreadpool {
    shared: Arc<PoolShared>,
    threads: Vec<JoinHandle<()>>,
    /// Producer-side model-to-clip state, copied into each job
    current_matrix: Option<Mat4>,
}

impl CullingThreadpool {
    /// Create the pool and spawn its workers (parked until
    /// `wake_threads`).
    ///
    /// # Arguments
    ///
    /// * `num_threads` - Worker thread count
    /// * `bins_w`, `bins_h` - Screen bin grid; `bins_w * bins_h` must
    ///   be >= `num_threads`
    /// * `max_jobs` - Job ring capacity
    /// * `width`, `height` - Occlusion buffer resolution in pixels
    pub fn new(
        num_threads: u32,
        bins_w: u32,
        bins_h: u32,
        max_jobs: u32,
        width: u32,
        height: u32,
    ) -> Self {
        let num_bins = bins_w * bins_h;
        assert!(num_bins >= num_threads, "fewer bins than worker threads");

        let buffer = MaskedDepthBuffer::new(width, height);
        let rects = buffer.bin_rects(bins_w, bins_h);

        let shared = Arc::new(PoolShared {
            queue: RenderJobQueue::new(num_bins, max_jobs),
            buffer,
            rects,
            num_threads,
            num_bins,
            bins_w,
            kill: AtomicBool::new(false),
            suspend: AtomicBool::new(true),
            suspended_count: Mutex::new(0),
            suspended_cv: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(num_threads as usize);
        for thread_idx in 0..num_threads {
            let shared = Arc::clone(&shared);
            threads.push(thread::spawn(move || thread_main(shared, thread_idx)));
        }

        engine_debug!(
            "nova3d::CullingThreadpool",
            "Spawned {} workers over {} bins",
            num_threads,
            num_bins
        );

        Self {
            shared,
            threads,
            current_matrix: None,
        }
    }

    /// Occlusion buffer resolution in pixels
    pub fn resolution(&self) -> (u32, u32) {
        self.shared.buffer.resolution()
    }

    /// Transition all workers into the busy-spin active state.
    ///
    /// Blocks until every worker has reported suspended first, so a
    /// wake cannot race an in-flight suspension.
    pub fn wake_threads(&self) {
        // Wait for all threads to be in suspended mode
        loop {
            let count = *self.shared.suspended_count.lock().unwrap();
            if count == self.shared.num_threads {
                break;
            }
            thread::yield_now();
        }

        // Send wake up event
        {
            let _guard = self.shared.suspended_count.lock().unwrap();
            self.shared.suspend.store(false, Ordering::Release);
        }
        self.shared.suspended_cv.notify_all();
    }

    /// Signal workers to park once their outstanding work is done.
    pub fn suspend_threads(&self) {
        self.shared.suspend.store(true, Ordering::Release);
    }

    /// Block until the pipeline is empty, then reset the queue
    /// counters. The only way to guarantee all previously submitted
    /// triangles have been rasterized.
    pub fn flush(&self) {
        while !self.shared.queue.is_pipeline_empty() {
            thread::yield_now();
        }
        self.shared.queue.reset();
    }

    /// Flush, then reset every pixel to uncovered. Once per frame.
    pub fn clear_buffer(&self) {
        self.flush();
        self.shared.buffer.clear();
    }

    /// Flush, then set the rasterizer's near clip distance.
    pub fn set_near_clip(&self, near: f32) {
        self.flush();
        self.shared.buffer.set_near_clip(near);
    }

    /// Set the model-to-clip matrix applied to subsequent submissions.
    /// Copied by value into each published job.
    pub fn set_matrix(&mut self, matrix: Option<Mat4>) {
        self.current_matrix = matrix;
    }

    /// Submit occluder triangles for asynchronous rasterization.
    ///
    /// Splits the input into chunks of `TRIS_PER_JOB` triangles and
    /// publishes one binning job per chunk, busy-spinning while the
    /// ring is full. The caller's buffers are copied; they may be
    /// mutated immediately after return. Returns with no guarantee the
    /// triangles are rasterized yet.
    pub fn render_triangles(
        &mut self,
        positions: &[f32],
        indices: &[u32],
        winding: BackfaceWinding,
        clip_mask: ClipPlanes,
    ) {
        let positions = Arc::new(positions.to_vec());
        let tri_count = indices.len() / 3;

        for chunk_start in (0..tri_count).step_by(TRIS_PER_JOB) {
            // Yield if work queue is full
            while !self.shared.queue.can_write() {
                thread::yield_now();
            }

            let chunk_end = (chunk_start + TRIS_PER_JOB).min(tri_count);
            let job = self.shared.queue.job(self.shared.queue.write_ptr());
            // Exclusive: single producer, can_write observed
            let binning = unsafe { job.binning_mut() };
            binning.positions = Arc::clone(&positions);
            binning.indices.clear();
            binning
                .indices
                .extend_from_slice(&indices[chunk_start * 3..chunk_end * 3]);
            binning.matrix = self.current_matrix;
            binning.winding = winding;
            binning.clip_mask = clip_mask;
            self.shared.queue.advance_write_job();
        }
    }

    /// Test an NDC rectangle at view depth `wmin` against the buffer.
    ///
    /// Synchronous, on the calling thread; does NOT wait for
    /// outstanding jobs.
    pub fn test_rect(
        &self,
        xmin: f32,
        ymin: f32,
        xmax: f32,
        ymax: f32,
        wmin: f32,
    ) -> CullingResult {
        self.shared.buffer.test_rect(xmin, ymin, xmax, ymax, wmin)
    }

    /// Test triangles (under the current matrix) against the buffer.
    ///
    /// Synchronous, on the calling thread; does NOT wait for
    /// outstanding jobs.
    pub fn test_triangles(&self, positions: &[f32], indices: &[u32]) -> CullingResult {
        self.shared
            .buffer
            .test_triangles(positions, indices, self.current_matrix.as_ref())
    }
}

impl Drop for CullingThreadpool {
    fn drop(&mut self) {
        self.shared.kill.store(true, Ordering::Release);
        {
            let _guard = self.shared.suspended_count.lock().unwrap();
            self.shared.suspend.store(false, Ordering::Release);
        }
        self.shared.suspended_cv.notify_all();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "threadpool_tests.rs"]
mod tests;
