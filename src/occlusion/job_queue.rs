/// Mostly lockless queue for occluder render jobs.
///
/// A bounded ring of pre-allocated job slots shared by one producer
/// and all worker threads. Each slot holds one binning job plus one
/// pre-sized triangle list per screen bin, so the steady state never
/// allocates. Slot index = counter % capacity.
///
/// Synchronization protocol (all the unsafe accessors lean on it):
/// - `write_ptr` is advanced only by the single producer, with Release,
///   after the slot's binning payload is written. A slot is writable
///   only while `write_ptr - min(render_ptrs) < max_jobs`, i.e. every
///   bin has finished rendering the slot's previous occupant.
/// - `binning_ptr` is claimed by workers via compare-exchange; at most
///   one worker bins a given slot. The binner is the only writer of the
///   slot's triangle lists until it publishes `binning_completed`.
/// - `render_ptrs[bin]` advances only while the bin's lock flag is held
///   (single compare-exchange "mutex"); the renderer only reads the
///   slot's list for its own bin, and lists of different bins are
///   disjoint.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use glam::Mat4;
use super::depth_buffer::{BackfaceWinding, ClipPlanes, TriList};

/// Triangles per binning job — submission chunk size.
pub const TRIS_PER_JOB: usize = 1024;

// ===== BINNING JOB =====

/// Input state of one triangle chunk, copied by value at submission.
pub(crate) struct BinningJob {
    /// Flattened xyz positions, shared by all chunks of one submission
    pub positions: Arc<Vec<f32>>,
    /// This chunk's triangle indices (fixed capacity, reused)
    pub indices: Vec<u32>,
    /// Model-to-clip matrix, copied so the caller may mutate its own
    pub matrix: Option<Mat4>,
    /// Winding treated as back-facing
    pub winding: BackfaceWinding,
    /// Planes the submission may straddle
    pub clip_mask: ClipPlanes,
}

impl BinningJob {
    fn empty() -> Self {
        Self {
            positions: Arc::new(Vec::new()),
            indices: Vec::with_capacity(TRIS_PER_JOB * 3),
            matrix: None,
            winding: BackfaceWinding::None,
            clip_mask: ClipPlanes::empty(),
        }
    }
}

// ===== JOB SLOT =====

/// One ring slot: a binning job plus per-bin triangle lists.
pub(crate) struct Job {
    /// Written by the producer, read by the claiming binner
    binning: UnsafeCell<BinningJob>,
    /// Written by the claiming binner, read by per-bin renderers
    tri_lists: Vec<UnsafeCell<TriList>>,
    /// Ring counter value of the worker that claimed binning, or -1
    binning_started: AtomicI64,
    /// Ring counter value once binning finished, or -1
    binning_completed: AtomicI64,
}

// Slots are shared across threads; exclusivity of every UnsafeCell
// access is guaranteed by the queue protocol documented above.
unsafe impl Sync for Job {}

impl Job {
    fn new(num_bins: u32) -> Self {
        let mut tri_lists = Vec::with_capacity(num_bins as usize);
        for _ in 0..num_bins {
            tri_lists.push(UnsafeCell::new(TriList::with_capacity(TRIS_PER_JOB)));
        }
        Self {
            binning: UnsafeCell::new(BinningJob::empty()),
            tri_lists,
            binning_started: AtomicI64::new(-1),
            binning_completed: AtomicI64::new(-1),
        }
    }

    /// Producer-side payload access.
    ///
    /// # Safety
    ///
    /// Caller must be the single producer thread and `can_write()` must
    /// have returned true since the slot's last occupant.
    pub(crate) unsafe fn binning_mut(&self) -> &mut BinningJob {
        &mut *self.binning.get()
    }

    /// Binner-side payload access.
    ///
    /// # Safety
    ///
    /// Caller must have claimed this slot via `claim_binning_job`.
    pub(crate) unsafe fn binning(&self) -> &BinningJob {
        &*self.binning.get()
    }

    /// Binner-side triangle list access.
    ///
    /// # Safety
    ///
    /// Caller must have claimed this slot via `claim_binning_job` and
    /// not yet called `finish_binning_job`.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn tri_list_mut(&self, bin: usize) -> &mut TriList {
        &mut *self.tri_lists[bin].get()
    }

    /// Renderer-side triangle list access.
    ///
    /// # Safety
    ///
    /// Caller must hold the bin lock for `bin` and have observed
    /// `binning_completed` equal to the bin's render pointer.
    pub(crate) unsafe fn tri_list(&self, bin: usize) -> &TriList {
        &*self.tri_lists[bin].get()
    }
}

// ===== QUEUE =====

/// The shared ring of job slots plus all scheduling pointers.
pub(crate) struct RenderJobQueue {
    jobs: Vec<Job>,
    /// Next slot the producer will publish
    write_ptr: AtomicU32,
    /// Next slot a worker may claim for binning
    binning_ptr: AtomicU32,
    /// Per-bin: next slot whose list this bin must render
    render_ptrs: Vec<AtomicU32>,
    /// Per-bin single-holder lock flags (0 free, 1 held)
    bin_locks: Vec<AtomicU32>,
    num_bins: u32,
    max_jobs: u32,
}

impl RenderJobQueue {
    pub(crate) fn new(num_bins: u32, max_jobs: u32) -> Self {
        let mut jobs = Vec::with_capacity(max_jobs as usize);
        for _ in 0..max_jobs {
            jobs.push(Job::new(num_bins));
        }
        let mut render_ptrs = Vec::with_capacity(num_bins as usize);
        let mut bin_locks = Vec::with_capacity(num_bins as usize);
        for _ in 0..num_bins {
            render_ptrs.push(AtomicU32::new(0));
            bin_locks.push(AtomicU32::new(0));
        }
        Self {
            jobs,
            write_ptr: AtomicU32::new(0),
            binning_ptr: AtomicU32::new(0),
            render_ptrs,
            bin_locks,
            num_bins,
            max_jobs,
        }
    }

    pub(crate) fn num_bins(&self) -> u32 {
        self.num_bins
    }

    /// The slot at ring counter `ptr`
    pub(crate) fn job(&self, ptr: u32) -> &Job {
        &self.jobs[(ptr % self.max_jobs) as usize]
    }

    /// Least advanced render pointer across all bins
    pub(crate) fn min_render_ptr(&self) -> u32 {
        let mut min = self.render_ptrs[0].load(Ordering::Acquire);
        for ptr in &self.render_ptrs[1..] {
            min = min.min(ptr.load(Ordering::Acquire));
        }
        min
    }

    /// True when every bin has rendered every published job
    pub(crate) fn is_pipeline_empty(&self) -> bool {
        self.min_render_ptr() == self.write_ptr.load(Ordering::Acquire)
    }

    /// True when the producer's next slot is free
    pub(crate) fn can_write(&self) -> bool {
        self.write_ptr
            .load(Ordering::Acquire)
            .wrapping_sub(self.min_render_ptr())
            < self.max_jobs
    }

    /// True when an unclaimed binning job exists in a live slot
    pub(crate) fn can_bin(&self) -> bool {
        let binning = self.binning_ptr.load(Ordering::Acquire);
        binning != self.write_ptr.load(Ordering::Acquire)
            && binning.wrapping_sub(self.min_render_ptr()) < self.max_jobs
    }

    /// Ring counter of the producer's current slot
    pub(crate) fn write_ptr(&self) -> u32 {
        self.write_ptr.load(Ordering::Relaxed)
    }

    /// Publish the slot written at `write_ptr` and move on.
    pub(crate) fn advance_write_job(&self) {
        self.write_ptr.fetch_add(1, Ordering::Release);
    }

    /// Try to claim the next binning job. At most one worker wins a
    /// given slot. Returns the claimed ring counter.
    pub(crate) fn claim_binning_job(&self) -> Option<u32> {
        let binning = self.binning_ptr.load(Ordering::Acquire);
        if binning == self.write_ptr.load(Ordering::Acquire)
            || binning.wrapping_sub(self.min_render_ptr()) >= self.max_jobs
        {
            return None;
        }
        if self
            .binning_ptr
            .compare_exchange(binning, binning.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.job(binning)
                .binning_started
                .store(binning as i64, Ordering::Relaxed);
            return Some(binning);
        }
        None
    }

    /// Publish a finished binning job to the renderers.
    pub(crate) fn finish_binning_job(&self, ptr: u32) {
        let job = self.job(ptr);
        let started = job.binning_started.load(Ordering::Relaxed);
        job.binning_completed.store(started, Ordering::Release);
    }

    /// Try to lock `bin` and return the ring counter of a ready render
    /// job for it. On success the caller must render, then call
    /// `advance_render_job` (which also releases the lock).
    pub(crate) fn claim_render_job(&self, bin: u32) -> Option<u32> {
        if self.bin_locks[bin as usize]
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        let render_ptr = self.render_ptrs[bin as usize].load(Ordering::Relaxed);
        let completed = self.job(render_ptr).binning_completed.load(Ordering::Acquire);
        if completed != render_ptr as i64 {
            self.bin_locks[bin as usize].store(0, Ordering::Release);
            return None;
        }
        Some(render_ptr)
    }

    /// Mark `bin`'s current job rendered and release the bin lock.
    pub(crate) fn advance_render_job(&self, bin: u32) {
        self.render_ptrs[bin as usize].fetch_add(1, Ordering::Release);
        self.bin_locks[bin as usize].store(0, Ordering::Release);
    }

    /// Least advanced unlocked bin with outstanding work, for stealing.
    pub(crate) fn best_global_bin(&self) -> Option<u32> {
        let mut best_bin = None;
        let mut best_ptr = self.write_ptr.load(Ordering::Acquire);
        for bin in 0..self.num_bins {
            let render_ptr = self.render_ptrs[bin as usize].load(Ordering::Acquire);
            if render_ptr < best_ptr && self.bin_locks[bin as usize].load(Ordering::Relaxed) == 0 {
                best_bin = Some(bin);
                best_ptr = render_ptr;
            }
        }
        best_bin
    }

    /// Reset all counters. Caller must have drained the pipeline.
    pub(crate) fn reset(&self) {
        self.write_ptr.store(0, Ordering::Relaxed);
        self.binning_ptr.store(0, Ordering::Relaxed);
        for ptr in &self.render_ptrs {
            ptr.store(0, Ordering::Relaxed);
        }
        for job in &self.jobs {
            job.binning_started.store(-1, Ordering::Relaxed);
            job.binning_completed.store(-1, Ordering::Release);
        }
    }
}

#[cfg(test)]
#[path = "job_queue_tests.rs"]
mod tests;
