/// Deferred task handle.
///
/// A thin wrapper over an OS thread with explicit `join`/`is_ready`.
/// Chunk inputs are captured by value inside the closure, so the
/// spawner's source arrays may be mutated or cleared while the task
/// runs. Joining is idempotent; dropping an unjoined task joins it.

use std::thread::{self, JoinHandle};

/// Handle to one unit of deferred parallel work.
pub struct Task {
    handle: Option<JoinHandle<()>>,
}

impl Task {
    /// Spawn the work immediately on its own thread.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            handle: Some(thread::spawn(work)),
        }
    }

    /// Whether the work has finished (or was already joined).
    pub fn is_ready(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Block until the work is done. Idempotent.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
