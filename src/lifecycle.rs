/// Render lifecycle controller.
///
/// Pause/resume state for the whole rendering device, shared with the
/// components that must not spend CPU while the application is in the
/// background. Pausing is a two-step handshake: the platform layer
/// requests a pause, and the render thread acknowledges it at the next
/// frame boundary.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Controller exists but rendering has not started.
    Created,
    /// Rendering is active.
    Running,
    /// A pause was requested; the render thread has not yet acknowledged.
    Pausing,
    /// The render thread acknowledged the pause. No culling work runs.
    Paused,
}

const STATE_CREATED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_PAUSING: u8 = 2;
const STATE_PAUSED: u8 = 3;

/// Shared pause/resume controller.
///
/// Wrap in an `Arc` and hand a clone to every component that needs to
/// ask "is rendering currently paused?". All transitions are atomic;
/// invalid transitions are ignored rather than panicking, since the
/// platform layer may deliver redundant pause/resume events.
pub struct RenderLifecycle {
    state: AtomicU8,
}

impl RenderLifecycle {
    /// Create a controller in the `Created` state.
    pub fn new() -> Self {
        Self { state: AtomicU8::new(STATE_CREATED) }
    }

    /// Current state snapshot.
    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Acquire) {
            STATE_CREATED => LifecycleState::Created,
            STATE_RUNNING => LifecycleState::Running,
            STATE_PAUSING => LifecycleState::Pausing,
            _ => LifecycleState::Paused,
        }
    }

    /// Enter `Running` from `Created` or `Paused`.
    pub fn start(&self) {
        self.state.store(STATE_RUNNING, Ordering::Release);
    }

    /// Request a pause. Only effective while `Running`.
    pub fn request_pause(&self) {
        let _ = self.state.compare_exchange(
            STATE_RUNNING,
            STATE_PAUSING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Acknowledge a requested pause at a frame boundary.
    /// Only effective while `Pausing`.
    pub fn acknowledge_pause(&self) {
        let _ = self.state.compare_exchange(
            STATE_PAUSING,
            STATE_PAUSED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Resume rendering from `Pausing` or `Paused`.
    pub fn resume(&self) {
        let state = self.state.load(Ordering::Acquire);
        if state == STATE_PAUSING || state == STATE_PAUSED {
            self.state.store(STATE_RUNNING, Ordering::Release);
        }
    }

    /// Whether culling work should be skipped this frame.
    ///
    /// True while a pause is requested or acknowledged.
    pub fn is_paused(&self) -> bool {
        let state = self.state.load(Ordering::Acquire);
        state == STATE_PAUSING || state == STATE_PAUSED
    }
}

impl Default for RenderLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
