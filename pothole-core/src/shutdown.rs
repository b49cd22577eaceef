//! Cooperative stop flag shared by every loop.

use portable_atomic::{AtomicBool, Ordering};

/// Set once at startup, cleared once on shutdown. Loops check it between
/// iterations and exit at their next boundary.
pub struct RunFlag {
    running: AtomicBool,
}

impl RunFlag {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request every loop to stop. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}
