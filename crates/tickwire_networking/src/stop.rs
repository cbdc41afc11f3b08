//! Cross-thread stop signal for the server and client loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable flag a loop polls between ticks or frames.
///
/// Stopping is idempotent. A loop started while the flag is already set
/// returns immediately.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Creates an unset handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to exit at its next safe point.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once [`StopHandle::stop`] has been called.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clears the flag so the loop can run again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
