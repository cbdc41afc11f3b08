//! Single-value hand-off where a newer value replaces an unread older one.

use parking_lot::Mutex;

/// Holds at most one value. `put` overwrites, `take` empties.
///
/// Used for snapshots: the render side only ever wants the newest one.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
}

impl<T> LatestSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Stores `value`. Returns true if it replaced one nobody took.
    pub fn put(&self, value: T) -> bool {
        self.value.lock().replace(value).is_some()
    }

    /// Takes the stored value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.lock().is_none()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
