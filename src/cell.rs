use std::sync::{Mutex, MutexGuard};

use crate::types::Reading;

/// Single-slot exchange between the sensor producer and the forwarder.
///
/// Holds either nothing or the most recently written [`Reading`]. Writes
/// replace the slot wholesale; snapshots copy it out without clearing, so a
/// tick with no fresh sample resends the previous one.
#[derive(Debug, Default)]
pub struct LatestValueCell {
    slot: Mutex<Option<Reading>>,
}

impl LatestValueCell {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a single assignment or copy, so a poisoned
    // slot still holds a whole reading.
    fn lock(&self) -> MutexGuard<'_, Option<Reading>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write(&self, reading: Reading) {
        *self.lock() = Some(reading);
    }

    pub fn read_snapshot(&self) -> Option<Reading> {
        *self.lock()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}
