use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use super::{Accelerometer, SamplingRate, SensorEvents};
use crate::error::SensorError;
use crate::types::Reading;

#[derive(Default)]
struct Shared {
    events: Mutex<Option<SensorEvents>>,
    opens: AtomicUsize,
}

impl Shared {
    fn events(&self) -> MutexGuard<'_, Option<SensorEvents>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Backend fed by the host.
///
/// For embedders whose platform already delivers accelerometer callbacks
/// (an FFI shim, a mobile runtime): the host keeps the [`PushHandle`] and
/// forwards each platform event into it.
pub struct PushAccelerometer {
    shared: Arc<Shared>,
    supported: bool,
    open_error: Option<String>,
}

/// Host side of a [`PushAccelerometer`].
#[derive(Clone)]
pub struct PushHandle {
    shared: Arc<Shared>,
}

impl PushAccelerometer {
    pub fn new() -> (Self, PushHandle) {
        Self::build(true, None)
    }

    /// A backend reporting that no accelerometer exists.
    pub fn unsupported() -> (Self, PushHandle) {
        Self::build(false, None)
    }

    /// A backend whose stream always fails to open with `reason`.
    pub fn failing(reason: impl Into<String>) -> (Self, PushHandle) {
        Self::build(true, Some(reason.into()))
    }

    fn build(supported: bool, open_error: Option<String>) -> (Self, PushHandle) {
        let shared = Arc::new(Shared::default());
        let handle = PushHandle {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                shared,
                supported,
                open_error,
            },
            handle,
        )
    }
}

impl Accelerometer for PushAccelerometer {
    fn name(&self) -> &str {
        "push"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn open(&mut self, _rate: SamplingRate, events: SensorEvents) -> Result<(), SensorError> {
        if let Some(reason) = &self.open_error {
            return Err(SensorError::StartFailure(reason.clone()));
        }
        *self.shared.events() = Some(events);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.events().take();
    }
}

impl PushHandle {
    /// Deliver one reading. Returns false (and drops it) when nobody is subscribed.
    pub fn push(&self, reading: Reading) -> bool {
        // Clone the callback out so it never runs under our lock.
        let callback = self.shared.events().as_ref().map(|events| Arc::clone(&events.on_reading));
        match callback {
            Some(on_reading) => {
                on_reading(reading);
                true
            }
            None => {
                debug!("Push accelerometer not subscribed, dropping reading");
                false
            }
        }
    }

    /// Report an unrecoverable stream failure and detach.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let events = self.shared.events().take();
        match events {
            Some(events) => {
                (events.on_fault)(SensorError::Fault(reason.into()));
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.events().is_some()
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }
}
