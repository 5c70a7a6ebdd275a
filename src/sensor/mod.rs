//! Accelerometer adapters.
//!
//! A backend turns some platform stream into [`Reading`] callbacks;
//! [`SensorSource`] wraps one backend with idempotent start/stop.

pub mod iio;
mod poller;
pub mod push;
pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::{SensorBackendKind, SensorConfig};
use crate::error::SensorError;
use crate::types::Reading;

pub use iio::IioAccelerometer;
pub use push::{PushAccelerometer, PushHandle};
pub use simulated::SimulatedAccelerometer;

/// Sampling cadence class, mirroring the usual mobile sensor speeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingRate {
    Fastest,
    Game,
    #[default]
    #[serde(alias = "interactive")]
    Ui,
    Normal,
}

impl SamplingRate {
    pub fn period(self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::from_millis(5),
            SamplingRate::Game => Duration::from_millis(20),
            SamplingRate::Ui => Duration::from_millis(60),
            SamplingRate::Normal => Duration::from_millis(200),
        }
    }
}

impl fmt::Display for SamplingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SamplingRate::Fastest => "fastest",
            SamplingRate::Game => "game",
            SamplingRate::Ui => "ui",
            SamplingRate::Normal => "normal",
        };
        f.write_str(name)
    }
}

impl FromStr for SamplingRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(SamplingRate::Fastest),
            "game" => Ok(SamplingRate::Game),
            "ui" | "interactive" => Ok(SamplingRate::Ui),
            "normal" => Ok(SamplingRate::Normal),
            other => Err(format!("unknown sampling rate '{}'", other)),
        }
    }
}

pub type ReadingCallback = Arc<dyn Fn(Reading) + Send + Sync>;
pub type FaultCallback = Arc<dyn Fn(SensorError) + Send + Sync>;

/// Callbacks a backend drives once opened.
///
/// `on_fault` reports an unrecoverable failure; the backend emits nothing
/// further afterwards.
#[derive(Clone)]
pub struct SensorEvents {
    pub on_reading: ReadingCallback,
    pub on_fault: FaultCallback,
}

impl SensorEvents {
    pub fn new<R, F>(on_reading: R, on_fault: F) -> Self
    where
        R: Fn(Reading) + Send + Sync + 'static,
        F: Fn(SensorError) + Send + Sync + 'static,
    {
        Self {
            on_reading: Arc::new(on_reading),
            on_fault: Arc::new(on_fault),
        }
    }
}

/// A platform accelerometer stream.
pub trait Accelerometer: Send {
    fn name(&self) -> &str;

    /// Whether the hardware exists at all.
    fn is_supported(&self) -> bool;

    /// Begin delivering readings. Called at most once between closes.
    fn open(&mut self, rate: SamplingRate, events: SensorEvents) -> Result<(), SensorError>;

    /// Stop delivering readings and release the events. Must not block on a
    /// callback that is itself waiting for the caller.
    fn close(&mut self);
}

/// Backend named by the `[sensor]` configuration section.
pub fn backend_from_config(config: &SensorConfig) -> Box<dyn Accelerometer> {
    match config.backend {
        SensorBackendKind::Simulated => Box::new(SimulatedAccelerometer::new()),
        SensorBackendKind::Iio => match &config.iio_device {
            Some(device) => Box::new(IioAccelerometer::new(device, config.max_consecutive_read_errors)),
            None => Box::new(IioAccelerometer::discover(config.max_consecutive_read_errors)),
        },
    }
}

/// Idempotent start/stop wrapper around a backend.
pub struct SensorSource {
    backend: Box<dyn Accelerometer>,
    rate: SamplingRate,
    started: bool,
}

impl SensorSource {
    pub fn new(backend: Box<dyn Accelerometer>, rate: SamplingRate) -> Self {
        Self {
            backend,
            rate,
            started: false,
        }
    }

    pub fn start(&mut self, events: SensorEvents) -> Result<(), SensorError> {
        if self.started {
            return Ok(());
        }

        if !self.backend.is_supported() {
            warn!("Accelerometer '{}' not supported on this device", self.backend.name());
            return Err(SensorError::UnsupportedDevice);
        }

        self.backend.open(self.rate, events)?;
        self.started = true;
        info!("Accelerometer '{}' started at {} rate", self.backend.name(), self.rate);
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.backend.close();
        self.started = false;
        info!("Accelerometer '{}' stopped", self.backend.name());
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn rate(&self) -> SamplingRate {
        self.rate
    }
}

impl Drop for SensorSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_events(counter: Arc<AtomicUsize>) -> SensorEvents {
        SensorEvents::new(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        )
    }

    #[test]
    fn unsupported_backend_fails_start() {
        let (backend, _handle) = PushAccelerometer::unsupported();
        let mut source = SensorSource::new(Box::new(backend), SamplingRate::Ui);

        let result = source.start(counting_events(Arc::new(AtomicUsize::new(0))));
        assert_eq!(result, Err(SensorError::UnsupportedDevice));
        assert!(!source.is_started());
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let (backend, handle) = PushAccelerometer::new();
        let mut source = SensorSource::new(Box::new(backend), SamplingRate::Ui);
        let counter = Arc::new(AtomicUsize::new(0));

        source.start(counting_events(Arc::clone(&counter))).unwrap();
        source.start(counting_events(Arc::clone(&counter))).unwrap();
        assert_eq!(handle.open_count(), 1);

        assert!(handle.push(Reading::new(0.0, 9.8, 0.0, 0)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_without_start_is_safe() {
        let (backend, handle) = PushAccelerometer::new();
        let mut source = SensorSource::new(Box::new(backend), SamplingRate::Normal);

        source.stop();
        source.stop();
        assert!(!handle.is_subscribed());
    }

    #[test]
    fn stop_unsubscribes() {
        let (backend, handle) = PushAccelerometer::new();
        let mut source = SensorSource::new(Box::new(backend), SamplingRate::Ui);
        let counter = Arc::new(AtomicUsize::new(0));

        source.start(counting_events(Arc::clone(&counter))).unwrap();
        source.stop();

        assert!(!handle.is_subscribed());
        assert!(!handle.push(Reading::new(1.0, 1.0, 1.0, 0)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rate_names_round_trip() {
        for rate in [SamplingRate::Fastest, SamplingRate::Game, SamplingRate::Ui, SamplingRate::Normal] {
            assert_eq!(rate.to_string().parse::<SamplingRate>(), Ok(rate));
        }
        assert_eq!("Interactive".parse::<SamplingRate>(), Ok(SamplingRate::Ui));
        assert!("turbo".parse::<SamplingRate>().is_err());
    }

    #[test]
    fn default_rate_is_ui() {
        assert_eq!(SamplingRate::default(), SamplingRate::Ui);
    }

    #[test]
    fn ui_rate_is_slower_than_game() {
        assert!(SamplingRate::Ui.period() > SamplingRate::Game.period());
    }
}
