use std::time::Duration;

use thiserror::Error;

/// Errors raised by the sensor layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("No accelerometer available on this device")]
    UnsupportedDevice,

    #[error("Failed to open sensor stream: {0}")]
    StartFailure(String),

    /// Unrecoverable failure after the stream was opened.
    #[error("Sensor stream failed: {0}")]
    Fault(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerError {
    #[error("Ticker already running")]
    AlreadyRunning,

    #[error("Ticker period must be non-zero")]
    InvalidPeriod,
}

/// Why a delivery attempt did not reach the collector. Never surfaced to the host.
#[derive(Error, Debug)]
pub enum DeliveryFailure {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Collector returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors surfaced by service start-up.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Ticker(#[from] TickerError),

    #[error("Running indicator error: {0}")]
    Indicator(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Service must be created inside a tokio runtime")]
    NoRuntime,
}

impl ServiceError {
    /// Whether retrying start could ever help.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ServiceError::Sensor(SensorError::UnsupportedDevice) | ServiceError::NoRuntime
        )
    }
}
