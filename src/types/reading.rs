use serde::{Deserialize, Serialize};

/// One accelerometer sample.
///
/// `timestamp` is the capture time in Unix milliseconds. It is carried for
/// diagnostics and only reaches the wire when the forwarder is configured to
/// include it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: i64,
}

impl Reading {
    pub fn new(x: f64, y: f64, z: f64, timestamp: i64) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Sample stamped with the current wall clock.
    pub fn now(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, crate::utils::current_timestamp_ms())
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// JSON body of one delivery attempt: `{"x":..,"y":..,"z":..}`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OutboundPayload {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl OutboundPayload {
    pub fn from_reading(reading: &Reading, include_timestamp: bool) -> Self {
        Self {
            x: reading.x,
            y: reading.y,
            z: reading.z,
            timestamp: include_timestamp.then_some(reading.timestamp),
        }
    }
}
