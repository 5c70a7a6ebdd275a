//! Background accelerometer relay.
//!
//! A sensor backend keeps overwriting a single-slot cell with the freshest
//! reading; a ticker periodically hands a snapshot of that cell to the
//! forwarder, which makes one best-effort HTTP POST to the collector.

pub mod cell;
pub mod collector;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod indicator;
pub mod logger;
pub mod sensor;
pub mod service;
pub mod supervisor;
pub mod ticker;
pub mod types;
pub mod utils;

pub use cell::LatestValueCell;
pub use config::AppConfig;
pub use error::{DeliveryFailure, SensorError, ServiceError, TickerError};
pub use forwarder::Forwarder;
pub use service::{ServiceBuilder, ServiceLifecycle};
pub use types::{DeliveryOutcome, OutboundPayload, Reading, ServiceState};
