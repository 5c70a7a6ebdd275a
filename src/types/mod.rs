pub mod reading;
pub mod results;
pub mod state;

pub use reading::{OutboundPayload, Reading};
pub use results::{DeliveryOutcome, DeliveryStats, StatsSnapshot};
pub use state::ServiceState;
