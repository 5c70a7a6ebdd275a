use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::DeliveryFailure;

/// Result of a single forwarder invocation
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Nothing sampled yet, no request was made.
    Skipped,
    Delivered { status: u16 },
    Failed(DeliveryFailure),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DeliveryOutcome::Skipped)
    }
}

/// Running counters of forwarder activity, for diagnostics only.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempts: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl DeliveryStats {
    pub fn record(&self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Delivered { .. } => {
                self.attempts.fetch_add(1, Ordering::Relaxed);
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Failed(_) => {
                self.attempts.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_do_not_count_as_attempts() {
        let stats = DeliveryStats::default();
        stats.record(&DeliveryOutcome::Skipped);
        stats.record(&DeliveryOutcome::Delivered { status: 200 });
        stats.record(&DeliveryOutcome::Failed(DeliveryFailure::Network("refused".into())));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.skipped, 1);
    }
}
