use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Handle;

use crate::cell::LatestValueCell;
use crate::config::ForwarderConfig;
use crate::error::DeliveryFailure;
use crate::types::{DeliveryOutcome, DeliveryStats, OutboundPayload, StatsSnapshot};
use crate::utils::{age_ms, format_timestamp};

const LOG_BODY_LIMIT: usize = 200;

/// Best-effort delivery of the latest reading to the collector.
///
/// One attempt per invocation: any failure is logged, counted and dropped.
/// Invocations share nothing but the cell and the counters, so they may
/// overlap freely.
pub struct Forwarder {
    cell: Arc<LatestValueCell>,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    include_timestamp: bool,
    stats: DeliveryStats,
}

impl Forwarder {
    pub fn new(cell: Arc<LatestValueCell>, config: &ForwarderConfig) -> Result<Self, reqwest::Error> {
        let timeout = config.http_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sense-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            cell,
            client,
            endpoint: config.endpoint_url.trim().to_string(),
            timeout,
            include_timestamp: config.include_timestamp,
            stats: DeliveryStats::default(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Copy the cell into a payload. An empty cell counts as a skip.
    fn snapshot(&self) -> Option<OutboundPayload> {
        match self.cell.read_snapshot() {
            Some(reading) => {
                debug!(
                    "Snapshot taken: captured at {} ({} ms old)",
                    format_timestamp(reading.timestamp),
                    age_ms(reading.timestamp)
                );
                Some(OutboundPayload::from_reading(&reading, self.include_timestamp))
            }
            None => {
                debug!("No accelerometer data to send yet");
                self.stats.record(&DeliveryOutcome::Skipped);
                None
            }
        }
    }

    /// Snapshot and deliver, waiting for the result.
    pub async fn forward_once(&self) -> DeliveryOutcome {
        match self.snapshot() {
            Some(payload) => self.send(payload).await,
            None => DeliveryOutcome::Skipped,
        }
    }

    /// Ticker entry point: snapshot now, deliver on a detached task.
    pub fn on_tick(self: &Arc<Self>, runtime: &Handle) {
        if let Some(payload) = self.snapshot() {
            let forwarder = Arc::clone(self);
            runtime.spawn(async move {
                forwarder.send(payload).await;
            });
        }
    }

    async fn send(&self, payload: OutboundPayload) -> DeliveryOutcome {
        debug!(
            "Sending reading x={:.3} y={:.3} z={:.3} to {}",
            payload.x, payload.y, payload.z, self.endpoint
        );

        let outcome = match self.post(&payload).await {
            Ok(status) => DeliveryOutcome::Delivered { status },
            Err(failure) => {
                warn!("Delivery to {} failed, dropping reading: {}", self.endpoint, failure);
                DeliveryOutcome::Failed(failure)
            }
        };
        self.stats.record(&outcome);
        outcome
    }

    async fn post(&self, payload: &OutboundPayload) -> Result<u16, DeliveryFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        let body = truncate_for_log(body.trim());

        if status.is_success() {
            info!("Data sent successfully ({}). Response: {}", status.as_u16(), body);
            Ok(status.as_u16())
        } else {
            Err(DeliveryFailure::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn classify(&self, error: reqwest::Error) -> DeliveryFailure {
        if error.is_timeout() {
            DeliveryFailure::Timeout(self.timeout)
        } else {
            DeliveryFailure::Network(error.to_string())
        }
    }
}

fn truncate_for_log(body: &str) -> String {
    if body.chars().count() <= LOG_BODY_LIMIT {
        return body.to_string();
    }
    let head: String = body.chars().take(LOG_BODY_LIMIT).collect();
    format!("{}…", head)
}
