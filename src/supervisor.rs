use std::future::Future;
use std::time::Duration;

use log::{error, info, warn};
use tokio::time::sleep;

use crate::config::{ConfigError, SupervisorConfig};
use crate::error::ServiceError;
use crate::service::ServiceLifecycle;

/// When and how often a self-stopped service is started again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub base_cooldown: Duration,
    pub max_cooldown: Duration,
}

impl TryFrom<&SupervisorConfig> for RestartPolicy {
    type Error = ConfigError;

    fn try_from(config: &SupervisorConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            max_restarts: config.max_restarts,
            base_cooldown: config.base_cooldown()?,
            max_cooldown: config.max_cooldown()?,
        })
    }
}

/// Exponential cooldown: ×1.5 per failed attempt, capped. Reset to the base
/// after a successful restart; the restart budget is not.
#[derive(Debug)]
struct Backoff {
    policy: RestartPolicy,
    restarts: u32,
    cooldown: Duration,
}

impl Backoff {
    fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restarts: 0,
            cooldown: policy.base_cooldown,
        }
    }

    /// Cooldown before the next attempt, or None once the budget is spent.
    fn next_cooldown(&mut self) -> Option<Duration> {
        if self.restarts >= self.policy.max_restarts {
            return None;
        }
        self.restarts += 1;
        let wait = self.cooldown;
        self.cooldown = self.cooldown.mul_f64(1.5).min(self.policy.max_cooldown);
        Some(wait)
    }

    fn record_success(&mut self) {
        self.cooldown = self.policy.base_cooldown;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown signal fired; the service was stopped.
    Shutdown,
    /// The service kept failing and the restart budget ran out.
    GaveUp { restarts: u32 },
}

/// Run `service` until `shutdown` resolves, restarting it when it stops on
/// its own. The initial start error and permanent errors (no sensor) are
/// returned rather than retried.
pub async fn supervise<F>(
    service: &ServiceLifecycle,
    policy: RestartPolicy,
    shutdown: F,
) -> Result<ExitReason, ServiceError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut backoff = Backoff::new(policy);

    service.start()?;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping service");
                service.stop();
                return Ok(ExitReason::Shutdown);
            }
            _ = service.wait_until_stopped() => {
                warn!("Service stopped unexpectedly");
            }
        }

        loop {
            let Some(cooldown) = backoff.next_cooldown() else {
                error!("Giving up after {} restart attempts", backoff.restarts);
                return Ok(ExitReason::GaveUp {
                    restarts: backoff.restarts,
                });
            };

            warn!(
                "Restarting service in {:.1}s (attempt {}/{})",
                cooldown.as_secs_f64(),
                backoff.restarts,
                policy.max_restarts
            );

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested during restart cooldown");
                    return Ok(ExitReason::Shutdown);
                }
                _ = sleep(cooldown) => {}
            }

            match service.start() {
                Ok(()) => {
                    info!("Service restarted after {} attempt(s)", backoff.restarts);
                    backoff.record_success();
                    break;
                }
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) => warn!("Restart attempt failed: {}", e),
            }
        }
    }
}
