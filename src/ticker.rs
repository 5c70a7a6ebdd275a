use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::TickerError;

pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

struct Active {
    // true while fires are allowed; a fire runs the callback under this lock
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// Fixed-period timer whose first fire happens immediately.
///
/// The callback runs on the runtime and must not block; work that can take
/// long (network) should be spawned from it. Fires do not wait for earlier
/// spawned work.
pub struct Ticker {
    runtime: Handle,
    active: Option<Active>,
}

impl Ticker {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime, active: None }
    }

    pub fn start(&mut self, period: Duration, callback: TickCallback) -> Result<(), TickerError> {
        if self.active.is_some() {
            return Err(TickerError::AlreadyRunning);
        }
        if period.is_zero() {
            return Err(TickerError::InvalidPeriod);
        }

        let gate = Arc::new(Mutex::new(true));
        let task_gate = Arc::clone(&gate);

        let task = self.runtime.spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut fired = 0u64;

            loop {
                ticks.tick().await;

                let fired_now = {
                    let open = task_gate.lock().unwrap_or_else(|p| p.into_inner());
                    if *open {
                        callback();
                    }
                    *open
                };
                if !fired_now {
                    break;
                }
                fired += 1;
            }

            debug!("Ticker exiting after {} fires", fired);
        });

        self.active = Some(Active { gate, task });
        Ok(())
    }

    /// Halt future fires. A fire already running completes before this returns.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            *active.gate.lock().unwrap_or_else(|p| p.into_inner()) = false;
            active.task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
