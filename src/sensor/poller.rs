use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, warn};

use super::SensorEvents;
use crate::error::SensorError;
use crate::types::Reading;

/// Background thread sampling a blocking read function at a fixed period.
///
/// The stop channel doubles as the sleep: dropping the sender wakes the
/// thread immediately instead of waiting out the period.
pub(crate) struct Poller {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub(crate) fn spawn<F>(
        name: &str,
        period: Duration,
        max_consecutive_errors: u32,
        events: SensorEvents,
        mut read: F,
    ) -> std::io::Result<Self>
    where
        F: FnMut() -> Result<Reading, String> + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread_name = format!("sensor-{}", name);
        let label = name.to_string();

        let handle = thread::Builder::new().name(thread_name).spawn(move || {
            let mut consecutive_errors = 0u32;
            let mut samples = 0u64;

            loop {
                match read() {
                    Ok(reading) => {
                        consecutive_errors = 0;
                        samples += 1;
                        (events.on_reading)(reading);
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        warn!(
                            "[{}] read failed ({}/{}): {}",
                            label, consecutive_errors, max_consecutive_errors, e
                        );
                        if consecutive_errors >= max_consecutive_errors {
                            error!("[{}] giving up after {} consecutive read errors", label, consecutive_errors);
                            (events.on_fault)(SensorError::Fault(e));
                            break;
                        }
                    }
                }

                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    // 发送端被丢弃即为停止信号
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            debug!("[{}] poller exiting after {} samples", label, samples);
        })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit.
    pub(crate) fn shutdown(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("Sensor poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
