use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cell::LatestValueCell;
use crate::config::{AppConfig, ForwarderConfig};
use crate::error::{SensorError, ServiceError};
use crate::forwarder::Forwarder;
use crate::indicator::{LogIndicator, RunningIndicator, StatusFileIndicator};
use crate::sensor::{self, Accelerometer, SamplingRate, SensorEvents, SensorSource, SimulatedAccelerometer};
use crate::ticker::{TickCallback, Ticker};
use crate::types::{Reading, ServiceState, StatsSnapshot};

/// Sensor → cell → ticker → forwarder, started and stopped as one unit.
///
/// Cheap to clone; clones share one service. Dropping the last clone stops
/// whatever is still running.
#[derive(Clone)]
pub struct ServiceLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Handle,
    cell: Arc<LatestValueCell>,
    forwarder: Arc<Forwarder>,
    indicator: Box<dyn RunningIndicator>,
    send_interval: Duration,
    state: watch::Sender<ServiceState>,
    parts: Mutex<Parts>,
}

/// Everything start/stop mutates; the mutex serialises transitions.
struct Parts {
    sensor: SensorSource,
    ticker: Ticker,
    fault_watch: Option<JoinHandle<()>>,
    generation: u64,
}

pub struct ServiceBuilder {
    forwarder: ForwarderConfig,
    rate: SamplingRate,
    backend: Option<Box<dyn Accelerometer>>,
    indicator: Option<Box<dyn RunningIndicator>>,
    runtime: Option<Handle>,
}

impl ServiceBuilder {
    pub fn sampling_rate(mut self, rate: SamplingRate) -> Self {
        self.rate = rate;
        self
    }

    pub fn backend(mut self, backend: Box<dyn Accelerometer>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn indicator(mut self, indicator: Box<dyn RunningIndicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<ServiceLifecycle, ServiceError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| ServiceError::NoRuntime)?,
        };
        let backend = self
            .backend
            .unwrap_or_else(|| Box::new(SimulatedAccelerometer::new()));
        let indicator = self.indicator.unwrap_or_else(|| Box::new(LogIndicator));

        let cell = Arc::new(LatestValueCell::new());
        let forwarder = Arc::new(Forwarder::new(Arc::clone(&cell), &self.forwarder)?);
        let (state, _) = watch::channel(ServiceState::Stopped);

        info!(
            "Service configured: endpoint {}, interval {}s, timeout {}s, {} sampling",
            forwarder.endpoint(),
            self.forwarder.send_interval_seconds,
            self.forwarder.http_timeout_seconds,
            self.rate
        );

        Ok(ServiceLifecycle {
            inner: Arc::new(Inner {
                runtime: runtime.clone(),
                cell,
                forwarder,
                indicator,
                send_interval: self.forwarder.send_interval(),
                state,
                parts: Mutex::new(Parts {
                    sensor: SensorSource::new(backend, self.rate),
                    ticker: Ticker::new(runtime),
                    fault_watch: None,
                    generation: 0,
                }),
            }),
        })
    }
}

impl ServiceLifecycle {
    pub fn builder(forwarder: ForwarderConfig) -> ServiceBuilder {
        ServiceBuilder {
            forwarder,
            rate: SamplingRate::default(),
            backend: None,
            indicator: None,
            runtime: None,
        }
    }

    /// Service wired from a full configuration: backend, rate and indicator included.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let indicator: Box<dyn RunningIndicator> = match config.status_file_path() {
            Some(path) => Box::new(StatusFileIndicator::new(path)),
            None => Box::new(LogIndicator),
        };
        Self::builder(config.forwarder.clone())
            .sampling_rate(config.sensor.sampling_rate)
            .backend(sensor::backend_from_config(&config.sensor))
            .indicator(indicator)
            .build()
    }

    /// Stopped → Running. A no-op unless currently stopped.
    pub fn start(&self) -> Result<(), ServiceError> {
        let mut parts = self.inner.lock_parts();

        let current = self.state();
        if current != ServiceState::Stopped {
            debug!("Start ignored, service is {}", current);
            return Ok(());
        }

        self.inner.set_state(ServiceState::Starting);
        self.inner.cell.clear();

        if let Err(e) = self.inner.indicator.show() {
            error!("Failed to show running indicator: {}", e);
            self.inner.set_state(ServiceState::Stopped);
            return Err(e.into());
        }

        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let cell = Arc::clone(&self.inner.cell);
        let events = SensorEvents::new(
            move |reading| cell.write(reading),
            move |fault| {
                let _ = fault_tx.send(fault);
            },
        );

        if let Err(e) = parts.sensor.start(events) {
            error!("Error starting accelerometer: {}", e);
            self.inner.indicator.hide();
            self.inner.set_state(ServiceState::Stopped);
            return Err(e.into());
        }

        let forwarder = Arc::clone(&self.inner.forwarder);
        let runtime = self.inner.runtime.clone();
        let on_tick: TickCallback = Arc::new(move || forwarder.on_tick(&runtime));

        if let Err(e) = parts.ticker.start(self.inner.send_interval, on_tick) {
            error!("Error starting ticker: {}", e);
            parts.sensor.stop();
            self.inner.indicator.hide();
            self.inner.set_state(ServiceState::Stopped);
            return Err(e.into());
        }

        parts.generation += 1;
        parts.fault_watch = Some(self.spawn_fault_watch(fault_rx, parts.generation));

        self.inner.set_state(ServiceState::Running);
        info!("Service started");
        Ok(())
    }

    /// Ticker first, then sensor, then indicator. A no-op when already stopped.
    ///
    /// Deliveries already in flight are left to finish on their own.
    pub fn stop(&self) {
        let mut parts = self.inner.lock_parts();
        self.inner.stop_locked(&mut parts);
    }

    fn spawn_fault_watch(
        &self,
        mut faults: mpsc::UnboundedReceiver<SensorError>,
        generation: u64,
    ) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            let Some(fault) = faults.recv().await else {
                return;
            };
            let Some(inner) = inner.upgrade() else {
                return;
            };

            error!("Accelerometer failed, stopping service: {}", fault);
            let mut parts = inner.lock_parts();
            // 旧一轮的故障不影响重启后的服务
            if parts.generation == generation {
                inner.stop_locked(&mut parts);
            }
        })
    }

    pub fn state(&self) -> ServiceState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.inner.state.subscribe()
    }

    /// Resolve once the service is stopped, whoever stopped it.
    pub async fn wait_until_stopped(&self) {
        let mut states = self.subscribe();
        let _ = states.wait_for(|state| *state == ServiceState::Stopped).await;
    }

    pub fn latest_reading(&self) -> Option<Reading> {
        self.inner.cell.read_snapshot()
    }

    pub fn cell(&self) -> Arc<LatestValueCell> {
        Arc::clone(&self.inner.cell)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.forwarder.stats()
    }
}

impl Inner {
    fn lock_parts(&self) -> MutexGuard<'_, Parts> {
        self.parts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ServiceState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Service state {} -> {}", previous, state);
        }
    }

    fn stop_locked(&self, parts: &mut Parts) {
        let current = *self.state.borrow();
        if !current.can_stop() {
            debug!("Stop ignored, service is {}", current);
            return;
        }

        self.set_state(ServiceState::Stopping);
        parts.ticker.stop();
        parts.sensor.stop();
        if let Some(watch) = parts.fault_watch.take() {
            watch.abort();
        }
        self.indicator.hide();
        self.set_state(ServiceState::Stopped);
        info!("Service stopped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let parts = self.parts.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *self.state.borrow();
        if current.can_stop() {
            parts.ticker.stop();
            parts.sensor.stop();
            self.indicator.hide();
        }
    }
}
