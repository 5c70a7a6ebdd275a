mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use tokio::time::{sleep, timeout};

use common::{body_of, forwarder_config, unused_endpoint, MockCollector, RecordingIndicator};
use sense_relay::sensor::{Accelerometer, PushAccelerometer, PushHandle, SamplingRate, SensorEvents};
use sense_relay::{Reading, SensorError, ServiceError, ServiceLifecycle, ServiceState};

fn push_service(url: &str, interval_secs: u64) -> (ServiceLifecycle, PushHandle, RecordingIndicator) {
    let (backend, handle) = PushAccelerometer::new();
    let indicator = RecordingIndicator::default();
    let service = ServiceLifecycle::builder(forwarder_config(url, interval_secs))
        .backend(Box::new(backend))
        .indicator(Box::new(indicator.clone()))
        .build()
        .unwrap();
    (service, handle, indicator)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forwards_updated_values_each_interval() {
    sense_relay::logger::init_test_logger();
    let collector = MockCollector::start(StatusCode::OK).await;
    let (service, handle, _) = push_service(&collector.url, 1);

    service.start().unwrap();
    assert!(service.is_running());

    // the immediate first tick finds nothing to send
    sleep(Duration::from_millis(100)).await;
    assert!(handle.push(Reading::now(0.1, 9.8, 0.0)));

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(collector.bodies(), vec![r#"{"x":0.1,"y":9.8,"z":0.0}"#.to_string()]);

    handle.push(Reading::now(0.2, 9.7, 0.1));
    sleep(Duration::from_millis(1000)).await;

    let bodies = collector.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1], body_of(0.2, 9.7, 0.1));
    assert!(service.stats().skipped >= 1);

    service.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_tick_fires_at_start() {
    let collector = MockCollector::start(StatusCode::OK).await;
    let (service, _handle, _) = push_service(&collector.url, 30);

    service.start().unwrap();
    sleep(Duration::from_millis(100)).await;

    // a 30 s period has already fired once; the cell was empty so it skipped
    assert_eq!(service.stats().skipped, 1);
    assert_eq!(collector.count(), 0);
    service.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_halts_ticks_and_unsubscribes() {
    let collector = MockCollector::start(StatusCode::OK).await;
    let (service, handle, indicator) = push_service(&collector.url, 1);

    service.start().unwrap();
    handle.push(Reading::now(0.3, 9.5, 0.2));
    sleep(Duration::from_millis(1200)).await;
    assert!(collector.count() >= 1);

    service.stop();
    assert_eq!(service.state(), ServiceState::Stopped);
    assert!(!handle.is_subscribed());
    assert_eq!(indicator.calls(), vec!["show", "hide"]);

    let sent_before_stop = collector.count();
    service.cell().write(Reading::now(7.0, 7.0, 7.0));
    assert!(!handle.push(Reading::now(8.0, 8.0, 8.0)));

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(collector.count(), sent_before_stop);
    assert!(!collector.bodies().iter().any(|b| b.contains("7.0") || b.contains("8.0")));
}

/// Push backend whose close takes longer than one send interval and records
/// how many POSTs the collector saw at the start and end of it.
struct SlowClose {
    inner: PushAccelerometer,
    collector: Arc<MockCollector>,
    hold: Duration,
    seen: Arc<Mutex<Option<(usize, usize)>>>,
}

impl Accelerometer for SlowClose {
    fn name(&self) -> &str {
        "slow-close"
    }

    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    fn open(&mut self, rate: SamplingRate, events: SensorEvents) -> Result<(), SensorError> {
        self.inner.open(rate, events)
    }

    fn close(&mut self) {
        let before = self.collector.count();
        std::thread::sleep(self.hold);
        let after = self.collector.count();
        *self.seen.lock().unwrap() = Some((before, after));
        self.inner.close();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ticker_stops_before_sensor_closes() {
    let collector = Arc::new(MockCollector::start(StatusCode::OK).await);
    let (inner, handle) = PushAccelerometer::new();
    let seen = Arc::new(Mutex::new(None));
    let backend = SlowClose {
        inner,
        collector: Arc::clone(&collector),
        hold: Duration::from_millis(1500),
        seen: Arc::clone(&seen),
    };
    let service = ServiceLifecycle::builder(forwarder_config(&collector.url, 1))
        .backend(Box::new(backend))
        .build()
        .unwrap();

    service.start().unwrap();
    handle.push(Reading::now(0.4, 9.6, 0.1));
    sleep(Duration::from_millis(1200)).await;
    assert!(collector.count() >= 1);

    // close spans the next tick; a live ticker would post during it
    service.stop();
    sleep(Duration::from_millis(300)).await;

    let (before, after) = seen.lock().unwrap().expect("backend was never closed");
    assert_eq!(before, after);
    assert_eq!(collector.count(), after);
    assert!(!handle.is_subscribed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_collector_leaves_service_running() {
    let collector = MockCollector::start(StatusCode::INTERNAL_SERVER_ERROR).await;
    let (service, handle, _) = push_service(&collector.url, 1);

    service.start().unwrap();
    handle.push(Reading::now(0.0, 9.8, 0.0));
    sleep(Duration::from_millis(1300)).await;

    assert_eq!(service.state(), ServiceState::Running);
    assert!(service.stats().failed >= 1);
    service.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_collector_leaves_service_running() {
    let (service, handle, _) = push_service(&unused_endpoint(), 1);

    service.start().unwrap();
    handle.push(Reading::now(0.0, 9.8, 0.0));
    sleep(Duration::from_millis(1300)).await;

    assert!(service.is_running());
    assert!(service.stats().failed >= 1);
    service.stop();
}

#[tokio::test]
async fn missing_sensor_fails_start() {
    let (backend, _handle) = PushAccelerometer::unsupported();
    let indicator = RecordingIndicator::default();
    let service = ServiceLifecycle::builder(forwarder_config(&unused_endpoint(), 1))
        .backend(Box::new(backend))
        .indicator(Box::new(indicator.clone()))
        .build()
        .unwrap();

    let result = service.start();
    assert!(matches!(result, Err(ServiceError::Sensor(SensorError::UnsupportedDevice))));
    assert_eq!(service.state(), ServiceState::Stopped);
    assert_eq!(indicator.calls(), vec!["show", "hide"]);
}

#[tokio::test]
async fn stream_open_failure_is_propagated() {
    let (backend, _handle) = PushAccelerometer::failing("permission denied");
    let service = ServiceLifecycle::builder(forwarder_config(&unused_endpoint(), 1))
        .backend(Box::new(backend))
        .build()
        .unwrap();

    match service.start() {
        Err(ServiceError::Sensor(SensorError::StartFailure(reason))) => assert_eq!(reason, "permission denied"),
        other => panic!("unexpected result {:?}", other.err()),
    }
    assert!(!service.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sensor_fault_stops_service() {
    let (service, handle, indicator) = push_service(&unused_endpoint(), 1);

    service.start().unwrap();
    assert!(handle.fail("driver reset"));

    timeout(Duration::from_secs(2), service.wait_until_stopped())
        .await
        .expect("service did not stop after sensor fault");
    assert_eq!(service.state(), ServiceState::Stopped);
    assert_eq!(indicator.calls(), vec!["show", "hide"]);
}

#[tokio::test]
async fn restart_starts_from_empty_cell() {
    let (service, handle, _) = push_service(&unused_endpoint(), 30);

    service.start().unwrap();
    handle.push(Reading::now(1.0, 2.0, 3.0));
    assert!(service.latest_reading().is_some());

    service.stop();
    service.start().unwrap();
    assert_eq!(service.latest_reading(), None);
    assert_eq!(handle.open_count(), 2);
    service.stop();
}

#[tokio::test]
async fn repeated_start_and_stop_are_harmless() {
    let (service, handle, indicator) = push_service(&unused_endpoint(), 30);

    service.stop();
    assert!(indicator.calls().is_empty());

    service.start().unwrap();
    service.start().unwrap();
    assert_eq!(handle.open_count(), 1);

    service.stop();
    service.stop();
    assert_eq!(indicator.calls(), vec!["show", "hide"]);
}

#[tokio::test]
async fn state_changes_are_observable() {
    let (service, _handle, _) = push_service(&unused_endpoint(), 30);
    let states = service.subscribe();

    service.start().unwrap();
    assert_eq!(*states.borrow(), ServiceState::Running);
    service.stop();
    assert_eq!(*states.borrow(), ServiceState::Stopped);
}

#[test]
fn building_outside_a_runtime_fails() {
    let result = ServiceLifecycle::builder(forwarder_config("http://127.0.0.1:1/ingest", 1)).build();
    assert!(matches!(result, Err(ServiceError::NoRuntime)));
}
