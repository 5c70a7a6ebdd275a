#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use sense_relay::config::ForwarderConfig;
use sense_relay::indicator::RunningIndicator;

#[derive(Debug, Clone)]
pub struct Received {
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct MockState {
    received: Arc<Mutex<Vec<Received>>>,
    status: StatusCode,
    delay: Duration,
}

/// In-process collector recording every POST it receives.
pub struct MockCollector {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
    task: JoinHandle<()>,
}

async fn record(State(state): State<MockState>, headers: HeaderMap, body: String) -> (StatusCode, &'static str) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.received.lock().unwrap().push(Received { content_type, body });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, r#"{"status":"success"}"#)
}

impl MockCollector {
    pub async fn start(status: StatusCode) -> Self {
        Self::start_with_delay(status, Duration::ZERO).await
    }

    pub async fn start_with_delay(status: StatusCode, delay: Duration) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            received: Arc::clone(&received),
            status,
            delay,
        };
        let app = Router::new().route("/ingest", post(record)).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/ingest", addr),
            received,
            task,
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.received().into_iter().map(|r| r.body).collect()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL of a local port nobody listens on.
pub fn unused_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/ingest", port)
}

pub fn forwarder_config(url: &str, interval_secs: u64) -> ForwarderConfig {
    ForwarderConfig {
        endpoint_url: url.to_string(),
        send_interval_seconds: interval_secs,
        http_timeout_seconds: 2,
        include_timestamp: false,
    }
}

/// Indicator that records show/hide calls.
#[derive(Clone, Default)]
pub struct RecordingIndicator {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingIndicator {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl RunningIndicator for RecordingIndicator {
    fn show(&self) -> std::io::Result<()> {
        self.calls.lock().unwrap().push("show");
        Ok(())
    }

    fn hide(&self) {
        self.calls.lock().unwrap().push("hide");
    }
}

pub fn body_of(x: f64, y: f64, z: f64) -> String {
    serde_json::json!({ "x": x, "y": y, "z": z }).to_string()
}
