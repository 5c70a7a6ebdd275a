//! Minimal logging collector: accepts the forwarder's JSON posts and appends
//! them, stamped with the server time, to a log file.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::any;
use axum::{Json, Router};
use chrono::Local;
use log::{error, info, warn};
use serde_json::{json, Value};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::config::CollectorConfig;

#[derive(Clone)]
struct CollectorState {
    log_file: Arc<PathBuf>,
    // 串行化写入，避免并发请求交错写入同一行
    write_lock: Arc<Mutex<()>>,
}

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, outcome: &str, message: impl Into<String>) -> Reply {
    (status, Json(json!({ "status": outcome, "message": message.into() })))
}

/// Router serving the ingest endpoint at `path`.
pub fn router(path: &str, log_file: impl Into<PathBuf>) -> Router {
    let state = CollectorState {
        log_file: Arc::new(log_file.into()),
        write_lock: Arc::new(Mutex::new(())),
    };
    Router::new().route(path, any(ingest)).with_state(state)
}

async fn ingest(State(state): State<CollectorState>, method: Method, body: Bytes) -> Reply {
    if method != Method::POST {
        return reply(
            StatusCode::METHOD_NOT_ALLOWED,
            "error",
            "Method not allowed. Only POST requests are accepted.",
        );
    }

    let payload = match std::str::from_utf8(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejected payload with invalid UTF-8: {}", e);
            return reply(StatusCode::BAD_REQUEST, "error", format!("Invalid JSON payload: {}", e));
        }
    };
    if payload.trim().is_empty() {
        return reply(StatusCode::BAD_REQUEST, "error", "No JSON payload received or payload empty.");
    }

    if let Err(e) = serde_json::from_str::<Value>(payload) {
        warn!("Rejected malformed payload: {}", e);
        return reply(StatusCode::BAD_REQUEST, "error", format!("Invalid JSON payload: {}", e));
    }

    let line = format!(
        "[{}] Received JSON: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        payload
    );

    match append_line(&state, &line).await {
        Ok(()) => reply(StatusCode::OK, "success", "Data received and logged."),
        Err(e) => {
            error!("Failed writing to log file {}: {}", state.log_file.display(), e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "error", "Unable to write to the log file.")
        }
    }
}

async fn append_line(state: &CollectorState, line: &str) -> io::Result<()> {
    let _guard = state.write_lock.lock().await;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(state.log_file.as_path())
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(config: &CollectorConfig, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let log_file = PathBuf::from(&config.log_file);
    ensure_parent_dir(&log_file)?;

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Collector listening on http://{}{}, logging to {}",
        listener.local_addr()?,
        config.path,
        log_file.display()
    );

    axum::serve(listener, router(&config.path, log_file))
        .with_graceful_shutdown(shutdown)
        .await
}
