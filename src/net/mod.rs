//! A thin demo HTTP front-end over the core pipeline. This is explicitly
//! *not* the wire protocol the design calls out as an external concern —
//! it exists only so the pipeline can be exercised end-to-end from outside
//! the process (by the CLI's `serve` subcommand, or by hand with `curl`)
//! without specifying a real production wire format.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin::status_report;
use crate::config::Config;
use crate::events::{Reply, ReplyChannel, RowSet};
use crate::pipeline::Pipeline;
use crate::types::Timestamp;

struct OneshotClient {
    sender: std::sync::Mutex<Option<oneshot::Sender<Reply>>>,
}

impl ReplyChannel for OneshotClient {
    fn send_reply(&self, reply: Reply) {
        if let Some(tx) = self.sender.lock().unwrap().take() {
            // A dropped receiver (client disconnected before the reply was
            // durable) makes this a no-op, matching the design's "silently
            // drop reply" policy for closed client channels.
            let _ = tx.send(reply);
        }
    }
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    config: Arc<Config>,
}

/// Builds the router for the demo HTTP front-end.
pub fn router(pipeline: Arc<Pipeline>, config: Arc<Config>) -> Router {
    let state = AppState { pipeline, config };
    Router::new()
        .route("/timestamp", post(timestamp_handler))
        .route("/commit", post(commit_handler))
        .route("/status", get(status_handler))
        .route("/health", get(|| async { StatusCode::OK }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct TimestampResponse {
    ts: u64,
}

async fn timestamp_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let client: crate::events::Client = Arc::new(OneshotClient {
        sender: std::sync::Mutex::new(Some(tx)),
    });
    state.pipeline.timestamp_request(client);

    match tokio::time::timeout(Duration::from_secs(10), rx).await {
        Ok(Ok(Reply::Timestamp { ts })) => {
            Json(TimestampResponse { ts: ts.value() }).into_response()
        }
        Ok(Ok(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "unexpected reply kind").into_response(),
        Ok(Err(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "reply channel closed").into_response(),
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, "timed out waiting for reply").into_response(),
    }
}

#[derive(Deserialize)]
struct CommitRequestBody {
    start_ts: u64,
    rows: Vec<u64>,
    #[serde(default)]
    is_retry: bool,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum CommitResponseBody {
    Commit { start_ts: u64, commit_ts: u64 },
    Abort { start_ts: u64, is_retry: bool },
}

async fn commit_handler(
    State(state): State<AppState>,
    Json(body): Json<CommitRequestBody>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let client: crate::events::Client = Arc::new(OneshotClient {
        sender: std::sync::Mutex::new(Some(tx)),
    });
    let rows: RowSet = body.rows.into_iter().map(Into::into).collect();
    state.pipeline.commit_request(
        Timestamp(body.start_ts),
        rows,
        body.is_retry,
        client,
    );

    match tokio::time::timeout(Duration::from_secs(10), rx).await {
        Ok(Ok(Reply::Commit {
            start_ts,
            commit_ts,
        })) => Json(CommitResponseBody::Commit {
            start_ts: start_ts.value(),
            commit_ts: commit_ts.value(),
        })
        .into_response(),
        Ok(Ok(Reply::Abort { start_ts, is_retry })) => Json(CommitResponseBody::Abort {
            start_ts: start_ts.value(),
            is_retry,
        })
        .into_response(),
        Ok(Ok(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "unexpected reply kind").into_response(),
        Ok(Err(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "reply channel closed").into_response(),
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, "timed out waiting for reply").into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    match status_report(&state.config) {
        Ok(report) => Json(report).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
