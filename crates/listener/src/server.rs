//! HTTP surface: `POST /webhook` and `GET /healthz`.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline::TriggerSink;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::{parse_delivery, verify_signature, Delivery};

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

/// Shared state for the webhook handlers.
pub struct WebhookState {
    secret: Vec<u8>,
    sink: Arc<dyn TriggerSink>,
}

impl WebhookState {
    pub fn new(secret: impl Into<Vec<u8>>, sink: Arc<dyn TriggerSink>) -> Self {
        Self {
            secret: secret.into(),
            sink,
        }
    }
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/healthz", get(handle_health))
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<WebhookState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "webhook listener started");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let delivery_id = header(DELIVERY_HEADER).unwrap_or("-").to_string();

    if let Err(err) = verify_signature(&body, header(SIGNATURE_HEADER), &state.secret) {
        warn!(delivery = %delivery_id, error = %err, "rejected webhook delivery");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "code": "invalid_signature", "message": err.to_string() } })),
        );
    }

    match parse_delivery(header(EVENT_HEADER), &body) {
        Ok(Delivery::Trigger(trigger)) => {
            info!(
                delivery = %delivery_id,
                trigger = trigger.kind(),
                issue = %trigger.context().issue_key(),
                "accepted webhook delivery"
            );
            state.sink.submit(trigger);
            (StatusCode::OK, Json(json!({ "status": "accepted" })))
        }
        Ok(Delivery::Ping) => {
            info!(delivery = %delivery_id, "received ping");
            (StatusCode::OK, Json(json!({ "status": "pong" })))
        }
        Ok(Delivery::Ignored { event, action }) => {
            debug!(delivery = %delivery_id, %event, ?action, "ignoring webhook delivery");
            (StatusCode::OK, Json(json!({ "status": "ignored" })))
        }
        Err(err) => {
            warn!(delivery = %delivery_id, error = %err, "malformed webhook delivery");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "code": "parse_failed", "message": err.to_string() } })),
            )
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
