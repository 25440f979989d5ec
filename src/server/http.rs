//! HTTP routes over [`ChatService`].

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::debug;

use crate::service::{ChatService, Health};
use crate::types::ChatRequest;

/// Body of `POST /api/chat`. `url` is part of the gateway contract and is
/// always null for sales replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub url: Option<String>,
}

/// Router exposing `POST /api/chat` and `GET /health`.
pub fn router(service: Arc<ChatService>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .with_state(service)
}

async fn chat(
    State(service): State<Arc<ChatService>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let reply = service.handle(request).await;
    if let Some(kind) = reply.error {
        debug!(kind, "degraded reply");
    }
    Json(ChatResponse {
        reply: reply.reply,
        url: None,
    })
}

async fn health(State(service): State<Arc<ChatService>>) -> Json<Health> {
    Json(service.health())
}

/// Router exposing `GET /metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(handle)
}

async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
