//! Teller HTTP REST API
//!
//! Axum-based HTTP server exposing the chat operations alongside the Unix
//! socket event server. Each endpoint has a thin axum handler delegating to
//! an inner function that builds the matching `ChatRequest` and dispatches it
//! through the shared router, so both surfaces run identical semantics.
//!
//! Endpoints:
//! - GET  /health                  — subsystem status with agent/session counts
//! - GET  /version                 — server version info
//! - GET  /agents                  — agent summaries, filtered by caller tier
//! - POST /sessions                — start a chat session
//! - POST /sessions/:id/messages   — send a message, receive the agent reply
//! - GET  /sessions/:id/messages   — chronological session history
//! - POST /sessions/:id/transfer   — move the session to another desk
//! - POST /sessions/:id/end        — end the session with optional rating

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use teller_core::ipc::{ChatRequest, ChatResponse};
use teller_core::{ResponseGenerator, TellerConfig};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub config: TellerConfig,
    pub responder: Arc<dyn ResponseGenerator>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/agents", get(agents_handler))
        .route("/sessions", post(start_handler))
        .route(
            "/sessions/:id/messages",
            post(send_handler).get(history_handler),
        )
        .route("/sessions/:id/transfer", post(transfer_handler))
        .route("/sessions/:id/end", post(end_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: PgPool,
    config: TellerConfig,
    responder: Arc<dyn ResponseGenerator>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        pool,
        config,
        responder,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Teller HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    pub user_id: Option<Uuid>,
    pub contact: Option<serde_json::Value>,
    pub specialization: Option<String>,
    pub question: Option<String>,
    #[serde(default)]
    pub queue: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub user_id: Option<Uuid>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub user_id: Option<Uuid>,
    pub specialization: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EndSessionBody {
    pub user_id: Option<Uuid>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AgentsQuery {
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub user_id: Option<Uuid>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let resp = dispatch(state, ChatRequest::Health).await;
    match response_to_http(resp) {
        Ok(mut body) => {
            if let Some(obj) = body.as_object_mut() {
                obj.insert(
                    "version".to_string(),
                    serde_json::json!(env!("CARGO_PKG_VERSION")),
                );
                obj.insert(
                    "socket".to_string(),
                    serde_json::json!(state.config.service.socket_path),
                );
            }
            (StatusCode::OK, body)
        }
        Err((_, body)) => (StatusCode::SERVICE_UNAVAILABLE, body),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "teller/1",
    })
}

pub async fn start_inner(
    state: &HttpState,
    body: StartSessionBody,
) -> (StatusCode, serde_json::Value) {
    let req = ChatRequest::StartSession {
        user_id: body.user_id,
        contact: body.contact,
        specialization: body.specialization,
        question: body.question.unwrap_or_default(),
        queue: body.queue,
    };
    finish(dispatch(state, req).await)
}

pub async fn send_inner(
    state: &HttpState,
    session_id: Uuid,
    body: SendMessageBody,
) -> (StatusCode, serde_json::Value) {
    let req = ChatRequest::SendMessage {
        session_id,
        user_id: body.user_id,
        text: body.text.unwrap_or_default(),
    };
    finish(dispatch(state, req).await)
}

pub async fn history_inner(
    state: &HttpState,
    session_id: Uuid,
    query: HistoryQuery,
) -> (StatusCode, serde_json::Value) {
    let req = ChatRequest::History {
        session_id,
        user_id: query.user_id,
    };
    finish(dispatch(state, req).await)
}

pub async fn transfer_inner(
    state: &HttpState,
    session_id: Uuid,
    body: TransferBody,
) -> (StatusCode, serde_json::Value) {
    let req = ChatRequest::Transfer {
        session_id,
        user_id: body.user_id,
        specialization: body.specialization,
        reason: body.reason.unwrap_or_default(),
    };
    finish(dispatch(state, req).await)
}

pub async fn end_inner(
    state: &HttpState,
    session_id: Uuid,
    body: EndSessionBody,
) -> (StatusCode, serde_json::Value) {
    let req = ChatRequest::EndSession {
        session_id,
        user_id: body.user_id,
        rating: body.rating,
        feedback: body.feedback,
    };
    finish(dispatch(state, req).await)
}

pub async fn agents_inner(
    state: &HttpState,
    query: AgentsQuery,
) -> (StatusCode, serde_json::Value) {
    let req = ChatRequest::ListAgents { tier: query.tier };
    finish(dispatch(state, req).await)
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn start_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<StartSessionBody>,
) -> impl IntoResponse {
    let (status, body) = start_inner(&state, body).await;
    (status, Json(body))
}

pub async fn send_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SendMessageBody>,
) -> impl IntoResponse {
    let (status, body) = send_inner(&state, session_id, body).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let (status, body) = history_inner(&state, session_id, query).await;
    (status, Json(body))
}

pub async fn transfer_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<TransferBody>,
) -> impl IntoResponse {
    let (status, body) = transfer_inner(&state, session_id, body).await;
    (status, Json(body))
}

pub async fn end_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<EndSessionBody>,
) -> impl IntoResponse {
    let (status, body) = end_inner(&state, session_id, body).await;
    (status, Json(body))
}

pub async fn agents_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AgentsQuery>,
) -> impl IntoResponse {
    let (status, body) = agents_inner(&state, query).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

async fn dispatch(state: &HttpState, request: ChatRequest) -> ChatResponse {
    crate::router::handle_request(request, &state.pool, &state.config, state.responder.as_ref())
        .await
}

fn finish(response: ChatResponse) -> (StatusCode, serde_json::Value) {
    match response_to_http(response) {
        Ok(mut body) => {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("status".to_string(), serde_json::json!("ok"));
            }
            (StatusCode::OK, body)
        }
        Err((status, body)) => (status, body),
    }
}

/// HTTP status for a domain error kind carried on a router response.
pub fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "no_agent_available" => StatusCode::SERVICE_UNAVAILABLE,
        "invalid_session" => StatusCode::NOT_FOUND,
        "inactive_session" => StatusCode::CONFLICT,
        "malformed_request" => StatusCode::BAD_REQUEST,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Convert a router `ChatResponse` into an HTTP body, or a (status, error
/// body) pair carrying the uniform error shape.
pub fn response_to_http(
    response: ChatResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, serde_json::Value)> {
    if response.status == "ok" {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        let kind = response.error_kind.unwrap_or_else(|| "unavailable".to_string());
        let status = status_for_kind(&kind);
        let body = serde_json::json!({
            "status": "error",
            "error": kind,
            "message": response.error.unwrap_or_else(|| "unknown error".to_string()),
            "retryable": response.retryable.unwrap_or(false),
        });
        Err((status, body))
    }
}

// ============================================================================
// Unit tests — pure helpers; DB-backed paths live in tests/http_integration.rs
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use teller_core::models::Specialization;
    use teller_core::ChatError;

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "teller/1", "protocol must be teller/1");
    }

    #[test]
    fn test_status_for_kind_mapping() {
        assert_eq!(
            status_for_kind("no_agent_available"),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for_kind("invalid_session"), StatusCode::NOT_FOUND);
        assert_eq!(status_for_kind("inactive_session"), StatusCode::CONFLICT);
        assert_eq!(
            status_for_kind("malformed_request"),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for_kind("unavailable"), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_response_to_http_ok() {
        let resp = ChatResponse::ok(serde_json::json!({"count": 0}));
        let data = response_to_http(resp).unwrap();
        assert_eq!(data["count"], 0);
    }

    #[test]
    fn test_response_to_http_domain_error() {
        let resp = ChatResponse::domain_err(&ChatError::NoAgentAvailable {
            specialization: Specialization::Treasury,
        });
        let (status, body) = response_to_http(resp).unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "no_agent_available");
        assert_eq!(body["retryable"], true);
    }

    #[test]
    fn test_response_to_http_inactive_is_conflict() {
        let resp = ChatResponse::domain_err(&ChatError::InactiveSession);
        let (status, body) = response_to_http(resp).unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["retryable"], false);
    }

    #[test]
    fn test_response_to_http_error_without_kind_is_unavailable() {
        let mut resp = ChatResponse::err("x");
        resp.error_kind = None;
        resp.error = None;
        let (status, body) = response_to_http(resp).unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "unknown error");
    }
}
