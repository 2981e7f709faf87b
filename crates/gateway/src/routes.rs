//! Route table and request handlers.

use std::{sync::Arc, time::Duration};

use {
    axum::{
        Json, Router,
        error_handling::HandleErrorLayer,
        extract::{Path, State},
        http::header,
        middleware,
        response::{IntoResponse, Response},
        routing::{delete, get, post},
    },
    serde::Deserialize,
    tower::{BoxError, ServiceBuilder},
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use wamux_connector::types::{MediaKind, OutboundMedia};
use wamux_sessions::{PairingOutcome, SessionError, SessionStatus};

use crate::{
    auth, health, qr,
    respond::{self, ApiError},
    state::ApiState,
};

/// Request budget per window across the whole API surface.
const RATE_LIMIT_MAX: u64 = 6000;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// Requests queued while the buffered limiter is busy.
const RATE_LIMIT_QUEUE: usize = 1024;

pub fn router(state: Arc<ApiState>) -> Router {
    router_with_rate_limit(state, RATE_LIMIT_MAX, RATE_LIMIT_WINDOW)
}

fn router_with_rate_limit(state: Arc<ApiState>, max: u64, window: Duration) -> Router {
    let api = Router::new()
        .route("/", get(list_sessions))
        .route("/qr-code", post(pairing_png))
        .route("/raw-qr-code", post(pairing_raw))
        .route("/cleanup", post(reap_inactive))
        .route("/{session}", delete(remove_session))
        .route("/{session}/status", get(session_status))
        .route("/{session}/send-message", post(send_message))
        .route("/{session}/send-media", post(send_media))
        .route("/{session}/groups", get(list_groups))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_signature,
        ))
        // Outermost on the API surface, so over-budget requests are shed
        // before authentication work happens.
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(shed_over_budget))
                .buffer(RATE_LIMIT_QUEUE)
                .load_shed()
                .rate_limit(max, window),
        );

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shed_over_budget(error: BoxError) -> Response {
    warn!(error = %error, "request shed by rate limiter");
    respond::too_many_requests()
}

#[derive(Deserialize)]
struct PairingRequest {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    to: String,
    message: String,
}

#[derive(Deserialize)]
struct SendMediaRequest {
    to: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    caption: Option<String>,
    #[serde(default)]
    ptt: bool,
    filename: Option<String>,
}

async fn list_sessions(State(state): State<Arc<ApiState>>) -> Response {
    respond::ok_with("Success", Some(state.registry.list()))
}

async fn session_status(
    State(state): State<Arc<ApiState>>,
    Path(session): Path<String>,
) -> Result<Response, ApiError> {
    let handle = state.registry.get(&session);
    match handle.status().await? {
        SessionStatus::Active => Ok(respond::ok("Active")),
        SessionStatus::Inactive { reason } => Ok(respond::ok_with("Inactive", Some(reason))),
    }
}

async fn pairing_png(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PairingRequest>,
) -> Result<Response, ApiError> {
    let payload = acquire_pairing(&state, &request).await?;
    match payload {
        Some(code) => {
            let png = qr::render_png(&code)?;
            Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
        },
        None => Ok(respond::ok("Try again")),
    }
}

async fn pairing_raw(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PairingRequest>,
) -> Result<Response, ApiError> {
    let payload = acquire_pairing(&state, &request).await?;
    match payload {
        Some(code) => Ok(respond::ok_with("Success", Some(code))),
        None => Ok(respond::ok("Try again")),
    }
}

/// Shared pairing flow: `Ok(Some)` carries a payload, `Ok(None)` means the
/// attempt failed before pairing and the caller should retry.
async fn acquire_pairing(
    state: &ApiState,
    request: &PairingRequest,
) -> Result<Option<String>, ApiError> {
    if request.session_id.trim().is_empty() {
        return Err(SessionError::BadRequest("missing required sessionId".into()).into());
    }

    let handle = state.registry.get(&request.session_id);
    match handle.request_pairing().await? {
        PairingOutcome::Payload(code) => Ok(Some(code)),
        PairingOutcome::AlreadyPaired => Err(SessionError::PairingConflict.into()),
        PairingOutcome::Retry => Ok(None),
    }
}

async fn send_message(
    State(state): State<Arc<ApiState>>,
    Path(session): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let handle = state.registry.get(&session);
    let ack = handle.send_text(&request.to, &request.message).await?;
    Ok(respond::ok_with("Message sent successfully", ack.message_id))
}

async fn send_media(
    State(state): State<Arc<ApiState>>,
    Path(session): Path<String>,
    Json(request): Json<SendMediaRequest>,
) -> Result<Response, ApiError> {
    let media = OutboundMedia {
        kind: media_kind(&request.kind),
        url: request.url,
        caption: request.caption,
        voice_note: request.ptt,
        filename: request.filename,
    };

    let handle = state.registry.get(&session);
    let ack = handle.send_media(&request.to, &media).await?;
    Ok(respond::ok_with("Message sent successfully", ack.message_id))
}

async fn list_groups(
    State(state): State<Arc<ApiState>>,
    Path(session): Path<String>,
) -> Result<Response, ApiError> {
    let handle = state.registry.get(&session);
    let groups = handle.list_groups().await?;
    Ok(respond::ok_with("Success", Some(groups)))
}

async fn remove_session(
    State(state): State<Arc<ApiState>>,
    Path(session): Path<String>,
) -> Result<Response, ApiError> {
    let removed = state.registry.remove(&session).await?;
    info!(session, removed, "session removal requested");
    Ok(respond::ok(format!("Service for {session} removed successfully")))
}

async fn reap_inactive(State(state): State<Arc<ApiState>>) -> Response {
    let report = state.registry.reap_inactive().await;
    respond::ok_with("Session cleaned successfully", Some(report))
}

fn media_kind(raw: &str) -> MediaKind {
    // Everything that is not image/video/audio goes out as a document.
    match raw {
        "image" => MediaKind::Image,
        "video" => MediaKind::Video,
        "audio" => MediaKind::Audio,
        _ => MediaKind::Document,
    }
}
