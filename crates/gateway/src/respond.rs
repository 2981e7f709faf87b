//! Response envelope and error mapping.
//!
//! Every body is `{status_code, message, data}` where `status_code` is the
//! stable five-digit service code; the HTTP status is its first three
//! digits.

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Serialize,
    tracing::error,
};

use wamux_sessions::SessionError;

pub const CODE_OK: &str = "20000";
pub const CODE_RATE_LIMITED: &str = "42900";

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status_code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 200 envelope with no payload.
pub fn ok(message: impl Into<String>) -> Response {
    ok_with(message, None::<()>)
}

/// 200 envelope carrying `data`.
pub fn ok_with<T: Serialize>(message: impl Into<String>, data: Option<T>) -> Response {
    Json(Envelope {
        status_code: CODE_OK,
        message: message.into(),
        data,
    })
    .into_response()
}

/// 429 envelope for requests shed by the rate limiter.
pub fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(Envelope::<()> {
            status_code: CODE_RATE_LIMITED,
            message: "Too many requests, please try again later.".into(),
            data: None,
        }),
    )
        .into_response()
}

/// Caller-facing error wrapper; converts the session taxonomy into an
/// enveloped response with a stable code.
#[derive(Debug)]
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        if matches!(self.0, SessionError::Internal(_)) {
            // Never leak internals to the caller.
            error!(error = %self.0, "internal error");
        }
        let status = http_status(code);
        let body = Json(Envelope::<()> {
            status_code: code,
            message: self.0.to_string(),
            data: None,
        });
        (status, body).into_response()
    }
}

fn http_status(code: &str) -> StatusCode {
    code.get(..3)
        .and_then(|prefix| prefix.parse::<u16>().ok())
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
