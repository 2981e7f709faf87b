//! Request-signature authentication.
//!
//! Callers send `x-api-key`, `x-timestamp` (unix seconds), and
//! `x-signature` = base64(HMAC-SHA512(secret, "METHOD:path:sha256(body):ts")).
//! Timestamps older or newer than the skew bound are rejected.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    axum::{
        body::{Body, to_bytes},
        extract::{Request, State},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    hmac::{Hmac, Mac},
    sha2::{Digest, Sha256, Sha512},
    tracing::warn,
};

use wamux_sessions::SessionError;

use crate::{respond::ApiError, state::ApiState};

/// Bodies larger than this are rejected before hashing.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Maximum tolerated clock skew between caller and server.
pub const MAX_TIMESTAMP_SKEW: Duration = Duration::from_secs(180);

#[derive(Clone)]
pub struct AuthConfig {
    pub api_key: String,
    pub signing_secret: String,
}

/// Compute the request signature for the given parts.
pub fn sign(secret: &str, method: &str, path: &str, timestamp: i64, body: &[u8]) -> String {
    let body_hash = hex::encode(Sha256::digest(body));
    let data = format!("{method}:{path}:{body_hash}:{timestamp}");

    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn verify(secret: &str, method: &str, path: &str, timestamp: i64, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = BASE64.decode(signature) else {
        return false;
    };
    let body_hash = hex::encode(Sha256::digest(body));
    let data = format!("{method}:{path}:{body_hash}:{timestamp}");

    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(data.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&provided).is_ok()
}

pub(crate) fn timestamp_fresh(timestamp: i64, now: i64, max_skew: Duration) -> bool {
    (now - timestamp).unsigned_abs() <= max_skew.as_secs()
}

/// Middleware enforcing the api-key + signature scheme on every request.
pub async fn require_signature(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}

async fn check(state: &ApiState, request: Request) -> Result<Request, ApiError> {
    let headers = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().trim_end_matches(',').to_string())
        };
        (header("x-api-key"), header("x-timestamp"), header("x-signature"))
    };
    let (Some(api_key), Some(timestamp), Some(signature)) = headers else {
        warn!("missing authentication headers");
        return Err(SessionError::Unauthorized.into());
    };

    if api_key != state.auth.api_key {
        warn!("invalid api key");
        return Err(SessionError::Unauthorized.into());
    }

    let Ok(timestamp) = timestamp.parse::<i64>() else {
        warn!("unparseable timestamp");
        return Err(SessionError::Unauthorized.into());
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    if !timestamp_fresh(timestamp, now, MAX_TIMESTAMP_SKEW) {
        warn!(timestamp, now, "timestamp outside skew bound");
        return Err(SessionError::Unauthorized.into());
    }

    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| SessionError::BadRequest("body too large".into()))?;

    if !verify(
        &state.auth.signing_secret,
        &method,
        &path,
        timestamp,
        &bytes,
        &signature,
    ) {
        warn!(%path, "invalid request signature");
        return Err(SessionError::Unauthorized.into());
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}
