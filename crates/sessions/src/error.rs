//! Caller-facing error taxonomy.
//!
//! Every variant carries a stable five-digit service code; the HTTP layer
//! maps codes to statuses. Transition logic never raises these for expected
//! disconnect reasons -- recovery is driven inside the state machine.

use thiserror::Error;

/// Why a send was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The connection was not open when the send was attempted.
    NotOpen,
    /// The connector accepted the connection but the send itself failed.
    Internal,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// No persisted credentials exist for the tenant.
    #[error("session not found")]
    SessionNotFound,

    /// A connection could not be established within the wait bound.
    #[error("connector unavailable")]
    ConnectorUnavailable,

    /// The session was terminated by the remote end and must be removed
    /// and recreated.
    #[error("session lost, remove and pair again")]
    SessionLost,

    /// Pairing was requested but no scan is needed.
    #[error("pairing already completed")]
    PairingConflict,

    /// No pairing payload arrived within the deadline.
    #[error("timed out waiting for pairing code")]
    PairingTimeout,

    #[error("send failed: {detail}")]
    SendFailed { kind: SendFailure, detail: String },

    /// Logout or credential deletion failed during cleanup.
    #[error("session cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Stable service code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "40000",
            Self::SendFailed {
                kind: SendFailure::NotOpen,
                ..
            } => "40001",
            Self::SessionLost => "40002",
            Self::Unauthorized => "40300",
            Self::SessionNotFound => "40401",
            Self::ConnectorUnavailable => "40402",
            Self::PairingTimeout => "40801",
            Self::PairingConflict => "40901",
            Self::SendFailed {
                kind: SendFailure::Internal,
                ..
            }
            | Self::Internal(_) => "50000",
            Self::CleanupFailed(_) => "50001",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SessionError::SessionNotFound.code(), "40401");
        assert_eq!(SessionError::ConnectorUnavailable.code(), "40402");
        assert_eq!(SessionError::SessionLost.code(), "40002");
        assert_eq!(SessionError::PairingConflict.code(), "40901");
        assert_eq!(SessionError::PairingTimeout.code(), "40801");
        assert_eq!(
            SessionError::SendFailed {
                kind: SendFailure::NotOpen,
                detail: String::new()
            }
            .code(),
            "40001"
        );
        assert_eq!(
            SessionError::SendFailed {
                kind: SendFailure::Internal,
                detail: String::new()
            }
            .code(),
            "50000"
        );
        assert_eq!(SessionError::CleanupFailed(String::new()).code(), "50001");
    }
}
