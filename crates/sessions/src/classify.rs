//! Disconnect-reason classification.
//!
//! Pure table lookup over the WhatsApp Web status codes. The three sets are
//! fixed at compile time and never overlap; anything outside them is
//! `Unknown` and must be logged by the caller rather than silently retried.

use wamux_connector::DisconnectCode;

/// What to do about a reported disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectAction {
    /// Transient loss; credentials stay valid, reconnect with them.
    Reconnect,
    /// Local session state is corrupt; discard credentials and pair afresh.
    Restart,
    /// Unrecoverable (explicit logout); the session is permanently lost.
    Terminate,
    /// Not in any known set.
    Unknown,
}

/// Transient network-level failures.
const RECONNECT_REASONS: [DisconnectCode; 4] = [
    DisconnectCode::TIMED_OUT,
    DisconnectCode::CONNECTION_CLOSED,
    DisconnectCode::CONNECTION_REPLACED,
    DisconnectCode::RESTART_REQUIRED,
];

/// Failures that invalidate persisted credentials.
const RESTART_REASONS: [DisconnectCode; 4] = [
    DisconnectCode::BAD_SESSION,
    DisconnectCode::MULTIDEVICE_MISMATCH,
    DisconnectCode::FORBIDDEN,
    DisconnectCode::UNAVAILABLE_SERVICE,
];

/// Reasons the operator has decided are unrecoverable.
const TERMINATE_REASONS: [DisconnectCode; 1] = [DisconnectCode::LOGGED_OUT];

pub fn classify(code: DisconnectCode) -> DisconnectAction {
    if RECONNECT_REASONS.contains(&code) {
        DisconnectAction::Reconnect
    } else if RESTART_REASONS.contains(&code) {
        DisconnectAction::Restart
    } else if TERMINATE_REASONS.contains(&code) {
        DisconnectAction::Terminate
    } else {
        DisconnectAction::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_set() {
        for code in RECONNECT_REASONS {
            assert_eq!(classify(code), DisconnectAction::Reconnect, "{code}");
        }
        // connection_lost shares 408 with timed_out.
        assert_eq!(
            classify(DisconnectCode::CONNECTION_LOST),
            DisconnectAction::Reconnect
        );
    }

    #[test]
    fn restart_set() {
        for code in RESTART_REASONS {
            assert_eq!(classify(code), DisconnectAction::Restart, "{code}");
        }
    }

    #[test]
    fn terminate_set() {
        assert_eq!(
            classify(DisconnectCode::LOGGED_OUT),
            DisconnectAction::Terminate
        );
    }

    #[test]
    fn anything_else_is_unknown() {
        for raw in [0u16, 200, 410, 499, 999] {
            assert_eq!(classify(DisconnectCode(raw)), DisconnectAction::Unknown);
        }
    }

    #[test]
    fn sets_do_not_overlap() {
        for code in RECONNECT_REASONS {
            assert!(!RESTART_REASONS.contains(&code));
            assert!(!TERMINATE_REASONS.contains(&code));
        }
        for code in RESTART_REASONS {
            assert!(!TERMINATE_REASONS.contains(&code));
        }
    }
}
