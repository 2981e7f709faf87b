//! Tuning knobs for session lifecycle behavior.

use std::time::Duration;

/// Per-registry tuning, applied to every session it creates.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    /// Upper bound on waiting for a connection to become open.
    pub connect_timeout: Duration,
    /// Shorter bound used by status probes and the reaper.
    pub probe_timeout: Duration,
    /// Interval between pairing-payload polls.
    pub pairing_poll: Duration,
    /// Overall deadline for a pairing request.
    pub pairing_deadline: Duration,
    /// Freshness bound for cached group listings.
    pub groups_ttl: Duration,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
            pairing_poll: Duration::from_millis(1500),
            pairing_deadline: Duration::from_secs(30),
            groups_ttl: Duration::from_secs(300),
        }
    }
}
