//! Multi-tenant session lifecycle management.
//!
//! Sits between the HTTP surface and the protocol connector: a registry of
//! lazily created per-tenant sessions, each owning one connection state
//! machine, a TTL cache for derived data, and the credential directory the
//! connector pairs against.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod handle;
pub mod machine;
pub mod recipient;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    cache::TtlCache,
    classify::{DisconnectAction, classify},
    config::SessionTuning,
    error::{SendFailure, SessionError},
    handle::{SessionHandle, SessionStatus},
    machine::{ConnectionState, PairingOutcome},
    registry::{ReapReport, SessionRegistry},
};
