//! Connector collaborator surface for wamux.
//!
//! The actual WhatsApp Web protocol lives in an external sidecar process
//! (Baileys); this crate defines the capability traits the session layer
//! programs against, the event/wire types, the credential store, and the
//! WebSocket-backed production connector.

pub mod credentials;
pub mod sidecar;
pub mod types;

use std::sync::Arc;

use {async_trait::async_trait, thiserror::Error, tokio::sync::mpsc};

use crate::{
    credentials::Credentials,
    types::{ConnectionEvent, GroupInfo, OutboundMedia, SendAck},
};

pub use crate::{
    credentials::{CredentialError, CredentialStore, FsCredentialStore},
    sidecar::SidecarConnector,
    types::{ConnectionPhase, DisconnectCode},
};

/// Errors surfaced by a connector implementation.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The transport to the connector could not be established.
    #[error("connector unavailable: {0}")]
    Unavailable(String),

    /// The operation requires a live connection and there is none.
    #[error("connection not open")]
    NotConnected,

    /// The remote end rejected the request.
    #[error("rejected by connector: {0}")]
    Rejected(String),

    /// No reply arrived within the request deadline.
    #[error("connector request timed out")]
    Timeout,
}

/// Opens protocol-level connections for one tenant at a time.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection using persisted credentials.
    ///
    /// Returns the live handle together with the receiver for its
    /// connection-status events. The receiver closing means the handle is
    /// dead and no further events will arrive.
    async fn open(
        &self,
        tenant: &str,
        credentials: &Credentials,
    ) -> Result<(Arc<dyn ConnectorHandle>, mpsc::Receiver<ConnectionEvent>), ConnectorError>;
}

/// One live protocol connection.
#[async_trait]
pub trait ConnectorHandle: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendAck, ConnectorError>;

    async fn send_media(&self, to: &str, media: &OutboundMedia) -> Result<SendAck, ConnectorError>;

    /// Fetch all groups the account participates in.
    async fn fetch_groups(&self) -> Result<Vec<GroupInfo>, ConnectorError>;

    /// Log the account out, invalidating its pairing.
    async fn logout(&self) -> Result<(), ConnectorError>;
}
