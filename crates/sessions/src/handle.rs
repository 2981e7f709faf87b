//! Per-tenant session: one state machine, its derived-data cache, and the
//! credential locator.

use std::{path::PathBuf, sync::Arc};

use tracing::debug;

use wamux_connector::{
    Connector, ConnectorError, CredentialStore,
    types::{GroupInfo, OutboundMedia, SendAck},
};

use crate::{
    cache::TtlCache,
    config::SessionTuning,
    error::{SendFailure, SessionError},
    machine::{ConnectionMachine, MachineSnapshot, PairingOutcome},
    recipient::format_recipient,
};

const GROUPS_KEY: &str = "groups";

/// Probe result for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Inactive { reason: String },
}

pub struct SessionHandle {
    tenant: String,
    machine: Arc<ConnectionMachine>,
    store: Arc<dyn CredentialStore>,
    groups: TtlCache<&'static str, Vec<GroupInfo>>,
    credential_path: PathBuf,
}

impl SessionHandle {
    pub fn new(
        tenant: impl Into<String>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn CredentialStore>,
        tuning: SessionTuning,
    ) -> Arc<Self> {
        let tenant = tenant.into();
        let groups_ttl = tuning.groups_ttl;
        let machine =
            ConnectionMachine::new(tenant.clone(), connector, Arc::clone(&store), tuning);
        let credential_path = store.locate(&tenant);
        Arc::new(Self {
            tenant,
            machine,
            store,
            groups: TtlCache::new(groups_ttl),
            credential_path,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Where this tenant's credentials are persisted. Owned by the
    /// credential store; never interpreted here.
    pub fn credential_path(&self) -> &PathBuf {
        &self.credential_path
    }

    pub async fn snapshot(&self) -> MachineSnapshot {
        self.machine.snapshot().await
    }

    /// Probe the session: fails with `SessionNotFound` when no credentials
    /// are persisted, otherwise reports `Active`/`Inactive`.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        if !self.store.exists(&self.tenant).await {
            return Err(SessionError::SessionNotFound);
        }

        let snapshot = self.machine.snapshot().await;
        if snapshot.terminated {
            return Ok(SessionStatus::Inactive {
                reason: "terminated, remove the session and pair again".into(),
            });
        }

        let probe_timeout = self.machine.tuning().probe_timeout;
        match self.machine.ensure_ready(probe_timeout).await {
            Ok(()) => Ok(SessionStatus::Active),
            Err(SessionError::SessionLost) => Ok(SessionStatus::Inactive {
                reason: "terminated, remove the session and pair again".into(),
            }),
            Err(_) => Ok(SessionStatus::Inactive {
                reason: match snapshot.last_disconnect {
                    Some(code) => format!("connection not open, last disconnect {code}"),
                    None => "connection not open".into(),
                },
            }),
        }
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendAck, SessionError> {
        self.ready().await?;
        let handle = self.live_handle().await?;
        handle
            .send_text(&format_recipient(to), body)
            .await
            .map_err(map_send_error)
    }

    pub async fn send_media(
        &self,
        to: &str,
        media: &OutboundMedia,
    ) -> Result<SendAck, SessionError> {
        self.ready().await?;
        let handle = self.live_handle().await?;
        handle
            .send_media(&format_recipient(to), media)
            .await
            .map_err(map_send_error)
    }

    /// Group listings, cached per tenant with the configured TTL.
    pub async fn list_groups(&self) -> Result<Vec<GroupInfo>, SessionError> {
        if let Some(groups) = self.groups.get(&GROUPS_KEY) {
            debug!(tenant = %self.tenant, "serving groups from cache");
            return Ok(groups);
        }

        self.ready().await?;
        let handle = self.live_handle().await?;
        let groups = handle.fetch_groups().await.map_err(map_send_error)?;
        self.groups.insert(GROUPS_KEY, groups.clone());
        Ok(groups)
    }

    /// Acquire a pairing payload, waiting up to the configured deadline.
    pub async fn request_pairing(&self) -> Result<PairingOutcome, SessionError> {
        self.machine.request_pairing().await
    }

    /// Shut the session down for removal.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.groups.invalidate(&GROUPS_KEY);
        self.machine.close().await
    }

    async fn ready(&self) -> Result<(), SessionError> {
        let connect_timeout = self.machine.tuning().connect_timeout;
        self.machine.ensure_ready(connect_timeout).await
    }

    async fn live_handle(
        &self,
    ) -> Result<Arc<dyn wamux_connector::ConnectorHandle>, SessionError> {
        self.machine
            .connector_handle()
            .await
            .ok_or(SessionError::SendFailed {
                kind: SendFailure::NotOpen,
                detail: "connection not open".into(),
            })
    }
}

fn map_send_error(error: ConnectorError) -> SessionError {
    match error {
        ConnectorError::NotConnected => SessionError::SendFailed {
            kind: SendFailure::NotOpen,
            detail: error.to_string(),
        },
        other => SessionError::SendFailed {
            kind: SendFailure::Internal,
            detail: other.to_string(),
        },
    }
}
