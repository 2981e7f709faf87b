//! Per-tenant connection state machine.
//!
//! All lifecycle transitions funnel through here: lazy initialization with
//! single-flight protection, connector event handling with disconnect
//! classification, bounded pairing-code polling, and explicit shutdown.
//! Mutable state lives behind one per-tenant lock; connector events are
//! pumped by a single task per live connection, so they are applied
//! strictly in arrival order.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use {
    tokio::sync::{Mutex, mpsc, watch},
    tracing::{debug, error, info, warn},
};

use wamux_connector::{
    Connector, ConnectorHandle, CredentialStore, DisconnectCode,
    types::{ConnectionEvent, ConnectionPhase},
};

use crate::{
    classify::{DisconnectAction, classify},
    config::SessionTuning,
    error::SessionError,
};

/// Lifecycle state of one tenant's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Open,
    /// Unrecoverable; sticky until the session is removed and recreated.
    Terminated,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Result of a pairing-code request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// Fresh payload for the caller to render and scan.
    Payload(String),
    /// No scan is needed; the account is already paired.
    AlreadyPaired,
    /// The attempt failed before pairing could occur; retry the operation.
    Retry,
}

#[derive(Debug, Clone, Copy)]
pub struct MachineSnapshot {
    pub state: ConnectionState,
    pub last_disconnect: Option<DisconnectCode>,
    pub scan_required: bool,
    pub terminated: bool,
}

struct Inner {
    state: ConnectionState,
    handle: Option<Arc<dyn ConnectorHandle>>,
    /// Bumped on every new connector flight; events tagged with an older
    /// generation belong to a superseded connector and are dropped.
    generation: u64,
    initializing: bool,
    pairing: Option<String>,
    scan_required: bool,
    last_disconnect: Option<DisconnectCode>,
    terminated: bool,
}

enum Followup {
    Reconnect,
    Restart,
}

pub struct ConnectionMachine {
    tenant: String,
    connector: Arc<dyn Connector>,
    store: Arc<dyn CredentialStore>,
    tuning: SessionTuning,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionMachine {
    pub fn new(
        tenant: impl Into<String>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn CredentialStore>,
        tuning: SessionTuning,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Uninitialized);
        Arc::new(Self {
            tenant: tenant.into(),
            connector,
            store,
            tuning,
            inner: Mutex::new(Inner {
                state: ConnectionState::Uninitialized,
                handle: None,
                generation: 0,
                initializing: false,
                pairing: None,
                // A fresh session is expected to pair until an event says
                // otherwise.
                scan_required: true,
                last_disconnect: None,
                terminated: false,
            }),
            state_tx,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub async fn snapshot(&self) -> MachineSnapshot {
        let inner = self.inner.lock().await;
        MachineSnapshot {
            state: inner.state,
            last_disconnect: inner.last_disconnect,
            scan_required: inner.scan_required,
            terminated: inner.terminated,
        }
    }

    /// The live connector handle, if the connection has one.
    pub async fn connector_handle(&self) -> Option<Arc<dyn ConnectorHandle>> {
        self.inner.lock().await.handle.clone()
    }

    /// Wait until the connection is open, starting initialization if needed.
    ///
    /// Concurrent callers share one in-flight attempt. Fails with
    /// `SessionLost` once terminated and `ConnectorUnavailable` when the
    /// bound elapses first.
    pub async fn ensure_ready(self: &Arc<Self>, timeout: Duration) -> Result<(), SessionError> {
        {
            let inner = self.inner.lock().await;
            if inner.terminated {
                return Err(SessionError::SessionLost);
            }
            if inner.state == ConnectionState::Open {
                return Ok(());
            }
        }

        let mut state_rx = self.state_tx.subscribe();
        self.initialize().await?;

        {
            let inner = self.inner.lock().await;
            if inner.terminated {
                return Err(SessionError::SessionLost);
            }
            if inner.state == ConnectionState::Open {
                return Ok(());
            }
            // The open attempt already failed; no point burning the timeout.
            if inner.handle.is_none() && !inner.initializing {
                return Err(SessionError::ConnectorUnavailable);
            }
        }

        let wait = state_rx.wait_for(|s| {
            matches!(s, ConnectionState::Open | ConnectionState::Terminated)
        });
        let result = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(state)) if *state == ConnectionState::Terminated => {
                Err(SessionError::SessionLost)
            },
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(SessionError::ConnectorUnavailable),
        };
        result
    }

    /// Idempotent: a no-op while a connector is live or an attempt is in
    /// flight. Failure to open is logged and leaves the machine retryable.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), SessionError> {
        let generation = {
            let mut inner = self.inner.lock().await;
            if inner.terminated {
                return Err(SessionError::SessionLost);
            }
            if inner.initializing || inner.handle.is_some() {
                return Ok(());
            }
            inner.initializing = true;
            inner.generation += 1;
            inner.generation
        };

        let credentials = match self.store.load(&self.tenant).await {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(tenant = %self.tenant, error = %e, "failed to load credentials");
                let mut inner = self.inner.lock().await;
                inner.initializing = false;
                return Ok(());
            },
        };
        if credentials.fresh {
            debug!(tenant = %self.tenant, "created fresh unpaired credentials");
        }

        match self.connector.open(&self.tenant, &credentials).await {
            Ok((handle, events)) => {
                let mut inner = self.inner.lock().await;
                inner.initializing = false;
                if inner.terminated || inner.generation != generation {
                    // Superseded by close() while the open was in flight.
                    drop(inner);
                    if let Err(e) = handle.logout().await {
                        debug!(tenant = %self.tenant, error = %e, "logout of stale connector failed");
                    }
                    return Ok(());
                }
                inner.handle = Some(handle);
                self.set_state(&mut inner, ConnectionState::Connecting);
                info!(tenant = %self.tenant, generation, "connector opened");
                drop(inner);
                self.spawn_pump(events, generation);
                Ok(())
            },
            Err(e) => {
                warn!(tenant = %self.tenant, error = %e, "failed to open connector");
                let mut inner = self.inner.lock().await;
                inner.initializing = false;
                if !inner.terminated {
                    self.set_state(&mut inner, ConnectionState::Uninitialized);
                }
                Ok(())
            },
        }
    }

    fn spawn_pump(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<ConnectionEvent>,
        generation: u64,
    ) {
        let machine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                machine.handle_event(generation, event).await;
            }
            debug!(tenant = %machine.tenant, generation, "connector event stream ended");
        });
    }

    /// Sole event-driven entry point. Events from superseded connector
    /// generations are dropped.
    pub async fn handle_event(self: &Arc<Self>, generation: u64, event: ConnectionEvent) {
        let followup = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || inner.terminated {
                return;
            }

            if let Some(code) = event.pairing {
                inner.pairing = Some(code);
                inner.scan_required = true;
            } else if event.phase != ConnectionPhase::Closed {
                // No payload outside a close means pairing is not expected,
                // e.g. it already completed.
                inner.pairing = None;
                inner.scan_required = false;
            }

            match event.phase {
                ConnectionPhase::Open => {
                    inner.last_disconnect = None;
                    self.set_state(&mut inner, ConnectionState::Open);
                    info!(tenant = %self.tenant, "connection established");
                    None
                },
                ConnectionPhase::Connecting => {
                    self.set_state(&mut inner, ConnectionState::Connecting);
                    None
                },
                ConnectionPhase::Closed => {
                    inner.last_disconnect = event.disconnect;
                    inner.handle = None;
                    let action = event.disconnect.map_or(DisconnectAction::Unknown, classify);
                    info!(
                        tenant = %self.tenant,
                        reason = ?event.disconnect,
                        ?action,
                        "connection closed"
                    );
                    match action {
                        DisconnectAction::Reconnect => {
                            self.set_state(&mut inner, ConnectionState::Connecting);
                            Some(Followup::Reconnect)
                        },
                        DisconnectAction::Restart => {
                            self.set_state(&mut inner, ConnectionState::Connecting);
                            Some(Followup::Restart)
                        },
                        DisconnectAction::Terminate => {
                            inner.terminated = true;
                            inner.pairing = None;
                            self.set_state(&mut inner, ConnectionState::Terminated);
                            warn!(tenant = %self.tenant, "session terminated by remote");
                            None
                        },
                        DisconnectAction::Unknown => {
                            error!(
                                tenant = %self.tenant,
                                reason = ?event.disconnect,
                                "unhandled disconnect reason, not retrying"
                            );
                            self.set_state(&mut inner, ConnectionState::Connecting);
                            None
                        },
                    }
                },
            }
        };

        match followup {
            Some(Followup::Reconnect) => {
                info!(tenant = %self.tenant, "reconnecting with existing credentials");
                if let Err(e) = self.initialize().await {
                    warn!(tenant = %self.tenant, error = %e, "reconnect failed");
                }
            },
            Some(Followup::Restart) => {
                info!(tenant = %self.tenant, "restarting session with fresh credentials");
                if let Err(e) = self.store.delete(&self.tenant).await {
                    error!(tenant = %self.tenant, error = %e, "failed to delete credentials");
                }
                if let Err(e) = self.initialize().await {
                    warn!(tenant = %self.tenant, error = %e, "restart failed");
                }
            },
            None => {},
        }
    }

    /// Poll for a pairing payload with a bounded interval and deadline.
    pub async fn request_pairing(self: &Arc<Self>) -> Result<PairingOutcome, SessionError> {
        {
            let inner = self.inner.lock().await;
            if inner.terminated {
                return Err(SessionError::SessionLost);
            }
        }
        self.initialize().await?;

        let deadline = Instant::now() + self.tuning.pairing_deadline;
        loop {
            {
                let inner = self.inner.lock().await;
                if inner.terminated {
                    return Err(SessionError::SessionLost);
                }
                if let Some(code) = &inner.pairing {
                    return Ok(PairingOutcome::Payload(code.clone()));
                }
                if !inner.scan_required {
                    return Ok(PairingOutcome::AlreadyPaired);
                }
                if inner.handle.is_none()
                    && !inner.initializing
                    && inner.state != ConnectionState::Open
                {
                    // The attempt died before pairing could begin.
                    return Ok(PairingOutcome::Retry);
                }
            }
            if Instant::now() >= deadline {
                return Err(SessionError::PairingTimeout);
            }
            tokio::time::sleep(self.tuning.pairing_poll).await;
        }
    }

    /// Operator-initiated shutdown: log out, discard the connector, delete
    /// persisted credentials. Distinct from a `Terminate` classification.
    pub async fn close(&self) -> Result<(), SessionError> {
        let handle = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.initializing = false;
            inner.pairing = None;
            inner.scan_required = true;
            inner.last_disconnect = None;
            let handle = inner.handle.take();
            if !inner.terminated {
                self.set_state(&mut inner, ConnectionState::Uninitialized);
            }
            handle
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.logout().await {
                warn!(tenant = %self.tenant, error = %e, "logout failed during cleanup");
            }
        }

        self.store
            .delete(&self.tenant)
            .await
            .map_err(|e| SessionError::CleanupFailed(e.to_string()))?;
        info!(tenant = %self.tenant, "session cleaned up");
        Ok(())
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            debug!(
                tenant = %self.tenant,
                from = %inner.state,
                to = %state,
                "state transition"
            );
            inner.state = state;
            let _ = self.state_tx.send(state);
        }
    }

    pub(crate) fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }
}
