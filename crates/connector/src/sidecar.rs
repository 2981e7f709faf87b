//! WebSocket connector backed by the Baileys sidecar process.
//!
//! Each `open` call establishes its own WebSocket to the sidecar and logs
//! the tenant in, so one socket maps to exactly one protocol connection.
//! Connection-status frames stream back over the event channel; send and
//! group-fetch replies are correlated by request id.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    tokio::sync::{mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, error, info, warn},
    uuid::Uuid,
};

use crate::{
    Connector, ConnectorError, ConnectorHandle,
    credentials::Credentials,
    types::{
        ConnectionEvent, DisconnectCode, GroupInfo, OutboundMedia, SendAck,
        WireEvent, WireRequest,
    },
};

/// Default sidecar WebSocket URL.
pub const DEFAULT_SIDECAR_URL: &str = "ws://127.0.0.1:9876";

/// How long to wait for a correlated reply before giving up.
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for outgoing requests and incoming events.
const CHANNEL_CAPACITY: usize = 32;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<WireEvent>>>>;

/// Connector that speaks to the Baileys sidecar over WebSocket.
pub struct SidecarConnector {
    url: String,
}

impl SidecarConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for SidecarConnector {
    async fn open(
        &self,
        tenant: &str,
        credentials: &Credentials,
    ) -> Result<(Arc<dyn ConnectorHandle>, mpsc::Receiver<ConnectionEvent>), ConnectorError> {
        info!(tenant, url = %self.url, "connecting to sidecar");

        let (ws_stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| ConnectorError::Unavailable(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (req_tx, mut req_rx) = mpsc::channel::<WireRequest>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(CHANNEL_CAPACITY);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        // Writer task: serialize requests onto the socket.
        let writer_alive = Arc::clone(&alive);
        tokio::spawn(async move {
            while let Some(req) = req_rx.recv().await {
                match serde_json::to_string(&req) {
                    Ok(json) => {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            error!(error = %e, "failed to send request to sidecar");
                            break;
                        }
                        debug!(?req, "sent request to sidecar");
                    },
                    Err(e) => error!(error = %e, "failed to serialize sidecar request"),
                }
            }
            writer_alive.store(false, Ordering::SeqCst);
        });

        // Reader task: dispatch frames to the event channel or pending replies.
        let reader_tenant = tenant.to_string();
        let reader_pending = Arc::clone(&pending);
        let reader_alive = Arc::clone(&alive);
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<WireEvent>(&text) {
                        Ok(event) => {
                            dispatch_event(event, &reader_tenant, &event_tx, &reader_pending).await;
                        },
                        Err(e) => {
                            warn!(error = %e, text = %text, "failed to parse sidecar frame");
                        },
                    },
                    Ok(Message::Close(_)) => {
                        info!(tenant = %reader_tenant, "sidecar closed the connection");
                        break;
                    },
                    Ok(_) => {}, // ping/pong/binary
                    Err(e) => {
                        error!(tenant = %reader_tenant, error = %e, "sidecar read error");
                        break;
                    },
                }
            }

            reader_alive.store(false, Ordering::SeqCst);
            reader_pending.lock().map(|mut p| p.clear()).ok();
            // Transport loss looks like a lost connection to the session layer.
            let _ = event_tx
                .send(ConnectionEvent::closed(DisconnectCode::CONNECTION_LOST))
                .await;
        });

        let auth_dir = credentials.path.to_string_lossy().into_owned();
        req_tx
            .send(WireRequest::Login {
                tenant: tenant.to_string(),
                auth_dir,
            })
            .await
            .map_err(|_| ConnectorError::Unavailable("sidecar writer gone".into()))?;

        let handle = SidecarHandle {
            tenant: tenant.to_string(),
            tx: req_tx,
            pending,
            alive,
        };
        Ok((Arc::new(handle), event_rx))
    }
}

async fn dispatch_event(
    event: WireEvent,
    tenant: &str,
    event_tx: &mpsc::Sender<ConnectionEvent>,
    pending: &PendingMap,
) {
    match event {
        WireEvent::Connection {
            tenant: event_tenant,
            phase,
            pairing_code,
            reason,
        } => {
            if event_tenant != tenant {
                // Socket is per-tenant; anything else is a sidecar bug.
                warn!(tenant, event_tenant, "dropping event for foreign tenant");
                return;
            }
            let event = ConnectionEvent {
                phase,
                pairing: pairing_code,
                disconnect: reason.map(DisconnectCode),
            };
            if event_tx.send(event).await.is_err() {
                debug!(tenant, "event receiver dropped");
            }
        },
        WireEvent::SendResult { ref request_id, .. } | WireEvent::Groups { ref request_id, .. } => {
            let key = request_id.clone();
            let waiter = pending.lock().ok().and_then(|mut p| p.remove(&key));
            match waiter {
                Some(tx) => {
                    let _ = tx.send(event);
                },
                None => warn!(tenant, request_id = %key, "reply with no pending request"),
            }
        },
        WireEvent::Error {
            tenant: event_tenant,
            error,
        } => {
            warn!(tenant, ?event_tenant, error, "sidecar reported error");
        },
    }
}

struct SidecarHandle {
    tenant: String,
    tx: mpsc::Sender<WireRequest>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
}

impl SidecarHandle {
    async fn request(&self, request_id: String, req: WireRequest) -> Result<WireEvent, ConnectorError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ConnectorError::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(request_id.clone(), tx);
        }

        if self.tx.send(req).await.is_err() {
            self.forget(&request_id);
            return Err(ConnectorError::NotConnected);
        }

        match tokio::time::timeout(REPLY_TIMEOUT, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(ConnectorError::NotConnected),
            Err(_) => {
                self.forget(&request_id);
                Err(ConnectorError::Timeout)
            },
        }
    }

    fn forget(&self, request_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(request_id);
        }
    }
}

#[async_trait]
impl ConnectorHandle for SidecarHandle {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendAck, ConnectorError> {
        let request_id = Uuid::new_v4().to_string();
        debug!(tenant = %self.tenant, to, request_id, "sending text message");

        let reply = self
            .request(request_id.clone(), WireRequest::SendText {
                tenant: self.tenant.clone(),
                to: to.to_string(),
                text: body.to_string(),
                request_id,
            })
            .await?;
        send_result(reply)
    }

    async fn send_media(&self, to: &str, media: &OutboundMedia) -> Result<SendAck, ConnectorError> {
        let request_id = Uuid::new_v4().to_string();
        debug!(
            tenant = %self.tenant,
            to,
            request_id,
            media_type = media.kind.as_str(),
            "sending media message"
        );

        let reply = self
            .request(request_id.clone(), WireRequest::SendMedia {
                tenant: self.tenant.clone(),
                to: to.to_string(),
                media_url: media.url.clone(),
                media_type: media.kind.as_str().to_string(),
                caption: media.caption.clone(),
                voice_note: media.voice_note,
                file_name: media.filename.clone(),
                request_id,
            })
            .await?;
        send_result(reply)
    }

    async fn fetch_groups(&self) -> Result<Vec<GroupInfo>, ConnectorError> {
        let request_id = Uuid::new_v4().to_string();
        let reply = self
            .request(request_id.clone(), WireRequest::FetchGroups {
                tenant: self.tenant.clone(),
                request_id,
            })
            .await?;

        match reply {
            WireEvent::Groups { groups, .. } => Ok(groups),
            other => Err(ConnectorError::Rejected(format!(
                "unexpected reply to group fetch: {other:?}"
            ))),
        }
    }

    async fn logout(&self) -> Result<(), ConnectorError> {
        self.tx
            .send(WireRequest::Logout {
                tenant: self.tenant.clone(),
            })
            .await
            .map_err(|_| ConnectorError::NotConnected)
    }
}

fn send_result(reply: WireEvent) -> Result<SendAck, ConnectorError> {
    match reply {
        WireEvent::SendResult {
            success: true,
            message_id,
            ..
        } => Ok(SendAck { message_id }),
        WireEvent::SendResult { error, .. } => Err(ConnectorError::Rejected(
            error.unwrap_or_else(|| "send rejected".into()),
        )),
        other => Err(ConnectorError::Rejected(format!(
            "unexpected reply to send: {other:?}"
        ))),
    }
}
