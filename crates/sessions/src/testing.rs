//! Scriptable connector and credential-store doubles for lifecycle tests.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, tokio::sync::mpsc};

use wamux_connector::{
    Connector, ConnectorError, ConnectorHandle, CredentialError, CredentialStore,
    credentials::Credentials,
    types::{ConnectionEvent, GroupInfo, OutboundMedia, SendAck},
};

use crate::config::SessionTuning;

/// Tuning with short bounds so lifecycle tests run in milliseconds.
pub(crate) fn fast_tuning() -> SessionTuning {
    SessionTuning {
        connect_timeout: Duration::from_millis(200),
        probe_timeout: Duration::from_millis(100),
        pairing_poll: Duration::from_millis(10),
        pairing_deadline: Duration::from_millis(150),
        groups_ttl: Duration::from_secs(300),
    }
}

/// Poll `condition` until it holds or two seconds elapse.
pub(crate) async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub(crate) struct MockConnector {
    opens: AtomicUsize,
    fail_next: AtomicUsize,
    senders: Mutex<Vec<mpsc::Sender<ConnectionEvent>>>,
    handles: Mutex<Vec<Arc<MockHandle>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Make the next `n` open attempts fail.
    pub fn fail_next_opens(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Emit an event on the most recently opened connection.
    pub async fn emit(&self, event: ConnectionEvent) {
        let sender = self
            .senders
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened yet");
        sender.send(event).await.expect("event receiver dropped");
    }

    pub fn last_handle(&self) -> Arc<MockHandle> {
        self.handles
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened yet")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        _tenant: &str,
        _credentials: &Credentials,
    ) -> Result<(Arc<dyn ConnectorHandle>, mpsc::Receiver<ConnectionEvent>), ConnectorError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(ConnectorError::Unavailable("scripted failure".into()));
        }

        let (tx, rx) = mpsc::channel(8);
        let handle = Arc::new(MockHandle::default());
        self.senders.lock().unwrap().push(tx);
        self.handles.lock().unwrap().push(Arc::clone(&handle));
        Ok((handle, rx))
    }
}

#[derive(Default)]
pub(crate) struct MockHandle {
    pub sent: Mutex<Vec<(String, String)>>,
    pub group_fetches: AtomicUsize,
    pub groups: Mutex<Vec<GroupInfo>>,
    pub logouts: AtomicUsize,
}

#[async_trait]
impl ConnectorHandle for MockHandle {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendAck, ConnectorError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(SendAck {
            message_id: Some("mock-msg".into()),
        })
    }

    async fn send_media(&self, to: &str, media: &OutboundMedia) -> Result<SendAck, ConnectorError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), format!("media:{}", media.url)));
        Ok(SendAck {
            message_id: Some("mock-media".into()),
        })
    }

    async fn fetch_groups(&self) -> Result<Vec<GroupInfo>, ConnectorError> {
        self.group_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn logout(&self) -> Result<(), ConnectorError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct MockStore {
    dirs: Mutex<HashSet<String>>,
    deletes: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dirs: Mutex::new(HashSet::new()),
            deletes: AtomicUsize::new(0),
        })
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn seed(&self, tenant: &str) {
        self.dirs.lock().unwrap().insert(tenant.to_string());
    }
}

#[async_trait]
impl CredentialStore for MockStore {
    async fn load(&self, tenant: &str) -> Result<Credentials, CredentialError> {
        let fresh = self.dirs.lock().unwrap().insert(tenant.to_string());
        Ok(Credentials {
            path: self.locate(tenant),
            fresh,
        })
    }

    async fn exists(&self, tenant: &str) -> bool {
        self.dirs.lock().unwrap().contains(tenant)
    }

    async fn delete(&self, tenant: &str) -> Result<(), CredentialError> {
        self.dirs.lock().unwrap().remove(tenant);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CredentialError> {
        let mut tenants: Vec<String> = self.dirs.lock().unwrap().iter().cloned().collect();
        tenants.sort();
        Ok(tenants)
    }

    fn locate(&self, tenant: &str) -> PathBuf {
        PathBuf::from("/mock-credentials").join(tenant)
    }
}
