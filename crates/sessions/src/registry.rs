//! Multi-tenant session registry.
//!
//! Owns the tenant → session map. Creation is lazy and atomic: two
//! concurrent first references to an unseen tenant resolve to the same
//! handle, never two. Removal closes the session (logout + credential
//! delete) before evicting; the reaper sweeps tenants independently so one
//! failing probe cannot shield the rest.

use std::sync::Arc;

use {dashmap::DashMap, tracing::{info, warn}};

use wamux_connector::{Connector, CredentialStore};

use crate::{
    config::SessionTuning,
    error::SessionError,
    handle::{SessionHandle, SessionStatus},
};

/// Outcome of one reap sweep.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ReapReport {
    /// Registered sessions that were removed.
    pub removed: Vec<String>,
    /// Credential directories deleted without a registered session.
    pub orphans: Vec<String>,
}

pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    store: Arc<dyn CredentialStore>,
    tuning: SessionTuning,
    sessions: DashMap<String, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<dyn CredentialStore>,
        tuning: SessionTuning,
    ) -> Self {
        Self {
            connector,
            store,
            tuning,
            sessions: DashMap::new(),
        }
    }

    /// Resolve the tenant's session, creating it on first reference.
    pub fn get(&self, tenant: &str) -> Arc<SessionHandle> {
        if let Some(handle) = self.sessions.get(tenant) {
            return Arc::clone(&handle);
        }
        // The entry lock makes first-reference construction single-flight.
        let handle = self
            .sessions
            .entry(tenant.to_string())
            .or_insert_with(|| {
                info!(tenant, "creating session");
                SessionHandle::new(
                    tenant,
                    Arc::clone(&self.connector),
                    Arc::clone(&self.store),
                    self.tuning.clone(),
                )
            });
        Arc::clone(&handle)
    }

    /// Registered tenant ids (registration, not liveness).
    pub fn list(&self) -> Vec<String> {
        let mut tenants: Vec<String> =
            self.sessions.iter().map(|e| e.key().clone()).collect();
        tenants.sort();
        tenants
    }

    /// Close and evict the tenant's session. Removing an absent tenant is a
    /// no-op; returns whether a session was removed.
    pub async fn remove(&self, tenant: &str) -> Result<bool, SessionError> {
        let Some(handle) = self.sessions.get(tenant).map(|h| Arc::clone(&h)) else {
            return Ok(false);
        };
        handle.close().await?;
        self.sessions.remove(tenant);
        info!(tenant, "session removed");
        Ok(true)
    }

    /// Sweep all registered sessions, removing any that are not open.
    ///
    /// Each tenant is evaluated independently; a probe failure counts as
    /// inactivity and never aborts the sweep. Credential directories with no
    /// registered session are deleted as orphans.
    pub async fn reap_inactive(&self) -> ReapReport {
        let mut report = ReapReport::default();

        for tenant in self.list() {
            let Some(handle) = self.sessions.get(&tenant).map(|h| Arc::clone(&h)) else {
                continue;
            };
            let active = matches!(handle.status().await, Ok(SessionStatus::Active));
            if active {
                continue;
            }

            info!(tenant, "reaping inactive session");
            if let Err(e) = self.remove(&tenant).await {
                // Cleanup trouble is not a reason to keep a dead session.
                warn!(tenant, error = %e, "cleanup failed during reap, evicting anyway");
                self.sessions.remove(&tenant);
            }
            report.removed.push(tenant);
        }

        match self.store.list().await {
            Ok(stored) => {
                for tenant in stored {
                    if self.sessions.contains_key(&tenant) {
                        continue;
                    }
                    info!(tenant, "deleting orphaned credentials");
                    match self.store.delete(&tenant).await {
                        Ok(()) => report.orphans.push(tenant),
                        Err(e) => warn!(tenant, error = %e, "failed to delete orphan"),
                    }
                }
            },
            Err(e) => warn!(error = %e, "failed to scan credential storage"),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        machine::ConnectionState,
        testing::{MockConnector, MockStore, fast_tuning, wait_until},
    };
    use wamux_connector::types::ConnectionEvent;

    fn registry(
        connector: &Arc<MockConnector>,
        store: &Arc<MockStore>,
    ) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(
            Arc::clone(connector) as Arc<dyn Connector>,
            Arc::clone(store) as Arc<dyn CredentialStore>,
            fast_tuning(),
        ))
    }

    async fn open_session(
        registry: &Arc<SessionRegistry>,
        connector: &Arc<MockConnector>,
        store: &Arc<MockStore>,
        tenant: &str,
    ) -> Arc<SessionHandle> {
        // Paired sessions have persisted credentials.
        store.seed(tenant);
        let handle = registry.get(tenant);
        let opens_before = connector.open_count();
        let ready = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move {
                handle.status().await
            })
        };
        wait_until("connector opened", || connector.open_count() > opens_before).await;
        connector.emit(ConnectionEvent::open()).await;
        assert_eq!(ready.await.unwrap().unwrap(), SessionStatus::Active);
        handle
    }

    #[tokio::test]
    async fn concurrent_first_references_share_one_handle() {
        let connector = MockConnector::new();
        let store = MockStore::new();
        let registry = registry(&connector, &store);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.get("acme") }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        for handle in &handles {
            assert!(Arc::ptr_eq(handle, &handles[0]));
        }
        // Lookup alone must not spin up connectors.
        assert_eq!(connector.open_count(), 0);
        assert_eq!(registry.list(), vec!["acme"]);
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_cleans_up() {
        let connector = MockConnector::new();
        let store = MockStore::new();
        let registry = registry(&connector, &store);
        open_session(&registry, &connector, &store, "acme").await;

        assert!(registry.remove("acme").await.unwrap());
        assert_eq!(store.delete_count(), 1);
        assert!(registry.list().is_empty());

        // Absent tenant: no-op, not an error.
        assert!(!registry.remove("acme").await.unwrap());
    }

    #[tokio::test]
    async fn remove_then_get_yields_a_fresh_handle() {
        let connector = MockConnector::new();
        let store = MockStore::new();
        let registry = registry(&connector, &store);
        let old = open_session(&registry, &connector, &store, "acme").await;

        registry.remove("acme").await.unwrap();
        let fresh = registry.get("acme");

        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(
            fresh.snapshot().await.state,
            ConnectionState::Uninitialized
        );
    }

    #[tokio::test]
    async fn reap_removes_failing_tenant_and_keeps_open_one() {
        let connector = MockConnector::new();
        let store = MockStore::new();
        let registry = registry(&connector, &store);

        // "alive" is open; "dead" has no credentials so its probe fails.
        open_session(&registry, &connector, &store, "alive").await;
        registry.get("dead");

        let report = registry.reap_inactive().await;
        assert_eq!(report.removed, vec!["dead"]);
        assert_eq!(registry.list(), vec!["alive"]);
    }

    #[tokio::test]
    async fn reap_deletes_orphaned_credentials() {
        let connector = MockConnector::new();
        let store = MockStore::new();
        store.seed("ghost");
        let registry = registry(&connector, &store);
        open_session(&registry, &connector, &store, "alive").await;

        let report = registry.reap_inactive().await;
        assert_eq!(report.orphans, vec!["ghost"]);
        assert!(!store.exists("ghost").await);
        assert_eq!(registry.list(), vec!["alive"]);
    }
}
