//! Persisted credential storage.
//!
//! Each tenant owns one directory of auth material written by the connector
//! (multi-file auth state). The session layer only ever creates, locates,
//! and deletes whole directories; it never interprets the contents.

use std::path::{Path, PathBuf};

use {async_trait::async_trait, thiserror::Error, tokio::fs, tracing::warn};

/// Locator for one tenant's persisted auth material.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub path: PathBuf,
    /// True when the directory was created by this load, i.e. the account
    /// has never been paired.
    pub fresh: bool,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential persistence collaborator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the tenant's credentials, creating a fresh unpaired set if none
    /// exist yet.
    async fn load(&self, tenant: &str) -> Result<Credentials, CredentialError>;

    /// Whether persisted credentials exist for the tenant.
    async fn exists(&self, tenant: &str) -> bool;

    /// Delete the tenant's credentials. A no-op if none exist.
    async fn delete(&self, tenant: &str) -> Result<(), CredentialError>;

    /// All tenants with persisted credentials.
    async fn list(&self) -> Result<Vec<String>, CredentialError>;

    /// Where the tenant's credentials live, whether or not they exist.
    fn locate(&self, tenant: &str) -> PathBuf;
}

/// Filesystem-backed store: one subdirectory per tenant under `root`.
pub struct FsCredentialStore {
    root: PathBuf,
}

impl FsCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, tenant: &str) -> PathBuf {
        self.root.join(tenant)
    }
}

#[async_trait]
impl CredentialStore for FsCredentialStore {
    async fn load(&self, tenant: &str) -> Result<Credentials, CredentialError> {
        let path = self.path_for(tenant);
        let fresh = !path.is_dir();
        if fresh {
            fs::create_dir_all(&path).await?;
        }
        Ok(Credentials { path, fresh })
    }

    async fn exists(&self, tenant: &str) -> bool {
        self.path_for(tenant).is_dir()
    }

    async fn delete(&self, tenant: &str) -> Result<(), CredentialError> {
        let path = self.path_for(tenant);
        if !path.is_dir() {
            warn!(tenant, path = %path.display(), "no credentials to delete");
            return Ok(());
        }
        fs::remove_dir_all(&path).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CredentialError> {
        let mut tenants = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tenants),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    tenants.push(name.to_string());
                }
            }
        }
        Ok(tenants)
    }

    fn locate(&self, tenant: &str) -> PathBuf {
        self.path_for(tenant)
    }
}

impl FsCredentialStore {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_creates_fresh_directory_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());

        let first = store.load("acme").await.unwrap();
        assert!(first.fresh);
        assert!(first.path.is_dir());

        let second = store.load("acme").await.unwrap();
        assert!(!second.fresh);
        assert_eq!(first.path, second.path);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());

        store.load("acme").await.unwrap();
        assert!(store.exists("acme").await);

        store.delete("acme").await.unwrap();
        assert!(!store.exists("acme").await);

        // Absent tenant: no error.
        store.delete("acme").await.unwrap();
    }

    #[tokio::test]
    async fn list_returns_tenant_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());

        store.load("a").await.unwrap();
        store.load("b").await.unwrap();

        let mut tenants = store.list().await.unwrap();
        tenants.sort();
        assert_eq!(tenants, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn list_on_missing_root_is_empty() {
        let store = FsCredentialStore::new("/nonexistent/wamux-test-root");
        assert!(store.list().await.unwrap().is_empty());
    }
}
