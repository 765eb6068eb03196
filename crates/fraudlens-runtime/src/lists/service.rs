//! List service combining list backends

use super::backend::{FileBackend, ListBackend, MemoryBackend};
use super::checker::{ListCheckResult, ListChecker, ListKind, ListMatch, ListType};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use fraudlens_core::Transaction;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// List service that manages list lookups across multiple backends
///
/// Each list ID (`<type>:<kind>`, e.g. `blacklist:email`) maps to one
/// backend. Lists that were never configured are treated as empty.
#[derive(Clone, Default)]
pub struct ListService {
    /// Map of list_id to backend
    backends: Arc<RwLock<HashMap<String, Box<dyn ListBackend>>>>,
}

impl ListService {
    /// Create an empty list service
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a backend to a list, replacing any previous one
    pub async fn register_backend(
        &self,
        list_type: ListType,
        kind: ListKind,
        backend: Box<dyn ListBackend>,
    ) {
        self.backends
            .write()
            .await
            .insert(kind.list_id(list_type), backend);
    }

    /// Load a list from a text file and attach it
    pub async fn load_file(
        &self,
        list_type: ListType,
        kind: ListKind,
        path: impl Into<PathBuf>,
    ) -> Result<usize> {
        let backend = FileBackend::new(path.into());
        backend.load().await?;
        let count = backend.len().await;
        debug!(
            list = %kind.list_id(list_type),
            path = %backend.path().display(),
            entries = count,
            "Loaded list file"
        );
        self.register_backend(list_type, kind, Box::new(backend)).await;
        Ok(count)
    }

    /// Add an entry, creating an in-memory list on first use
    pub async fn add(&self, list_type: ListType, kind: ListKind, value: &str) -> Result<()> {
        let list_id = kind.list_id(list_type);
        let mut backends = self.backends.write().await;
        let backend = backends
            .entry(list_id.clone())
            .or_insert_with(|| Box::new(MemoryBackend::new()) as Box<dyn ListBackend>);
        backend.add(&list_id, value).await
    }

    /// Remove an entry
    pub async fn remove(&self, list_type: ListType, kind: ListKind, value: &str) -> Result<()> {
        let list_id = kind.list_id(list_type);
        let mut backends = self.backends.write().await;
        let backend = backends.get_mut(&list_id).ok_or_else(|| {
            RuntimeError::InvalidOperation(format!("List '{}' not found", list_id))
        })?;
        backend.remove(&list_id, value).await
    }

    /// Check if a value exists in a list
    pub async fn contains(&self, list_type: ListType, kind: ListKind, value: &str) -> Result<bool> {
        let list_id = kind.list_id(list_type);
        let backends = self.backends.read().await;
        match backends.get(&list_id) {
            Some(backend) => backend.contains(&list_id, value).await,
            None => Ok(false),
        }
    }

    /// Get all values in a list
    pub async fn get_all(&self, list_type: ListType, kind: ListKind) -> Result<Vec<String>> {
        let list_id = kind.list_id(list_type);
        let backends = self.backends.read().await;
        match backends.get(&list_id) {
            Some(backend) => backend.get_all(&list_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Get list of all configured list IDs
    pub async fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn check(&self, list_type: ListType, tx: &Transaction) -> Result<ListCheckResult> {
        let backends = self.backends.read().await;
        let mut matches = Vec::new();

        for kind in ListKind::ALL {
            let Some(value) = kind.extract(tx) else {
                continue;
            };
            let list_id = kind.list_id(list_type);
            if let Some(backend) = backends.get(&list_id) {
                if backend.contains(&list_id, &value).await? {
                    matches.push(ListMatch { kind, value });
                }
            }
        }

        Ok(ListCheckResult::from_matches(matches))
    }
}

#[async_trait]
impl ListChecker for ListService {
    async fn check_blacklist(&self, tx: &Transaction) -> Result<ListCheckResult> {
        self.check(ListType::Blacklist, tx).await
    }

    async fn check_whitelist(&self, tx: &Transaction) -> Result<ListCheckResult> {
        self.check(ListType::Whitelist, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_core::Geolocation;
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn transaction() -> Transaction {
        Transaction::new("t1", Decimal::new(250, 0), "USD")
            .with_user("u1")
            .with_email("buyer@mailinator.com")
            .with_ip("203.0.113.7")
            .with_geolocation(Geolocation::new("US"))
    }

    #[tokio::test]
    async fn test_blacklist_matches() {
        let service = ListService::new();
        service
            .add(ListType::Blacklist, ListKind::EmailDomain, "mailinator.com")
            .await
            .unwrap();
        service
            .add(ListType::Blacklist, ListKind::Ip, "203.0.113.7")
            .await
            .unwrap();

        let result = service.check_blacklist(&transaction()).await.unwrap();
        assert!(result.matched);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].kind, ListKind::EmailDomain);
        assert_eq!(result.describe(), "email_domain, ip");

        let whitelist = service.check_whitelist(&transaction()).await.unwrap();
        assert!(!whitelist.matched);
    }

    #[tokio::test]
    async fn test_unconfigured_lists_are_empty() {
        let service = ListService::new();
        assert!(!service
            .contains(ListType::Whitelist, ListKind::User, "u1")
            .await
            .unwrap());
        assert!(service
            .remove(ListType::Whitelist, ListKind::User, "u1")
            .await
            .is_err());
        assert!(!service.check_blacklist(&transaction()).await.unwrap().matched);
    }

    #[tokio::test]
    async fn test_load_file_list() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# trusted customers").unwrap();
        writeln!(file, "U1").unwrap();
        file.flush().unwrap();

        let service = ListService::new();
        let count = service
            .load_file(ListType::Whitelist, ListKind::User, file.path())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let result = service.check_whitelist(&transaction()).await.unwrap();
        assert!(result.matched);
        assert_eq!(service.list_ids().await, vec!["whitelist:user"]);
    }
}
