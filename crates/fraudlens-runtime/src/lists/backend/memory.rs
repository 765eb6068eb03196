//! In-memory list backend

use super::{normalize_entry, ListBackend};
use crate::error::{Result, RuntimeError};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// In-memory list backend
///
/// Stores entries in HashSets keyed by list ID. Suitable for tests and for
/// lists managed at runtime; data is lost when the process restarts.
#[derive(Default)]
pub struct MemoryBackend {
    /// Map of list_id -> set of entries
    lists: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryBackend {
    /// Create a new memory backend
    pub fn new() -> Self {
        Self::default()
    }

    fn key(value: &str) -> Result<String> {
        let key = normalize_entry(value);
        if key.is_empty() {
            return Err(RuntimeError::InvalidValue(
                "List entries cannot be empty".to_string(),
            ));
        }
        Ok(key)
    }
}

#[async_trait::async_trait]
impl ListBackend for MemoryBackend {
    async fn contains(&self, list_id: &str, value: &str) -> Result<bool> {
        let key = normalize_entry(value);
        let lists = self.lists.read().await;
        Ok(lists.get(list_id).is_some_and(|list| list.contains(&key)))
    }

    async fn add(&mut self, list_id: &str, value: &str) -> Result<()> {
        let key = Self::key(value)?;
        self.lists
            .write()
            .await
            .entry(list_id.to_string())
            .or_default()
            .insert(key);
        Ok(())
    }

    async fn remove(&mut self, list_id: &str, value: &str) -> Result<()> {
        let key = normalize_entry(value);
        if let Some(list) = self.lists.write().await.get_mut(list_id) {
            list.remove(&key);
        }
        Ok(())
    }

    async fn get_all(&self, list_id: &str) -> Result<Vec<String>> {
        let lists = self.lists.read().await;
        let mut values: Vec<String> = lists
            .get(list_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default();
        values.sort();
        Ok(values)
    }
}
