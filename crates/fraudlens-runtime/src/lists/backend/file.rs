//! File-based list backend

use super::{normalize_entry, ListBackend};
use crate::error::{Result, RuntimeError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

/// File-based list backend
///
/// Loads entries from a text file (one entry per line, `#` starts a comment
/// line). The backend holds a single list; the list ID passed to lookups is
/// ignored. Read-only.
pub struct FileBackend {
    /// Path to the list file
    file_path: PathBuf,

    /// Cached entries
    entries: Arc<RwLock<HashSet<String>>>,
}

impl FileBackend {
    /// Create a new file backend; call [`FileBackend::load`] before use
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            entries: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Load entries from file
    async fn load_from_file(path: &Path) -> Result<HashSet<String>> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            RuntimeError::InvalidOperation(format!(
                "Failed to read list file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(normalize_entry)
            .collect())
    }

    /// Load entries immediately
    pub async fn load(&self) -> Result<()> {
        let loaded = Self::load_from_file(&self.file_path).await?;
        *self.entries.write().await = loaded;
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Get the number of entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the list is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ListBackend for FileBackend {
    async fn contains(&self, _list_id: &str, value: &str) -> Result<bool> {
        let key = normalize_entry(value);
        Ok(self.entries.read().await.contains(&key))
    }

    async fn add(&mut self, _list_id: &str, _value: &str) -> Result<()> {
        Err(RuntimeError::InvalidOperation(
            "File backend is read-only".to_string(),
        ))
    }

    async fn remove(&mut self, _list_id: &str, _value: &str) -> Result<()> {
        Err(RuntimeError::InvalidOperation(
            "File backend is read-only".to_string(),
        ))
    }

    async fn get_all(&self, _list_id: &str) -> Result<Vec<String>> {
        let mut values: Vec<String> = self.entries.read().await.iter().cloned().collect();
        values.sort();
        Ok(values)
    }
}
