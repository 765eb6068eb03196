//! List backend implementations
//!
//! Backends for storing and querying list entries. Entries are identifiers
//! compared case-insensitively; backends store them trimmed and lower-cased.

pub mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::Result;

/// Trait for list storage backends
#[async_trait::async_trait]
pub trait ListBackend: Send + Sync {
    /// Check if a value exists in the list
    async fn contains(&self, list_id: &str, value: &str) -> Result<bool>;

    /// Add a value to the list
    async fn add(&mut self, list_id: &str, value: &str) -> Result<()>;

    /// Remove a value from the list
    async fn remove(&mut self, list_id: &str, value: &str) -> Result<()>;

    /// Get all values in a list
    async fn get_all(&self, list_id: &str) -> Result<Vec<String>>;
}

/// Storage key of a list entry
pub(crate) fn normalize_entry(value: &str) -> String {
    value.trim().to_lowercase()
}
