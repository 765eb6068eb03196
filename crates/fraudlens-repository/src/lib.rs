//! Rule persistence layer for FraudLens
//!
//! This crate provides a unified interface for storing fraud rules in
//! different backends.
//!
//! # Features
//!
//! - **Memory Repository**: process-local storage for tests and embedding
//! - **File System Repository**: one YAML file per rule on disk
//! - **Async API**: non-blocking I/O operations with Tokio
//!
//! # Quick Start
//!
//! ```no_run
//! use fraudlens_repository::{FileSystemRuleRepository, RuleRepository};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let repo = FileSystemRuleRepository::new("rules")?;
//!
//!     for rule in repo.list_rules().await? {
//!         println!("{} (priority {})", rule.name, rule.priority);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file_system;
pub mod memory;
pub mod traits;

pub use error::{RepositoryError, RepositoryResult};
pub use file_system::FileSystemRuleRepository;
pub use memory::MemoryRuleRepository;
pub use traits::RuleRepository;
