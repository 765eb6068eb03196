//! List management module
//!
//! Blacklists and whitelists keyed by the identities carried on a
//! transaction (user, email, IP, device, ...). Lists are stored in pluggable
//! backends and combined by [`ListService`], which answers the
//! blacklist/whitelist checks of the assessment pipeline.

pub mod backend;
pub mod checker;
pub mod service;

pub use backend::{FileBackend, ListBackend, MemoryBackend};
pub use checker::{ListCheckResult, ListChecker, ListKind, ListMatch, ListType};
pub use service::ListService;
