//! Input loading for the CLI

use anyhow::{bail, Context, Result};
use fraudlens_core::{Transaction, TransactionSummary};
use fraudlens_runtime::{ListKind, ListService, ListType};
use std::path::Path;
use tracing::{debug, info, warn};

/// Parse a list file name such as `blacklist_email_domain.txt`
pub fn parse_list_file_name(path: &Path) -> Option<(ListType, ListKind)> {
    let stem = path.file_stem()?.to_str()?;
    let (side, kind) = stem.split_once('_')?;
    let list_type = match side {
        "blacklist" => ListType::Blacklist,
        "whitelist" => ListType::Whitelist,
        _ => return None,
    };
    Some((list_type, ListKind::parse(kind)?))
}

/// Attach every list file of a directory to a new list service
pub async fn load_lists(dir: &Path) -> Result<ListService> {
    let service = ListService::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read lists directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some((list_type, kind)) = parse_list_file_name(&path) else {
            warn!(path = %path.display(), "Skipping file with unrecognized list name");
            continue;
        };
        let count = service
            .load_file(list_type, kind, path.clone())
            .await
            .with_context(|| format!("Failed to load list {}", path.display()))?;
        debug!(list = %kind.list_id(list_type), entries = count, "Loaded list");
    }

    info!(lists = service.list_ids().await.len(), "Lists loaded");
    Ok(service)
}

/// Read a JSON array of prior transactions
pub fn load_history(path: &Path) -> Result<Vec<TransactionSummary>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    let records: Vec<TransactionSummary> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid history file {}", path.display()))?;
    info!(records = records.len(), "History loaded");
    Ok(records)
}

/// Read transactions as a JSON array or as one JSON object per line
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transactions file {}", path.display()))?;
    parse_transactions(&content)
}

pub fn parse_transactions(content: &str) -> Result<Vec<Transaction>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        bail!("No transactions to assess");
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Invalid transaction array");
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid transaction on line {}", i + 1))
        })
        .collect()
}
