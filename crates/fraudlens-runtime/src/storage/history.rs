//! Transaction history collaborator

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fraudlens_core::{Transaction, TransactionStatus, TransactionSummary};
use tokio::sync::RwLock;

/// Identity a history query is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HistoryDimension {
    User(String),
    Ip(String),
    Device(String),
    PaymentMethod(String),
}

impl HistoryDimension {
    /// Dimension name used in logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            HistoryDimension::User(_) => "user",
            HistoryDimension::Ip(_) => "ip",
            HistoryDimension::Device(_) => "device",
            HistoryDimension::PaymentMethod(_) => "payment_method",
        }
    }

    /// Identifier value
    pub fn id(&self) -> &str {
        match self {
            HistoryDimension::User(id)
            | HistoryDimension::Ip(id)
            | HistoryDimension::Device(id)
            | HistoryDimension::PaymentMethod(id) => id,
        }
    }

    /// Returns true if the record belongs to this dimension
    pub fn matches(&self, tx: &TransactionSummary) -> bool {
        let field = match self {
            HistoryDimension::User(_) => tx.user_id.as_deref(),
            HistoryDimension::Ip(_) => tx.ip_address.as_deref(),
            HistoryDimension::Device(_) => tx.device_fingerprint.as_deref(),
            HistoryDimension::PaymentMethod(_) => tx.payment_method_id.as_deref(),
        };
        field == Some(self.id())
    }
}

/// Filter for history queries
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub dimension: Option<HistoryDimension>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
    /// Allowed statuses; empty means any
    pub statuses: Vec<TransactionStatus>,
    /// Only records with both coordinates
    pub require_coordinates: bool,
    /// Record to leave out, usually the transaction being assessed
    pub exclude_id: Option<String>,
    /// Maximum number of records, newest first
    pub limit: Option<usize>,
}

impl TransactionFilter {
    /// Create a filter scoped to a dimension
    pub fn for_dimension(dimension: HistoryDimension) -> Self {
        Self {
            dimension: Some(dimension),
            ..Default::default()
        }
    }

    /// Set the inclusive lower bound
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Set the exclusive upper bound
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Restrict statuses
    pub fn with_statuses(mut self, statuses: &[TransactionStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Only records with coordinates
    pub fn with_coordinates(mut self) -> Self {
        self.require_coordinates = true;
        self
    }

    /// Leave out a record
    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    /// Limit the result size
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a record matches this filter
    pub fn matches(&self, tx: &TransactionSummary) -> bool {
        if let Some(dimension) = &self.dimension {
            if !dimension.matches(tx) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if tx.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if tx.created_at >= until {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&tx.status) {
            return false;
        }
        if self.require_coordinates && tx.coordinates().is_none() {
            return false;
        }
        if self.exclude_id.as_deref() == Some(tx.id.as_str()) {
            return false;
        }
        true
    }
}

/// Async history trait for querying past transactions
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    /// Records matching the filter, newest first
    async fn find_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionSummary>>;

    /// Number of records matching the filter (the limit is ignored)
    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<usize> {
        let mut unlimited = filter.clone();
        unlimited.limit = None;
        Ok(self.find_transactions(&unlimited).await?.len())
    }

    /// Store a processed transaction
    async fn record_transaction(&self, summary: TransactionSummary) -> Result<()>;

    /// Mark a stored transaction as confirmed fraud or legitimate.
    /// Returns false if the transaction is unknown.
    async fn set_fraud_flag(&self, transaction_id: &str, fraudulent: bool) -> Result<bool>;
}

/// In-memory history implementation
#[derive(Default)]
pub struct InMemoryTransactionHistory {
    records: RwLock<Vec<TransactionSummary>>,
}

impl InMemoryTransactionHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history seeded with records
    pub fn with_records(records: Vec<TransactionSummary>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Add a record
    pub async fn add(&self, record: TransactionSummary) {
        self.records.write().await.push(record);
    }

    /// Add a transaction as a history record
    pub async fn add_transaction(&self, tx: &Transaction, status: TransactionStatus) {
        self.add(TransactionSummary::from_transaction(tx, status)).await;
    }

    /// Add multiple records
    pub async fn extend(&self, records: impl IntoIterator<Item = TransactionSummary>) {
        self.records.write().await.extend(records);
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionHistory for InMemoryTransactionHistory {
    async fn find_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionSummary>> {
        let records = self.records.read().await;

        let mut results: Vec<TransactionSummary> =
            records.iter().filter(|tx| filter.matches(tx)).cloned().collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|tx| filter.matches(tx)).count())
    }

    async fn record_transaction(&self, summary: TransactionSummary) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == summary.id) {
            Some(existing) => *existing = summary,
            None => records.push(summary),
        }
        Ok(())
    }

    async fn set_fraud_flag(&self, transaction_id: &str, fraudulent: bool) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == transaction_id) {
            Some(record) => {
                record.flagged_fraud = fraudulent;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn record(id: &str, user: &str, minutes_ago: i64, status: TransactionStatus) -> TransactionSummary {
        let tx = Transaction::new(id, Decimal::new(100, 0), "USD")
            .with_user(user)
            .at(Utc::now() - Duration::minutes(minutes_ago));
        TransactionSummary::from_transaction(&tx, status)
    }

    #[tokio::test]
    async fn test_filter_by_dimension_and_time() {
        let history = InMemoryTransactionHistory::with_records(vec![
            record("t1", "alice", 2, TransactionStatus::Succeeded),
            record("t2", "alice", 30, TransactionStatus::Succeeded),
            record("t3", "bob", 1, TransactionStatus::Succeeded),
            record("t4", "alice", 3, TransactionStatus::Failed),
        ]);

        let filter = TransactionFilter::for_dimension(HistoryDimension::User("alice".into()))
            .since(Utc::now() - Duration::minutes(10))
            .with_statuses(&[TransactionStatus::Succeeded, TransactionStatus::Processing]);

        let found = history.find_transactions(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "t1");
        assert_eq!(history.count_transactions(&filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_newest_first_with_limit() {
        let history = InMemoryTransactionHistory::with_records(vec![
            record("old", "alice", 50, TransactionStatus::Succeeded),
            record("new", "alice", 5, TransactionStatus::Succeeded),
            record("mid", "alice", 20, TransactionStatus::Succeeded),
        ]);

        let filter = TransactionFilter::for_dimension(HistoryDimension::User("alice".into())).limit(2);
        let found = history.find_transactions(&filter).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(history.count_transactions(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_set_fraud_flag() {
        let history = InMemoryTransactionHistory::new();
        history
            .add(record("t1", "alice", 1, TransactionStatus::Succeeded))
            .await;

        assert!(history.set_fraud_flag("t1", true).await.unwrap());
        assert!(!history.set_fraud_flag("missing", true).await.unwrap());

        let all = history.find_transactions(&TransactionFilter::default()).await.unwrap();
        assert!(all[0].flagged_fraud);
    }
}
