//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use fraudlens_core::{Geolocation, TransactionStatus, TransactionSummary};
use fraudlens_sdk::{
    FraudConfig, FraudDetector, FraudDetectorBuilder, FraudRule, InMemoryAssessmentStore,
    InMemoryTransactionHistory, ListService, Transaction,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Test helper wiring a detector over in-memory collaborators the test can inspect
pub struct TestDetector {
    pub config: FraudConfig,
    pub history: Arc<InMemoryTransactionHistory>,
    pub assessments: Arc<InMemoryAssessmentStore>,
    pub lists: Arc<ListService>,
    rules: Vec<FraudRule>,
}

impl TestDetector {
    pub fn new() -> Self {
        Self {
            config: FraudConfig::default(),
            history: Arc::new(InMemoryTransactionHistory::new()),
            assessments: Arc::new(InMemoryAssessmentStore::new()),
            lists: Arc::new(ListService::new()),
            rules: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: FraudConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rule(mut self, rule: FraudRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Seed the history with prior transactions
    pub async fn with_history(self, records: Vec<TransactionSummary>) -> Self {
        self.history.extend(records).await;
        self
    }

    pub async fn build(&self) -> FraudDetector {
        FraudDetectorBuilder::new()
            .with_config(self.config.clone())
            .with_rules(self.rules.clone())
            .with_transaction_history(self.history.clone())
            .with_assessment_store(self.assessments.clone())
            .with_list_checker(self.lists.clone())
            .build()
            .await
            .expect("detector should build")
    }
}

/// Transaction of a user in USD, created now
pub fn transaction(id: &str, user: &str, amount: i64) -> Transaction {
    Transaction::new(id, Decimal::from(amount), "USD").with_user(user)
}

/// Successful history record located in Paris
pub fn paris_record(id: &str, user: &str, at: DateTime<Utc>) -> TransactionSummary {
    let tx = Transaction::new(id, Decimal::from(100), "USD")
        .with_user(user)
        .with_payment_method("pm_1")
        .with_device_fingerprint("device_1")
        .with_ip("203.0.113.10")
        .with_geolocation(
            Geolocation::new("FR")
                .with_city("Paris")
                .with_coordinates(48.8566, 2.3522),
        )
        .at(at);
    TransactionSummary::from_transaction(&tx, TransactionStatus::Succeeded)
}

/// `count` records spread over the last weeks, two days apart
pub fn regular_history(user: &str, count: usize) -> Vec<TransactionSummary> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            paris_record(
                &format!("hist_{}", i),
                user,
                now - Duration::days(2 * (count - i) as i64),
            )
        })
        .collect()
}
