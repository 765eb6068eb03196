//! Unit tests for FraudDetector

use super::*;
use crate::builder::FraudDetectorBuilder;
use crate::config::FraudConfig;
use async_trait::async_trait;
use fraudlens_core::{
    Action, ConditionOperator, FraudCondition, FraudRule, RiskLevel, Transaction,
    TransactionStatus, TransactionSummary,
};
use fraudlens_runtime::observability::metrics::{
    ASSESSMENTS_TOTAL, ASSESSMENT_ERRORS, BLACKLIST_HITS,
};
use fraudlens_runtime::{
    InMemoryTransactionHistory, ListKind, ListService, ListType, RuntimeError, TransactionFilter,
    TransactionHistory,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn transaction(id: &str, amount: i64) -> Transaction {
    Transaction::new(id, Decimal::from(amount), "USD").with_user("user_1")
}

/// History whose every query fails
struct FailingHistory;

#[async_trait]
impl TransactionHistory for FailingHistory {
    async fn find_transactions(
        &self,
        _filter: &TransactionFilter,
    ) -> fraudlens_runtime::Result<Vec<TransactionSummary>> {
        Err(RuntimeError::Storage("history unavailable".to_string()))
    }

    async fn record_transaction(&self, _summary: TransactionSummary) -> fraudlens_runtime::Result<()> {
        Err(RuntimeError::Storage("history unavailable".to_string()))
    }

    async fn set_fraud_flag(&self, _transaction_id: &str, _fraudulent: bool) -> fraudlens_runtime::Result<bool> {
        Err(RuntimeError::Storage("history unavailable".to_string()))
    }
}

/// History that never answers within any reasonable budget
struct SlowHistory;

#[async_trait]
impl TransactionHistory for SlowHistory {
    async fn find_transactions(
        &self,
        _filter: &TransactionFilter,
    ) -> fraudlens_runtime::Result<Vec<TransactionSummary>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn record_transaction(&self, _summary: TransactionSummary) -> fraudlens_runtime::Result<()> {
        Ok(())
    }

    async fn set_fraud_flag(&self, _transaction_id: &str, _fraudulent: bool) -> fraudlens_runtime::Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_invalid_transaction_falls_back_to_review() {
    let detector = FraudDetectorBuilder::new().build().await.unwrap();

    let assessment = detector
        .analyze_transaction(&transaction("tx_negative", -5))
        .await;

    assert_eq!(assessment.risk_score, 50.0);
    assert_eq!(assessment.risk_level, RiskLevel::Medium);
    assert_eq!(assessment.recommendation, Action::Review);
    assert!(assessment.has_signal("analysis_error"));
    assert_eq!(detector.metrics().counter_value(ASSESSMENT_ERRORS), 1);
    assert_eq!(detector.metrics().counter_value(ASSESSMENTS_TOTAL), 1);
}

#[tokio::test]
async fn test_blacklist_wins_over_whitelist() {
    let lists = Arc::new(ListService::new());
    lists.add(ListType::Blacklist, ListKind::User, "user_1").await.unwrap();
    lists.add(ListType::Whitelist, ListKind::User, "user_1").await.unwrap();

    let detector = FraudDetectorBuilder::new()
        .with_list_checker(lists)
        .build()
        .await
        .unwrap();

    let assessment = detector.analyze_transaction(&transaction("tx_1", 20)).await;

    assert_eq!(assessment.risk_score, 100.0);
    assert_eq!(assessment.risk_level, RiskLevel::Critical);
    assert_eq!(assessment.recommendation, Action::Decline);
    assert!(assessment.has_signal("blacklist"));
    assert!(!assessment.has_signal("whitelist"));
    assert_eq!(detector.metrics().counter_value(BLACKLIST_HITS), 1);
}

#[tokio::test]
async fn test_whitelist_only_allows() {
    let lists = Arc::new(ListService::new());
    lists.add(ListType::Whitelist, ListKind::User, "user_1").await.unwrap();

    let detector = FraudDetectorBuilder::new()
        .with_list_checker(lists)
        .build()
        .await
        .unwrap();

    // Large BTC amount would otherwise score high
    let tx = Transaction::new("tx_1", Decimal::from(50_000), "BTC").with_user("user_1");
    let assessment = detector.analyze_transaction(&tx).await;

    assert_eq!(assessment.risk_score, 0.0);
    assert_eq!(assessment.risk_level, RiskLevel::Low);
    assert_eq!(assessment.recommendation, Action::Allow);
    assert_eq!(assessment.signals.len(), 1);
    assert!(assessment.has_signal("whitelist"));
}

#[tokio::test]
async fn test_failing_generator_is_skipped() {
    let detector = FraudDetectorBuilder::new()
        .with_transaction_history(Arc::new(FailingHistory))
        .build()
        .await
        .unwrap();

    let assessment = detector
        .analyze_transaction(&transaction("tx_1", 12_000))
        .await;

    assert!(!assessment.has_signal("analysis_error"));
    assert!(assessment.has_signal("amount_high"));
    assert!(!assessment.signals.iter().any(|s| s.family() == "behavioral"));
    assert_eq!(
        detector
            .metrics()
            .counter_value("generator_failures_behavioral"),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_generator_times_out() {
    let mut config = FraudConfig::default();
    config.detector.generator_timeout_ms = 50;

    let detector = FraudDetectorBuilder::new()
        .with_config(config)
        .with_transaction_history(Arc::new(SlowHistory))
        .build()
        .await
        .unwrap();

    let assessment = detector.analyze_transaction(&transaction("tx_1", 10)).await;

    assert!(!assessment.has_signal("analysis_error"));
    assert_eq!(
        detector.metrics().counter_value("generator_failures_velocity"),
        1
    );
    assert_eq!(
        detector
            .metrics()
            .counter_value("generator_failures_behavioral"),
        1
    );
}

#[tokio::test]
async fn test_matched_review_rule() {
    let rule = FraudRule::new("high_amount", "High amount", Action::Review, 40.0).add_condition(
        FraudCondition::new("amount", ConditionOperator::GreaterThan, 5000.0),
    );
    let detector = FraudDetectorBuilder::new()
        .add_rule(rule)
        .build()
        .await
        .unwrap();

    let assessment = detector
        .analyze_transaction(&transaction("tx_1", 6_000))
        .await;

    assert_eq!(assessment.matched_rules().count(), 1);
    assert!(assessment.has_signal("amount_elevated"));
    assert_eq!(assessment.recommendation, Action::Review);

    let low = detector.analyze_transaction(&transaction("tx_2", 100)).await;
    assert_eq!(low.matched_rules().count(), 0);
    assert_eq!(low.rule_evaluations.len(), 1);
}

#[tokio::test]
async fn test_records_transactions_when_enabled() {
    let history = Arc::new(InMemoryTransactionHistory::new());
    let mut config = FraudConfig::default();
    config.detector.record_transactions = true;

    let detector = FraudDetectorBuilder::new()
        .with_config(config)
        .with_transaction_history(history.clone())
        .build()
        .await
        .unwrap();

    let assessment = detector.analyze_transaction(&transaction("tx_1", 25)).await;

    let records = history
        .find_transactions(&TransactionFilter::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "tx_1");
    assert_eq!(records[0].risk_score, Some(assessment.risk_score));
}

#[tokio::test]
async fn test_record_outcome() {
    let history = Arc::new(InMemoryTransactionHistory::new());
    let tx = transaction("tx_1", 25);
    history.add_transaction(&tx, TransactionStatus::Succeeded).await;

    let detector = FraudDetectorBuilder::new()
        .with_transaction_history(history.clone())
        .build()
        .await
        .unwrap();

    let updated = detector
        .record_outcome("user_1", TransactionOutcome::fraud("tx_1"))
        .await
        .unwrap();
    assert!(updated);

    let records = history
        .find_transactions(&TransactionFilter::default())
        .await
        .unwrap();
    assert!(records[0].flagged_fraud);

    let missing = detector
        .record_outcome("user_1", TransactionOutcome::legitimate("unknown"))
        .await
        .unwrap();
    assert!(!missing);
}

#[tokio::test]
async fn test_statistics() {
    let lists = Arc::new(ListService::new());
    lists.add(ListType::Blacklist, ListKind::User, "bad_user").await.unwrap();
    lists.add(ListType::Whitelist, ListKind::User, "good_user").await.unwrap();

    let detector = FraudDetectorBuilder::new()
        .with_list_checker(lists)
        .build()
        .await
        .unwrap();

    let bad = Transaction::new("tx_bad", Decimal::from(10), "USD").with_user("bad_user");
    let good = Transaction::new("tx_good", Decimal::from(10), "USD").with_user("good_user");
    detector.analyze_transaction(&bad).await;
    detector.analyze_transaction(&good).await;

    let stats = detector.statistics(7).await.unwrap();
    assert_eq!(stats.period_days, 7);
    assert_eq!(stats.total_assessments, 2);
    assert_eq!(stats.by_level.get("critical"), Some(&1));
    assert_eq!(stats.by_level.get("low"), Some(&1));
    assert_eq!(stats.by_recommendation.get("decline"), Some(&1));
    assert_eq!(stats.by_recommendation.get("allow"), Some(&1));
    assert_eq!(stats.average_score, 50.0);
    assert_eq!(stats.top_signals.len(), 2);
    assert!(stats.top_signals.iter().all(|s| s.count == 1));
}

#[tokio::test]
async fn test_statistics_empty() {
    let detector = FraudDetectorBuilder::new().build().await.unwrap();

    let stats = detector.statistics(30).await.unwrap();
    assert_eq!(stats.total_assessments, 0);
    assert_eq!(stats.average_score, 0.0);
    assert!(stats.top_signals.is_empty());
}
