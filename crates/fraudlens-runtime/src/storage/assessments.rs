//! Prior assessment collaborator

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fraudlens_core::FraudAssessment;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Store of completed assessments
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Persist an assessment
    async fn record_assessment(&self, assessment: &FraudAssessment) -> Result<()>;

    /// Most recent assessments for a user, newest first
    async fn user_assessments(&self, user_id: &str, limit: usize) -> Result<Vec<FraudAssessment>>;

    /// Most recent assessments for a merchant, newest first
    async fn merchant_assessments(
        &self,
        merchant_id: &str,
        limit: usize,
    ) -> Result<Vec<FraudAssessment>>;

    /// Occurrences of each signal type in the user's assessments since `since`
    async fn signal_counts(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, usize>>;

    /// All assessments made at or after `since`
    async fn assessments_since(&self, since: DateTime<Utc>) -> Result<Vec<FraudAssessment>>;
}

/// In-memory assessment store
#[derive(Default)]
pub struct InMemoryAssessmentStore {
    assessments: RwLock<Vec<FraudAssessment>>,
}

impl InMemoryAssessmentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assessments
    pub async fn len(&self) -> usize {
        self.assessments.read().await.len()
    }

    /// Returns true if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.assessments.read().await.is_empty()
    }

    async fn newest_matching<F>(&self, limit: usize, predicate: F) -> Vec<FraudAssessment>
    where
        F: Fn(&FraudAssessment) -> bool,
    {
        let assessments = self.assessments.read().await;
        let mut found: Vec<FraudAssessment> =
            assessments.iter().filter(|a| predicate(a)).cloned().collect();
        found.sort_by(|a, b| b.assessed_at.cmp(&a.assessed_at));
        found.truncate(limit);
        found
    }
}

#[async_trait]
impl AssessmentStore for InMemoryAssessmentStore {
    async fn record_assessment(&self, assessment: &FraudAssessment) -> Result<()> {
        self.assessments.write().await.push(assessment.clone());
        Ok(())
    }

    async fn user_assessments(&self, user_id: &str, limit: usize) -> Result<Vec<FraudAssessment>> {
        Ok(self
            .newest_matching(limit, |a| a.user_id.as_deref() == Some(user_id))
            .await)
    }

    async fn merchant_assessments(
        &self,
        merchant_id: &str,
        limit: usize,
    ) -> Result<Vec<FraudAssessment>> {
        Ok(self
            .newest_matching(limit, |a| a.merchant_id.as_deref() == Some(merchant_id))
            .await)
    }

    async fn signal_counts(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, usize>> {
        let assessments = self.assessments.read().await;
        let mut counts = HashMap::new();

        for assessment in assessments
            .iter()
            .filter(|a| a.user_id.as_deref() == Some(user_id) && a.assessed_at >= since)
        {
            for signal in &assessment.signals {
                *counts.entry(signal.signal_type.clone()).or_insert(0) += 1;
            }
        }

        Ok(counts)
    }

    async fn assessments_since(&self, since: DateTime<Utc>) -> Result<Vec<FraudAssessment>> {
        let assessments = self.assessments.read().await;
        Ok(assessments
            .iter()
            .filter(|a| a.assessed_at >= since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fraudlens_core::{Action, FraudSignal, RiskLevel};

    fn assessment(user: &str, score: f64, hours_ago: i64, signals: &[&str]) -> FraudAssessment {
        FraudAssessment {
            id: uuid::Uuid::new_v4().to_string(),
            transaction_id: "tx".to_string(),
            user_id: Some(user.to_string()),
            merchant_id: Some("m1".to_string()),
            risk_score: score,
            risk_level: RiskLevel::Low,
            recommendation: Action::Allow,
            rule_evaluations: Vec::new(),
            signals: signals
                .iter()
                .map(|s| FraudSignal::new(*s, 10.0, ""))
                .collect(),
            device_fingerprint: None,
            ip_address: None,
            geolocation: None,
            assessed_at: Utc::now() - Duration::hours(hours_ago),
        }
    }

    #[tokio::test]
    async fn test_signal_counts_window() {
        let store = InMemoryAssessmentStore::new();
        store
            .record_assessment(&assessment("alice", 10.0, 1, &["velocity_burst", "amount_high"]))
            .await
            .unwrap();
        store
            .record_assessment(&assessment("alice", 10.0, 2, &["velocity_burst"]))
            .await
            .unwrap();
        store
            .record_assessment(&assessment("alice", 10.0, 48, &["velocity_burst"]))
            .await
            .unwrap();
        store
            .record_assessment(&assessment("bob", 10.0, 1, &["velocity_burst"]))
            .await
            .unwrap();

        let counts = store
            .signal_counts("alice", Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(counts.get("velocity_burst"), Some(&2));
        assert_eq!(counts.get("amount_high"), Some(&1));
    }

    #[tokio::test]
    async fn test_user_and_merchant_history() {
        let store = InMemoryAssessmentStore::new();
        for i in 0..5 {
            store
                .record_assessment(&assessment("alice", i as f64, i, &[]))
                .await
                .unwrap();
        }

        let recent = store.user_assessments("alice", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].risk_score, 0.0);

        let merchant = store.merchant_assessments("m1", 10).await.unwrap();
        assert_eq!(merchant.len(), 5);
        assert!(store.user_assessments("bob", 10).await.unwrap().is_empty());
    }
}
