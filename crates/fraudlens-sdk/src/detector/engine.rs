//! Core FraudDetector implementation

use super::types::{DetectorStatistics, SignalCount, TransactionOutcome};
use crate::config::FraudConfig;
use crate::error::{Result, SdkError};
use chrono::{Duration as ChronoDuration, Utc};
use fraudlens_core::{
    Action, FraudAssessment, FraudSignal, RiskLevel, Transaction, TransactionStatus,
    TransactionSummary,
};
use fraudlens_runtime::observability::metrics::{
    ASSESSMENT_ERRORS, BLACKLIST_HITS, WHITELIST_HITS,
};
use fraudlens_runtime::{
    AmountAnalyzer, AssessmentStore, BehavioralProfiler, DeviceAnalyzer, GeolocationAnalyzer,
    HistoryDimension, ListCheckResult, ListChecker, Metrics, MetricsCollector, RiskScorer,
    RuleStatistics, RulesEngine, ScoringContext, TransactionFilter, TransactionHistory,
    VelocityChecker,
};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Signal types returned in [`DetectorStatistics::top_signals`]
const TOP_SIGNALS: usize = 10;

/// Fraud assessment orchestrator
///
/// Built with [`crate::FraudDetectorBuilder`]. Safe to share between tasks;
/// every assessment is independent.
pub struct FraudDetector {
    pub(crate) config: FraudConfig,
    pub(crate) rules: RulesEngine,
    pub(crate) velocity: VelocityChecker,
    pub(crate) amount: AmountAnalyzer,
    pub(crate) geolocation: GeolocationAnalyzer,
    pub(crate) device: DeviceAnalyzer,
    pub(crate) behavioral: BehavioralProfiler,
    pub(crate) scorer: RiskScorer,
    pub(crate) history: Arc<dyn TransactionHistory>,
    pub(crate) assessments: Arc<dyn AssessmentStore>,
    pub(crate) lists: Arc<dyn ListChecker>,
    pub(crate) metrics: Arc<MetricsCollector>,
}

impl FraudDetector {
    /// Assess a transaction.
    ///
    /// Never fails: when the assessment cannot be completed the result is a
    /// medium-risk `review` carrying an `analysis_error` signal.
    pub async fn analyze_transaction(&self, tx: &Transaction) -> FraudAssessment {
        let started = Instant::now();

        let assessment = match self.assess(tx).await {
            Ok(assessment) => assessment,
            Err(e) => {
                tracing::error!(
                    transaction_id = %tx.id,
                    error = %e,
                    "Fraud analysis failed, returning fallback assessment"
                );
                self.metrics.counter(ASSESSMENT_ERRORS).inc();
                self.analysis_error(tx, &e)
            }
        };

        if self.config.detector.record_assessments {
            if let Err(e) = self.assessments.record_assessment(&assessment).await {
                tracing::warn!(
                    transaction_id = %tx.id,
                    error = %e,
                    "Failed to store assessment"
                );
            }
        }

        if self.config.detector.record_transactions {
            self.record_transaction(tx, &assessment).await;
        }

        self.metrics.record_assessment(
            assessment.risk_level,
            assessment.recommendation,
            started.elapsed(),
        );

        tracing::info!(
            transaction_id = %tx.id,
            risk_score = assessment.risk_score,
            risk_level = %assessment.risk_level,
            recommendation = %assessment.recommendation,
            signals = assessment.signals.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transaction assessed"
        );

        assessment
    }

    /// Record the confirmed outcome of an assessed transaction.
    ///
    /// Returns false if the transaction is not in the history. The user's
    /// cached behavioral profile is dropped either way.
    pub async fn record_outcome(&self, user_id: &str, outcome: TransactionOutcome) -> Result<bool> {
        let updated = self
            .history
            .set_fraud_flag(&outcome.transaction_id, outcome.is_fraud)
            .await?;
        self.behavioral.invalidate(user_id);

        tracing::info!(
            user_id,
            transaction_id = %outcome.transaction_id,
            is_fraud = outcome.is_fraud,
            updated,
            "Recorded transaction outcome"
        );
        Ok(updated)
    }

    /// Aggregate the assessments of the last `days` days
    pub async fn statistics(&self, days: u32) -> Result<DetectorStatistics> {
        let since = Utc::now() - ChronoDuration::days(i64::from(days));
        let assessments = self.assessments.assessments_since(since).await?;

        let mut by_level: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_recommendation: BTreeMap<String, usize> = BTreeMap::new();
        let mut signal_counts: HashMap<&str, usize> = HashMap::new();
        for assessment in &assessments {
            *by_level.entry(assessment.risk_level.to_string()).or_default() += 1;
            *by_recommendation
                .entry(assessment.recommendation.to_string())
                .or_default() += 1;
            for signal in &assessment.signals {
                *signal_counts.entry(signal.signal_type.as_str()).or_default() += 1;
            }
        }

        let mut top_signals: Vec<SignalCount> = signal_counts
            .into_iter()
            .map(|(signal_type, count)| SignalCount {
                signal_type: signal_type.to_string(),
                count,
            })
            .collect();
        top_signals.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.signal_type.cmp(&b.signal_type))
        });
        top_signals.truncate(TOP_SIGNALS);

        let average_score = if assessments.is_empty() {
            0.0
        } else {
            assessments.iter().map(|a| a.risk_score).sum::<f64>() / assessments.len() as f64
        };

        Ok(DetectorStatistics {
            period_days: days,
            total_assessments: assessments.len(),
            by_level,
            by_recommendation,
            average_score,
            top_signals,
        })
    }

    /// Per-rule hit counts over the last `days` days
    pub async fn rule_statistics(&self, days: u32) -> Result<Vec<RuleStatistics>> {
        Ok(self.rules.rule_statistics(days).await?)
    }

    /// Rules engine, for rule management and dry runs
    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    /// Behavioral profiler, for profile inspection
    pub fn profiler(&self) -> &BehavioralProfiler {
        &self.behavioral
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn config(&self) -> &FraudConfig {
        &self.config
    }

    async fn assess(&self, tx: &Transaction) -> Result<FraudAssessment> {
        validate_transaction(tx)?;

        // Blacklist first so a blacklist hit wins over any whitelist entry
        match self.lists.check_blacklist(tx).await {
            Ok(result) if result.matched => {
                self.metrics.counter(BLACKLIST_HITS).inc();
                return Ok(self.blacklisted(tx, &result));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(
                transaction_id = %tx.id,
                error = %e,
                "Blacklist check failed"
            ),
        }

        match self.lists.check_whitelist(tx).await {
            Ok(result) if result.matched => {
                self.metrics.counter(WHITELIST_HITS).inc();
                return Ok(self.whitelisted(tx, &result));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(
                transaction_id = %tx.id,
                error = %e,
                "Whitelist check failed"
            ),
        }

        let (velocity, geolocation, device, behavioral, evaluations, context) = tokio::join!(
            self.guarded("velocity", self.velocity.analyze(tx)),
            self.guarded("geolocation", self.geolocation.analyze(tx)),
            self.guarded("device", self.device.analyze(tx)),
            self.guarded("behavioral", self.behavioral.generate_signals(tx)),
            self.guarded("rules", self.rules.evaluate_rules(tx)),
            self.scoring_context(tx),
        );

        let device = device.unwrap_or_default();
        let mut signals: Vec<FraudSignal> = Vec::new();
        signals.extend(velocity.unwrap_or_default());
        signals.extend(self.amount.analyze(tx));
        signals.extend(geolocation.unwrap_or_default());
        signals.extend(device.signals);
        signals.extend(behavioral.unwrap_or_default());
        let evaluations = evaluations.unwrap_or_default();

        tracing::debug!(
            transaction_id = %tx.id,
            signals = signals.len(),
            matched_rules = evaluations.iter().filter(|e| e.matched).count(),
            "Collected fraud evidence"
        );

        let risk = self.scorer.score(tx, &signals, &evaluations, &context);

        Ok(FraudAssessment {
            risk_score: risk.score,
            risk_level: risk.level,
            recommendation: risk.recommendation,
            rule_evaluations: evaluations,
            signals,
            device_fingerprint: device.fingerprint,
            ..base_assessment(tx)
        })
    }

    /// Run one generator within the time budget, degrading to no output
    async fn guarded<T, F>(&self, generator: &'static str, future: F) -> Option<T>
    where
        F: Future<Output = fraudlens_runtime::Result<T>>,
    {
        let budget = self.config.detector.generator_timeout();
        match tokio::time::timeout(budget, future).await {
            Ok(Ok(output)) => Some(output),
            Ok(Err(e)) => {
                tracing::warn!(generator, error = %e, "Signal generator failed");
                self.metrics.record_generator_failure(generator);
                None
            }
            Err(_) => {
                tracing::warn!(
                    generator,
                    timeout_ms = self.config.detector.generator_timeout_ms,
                    "Signal generator timed out"
                );
                self.metrics.record_generator_failure(generator);
                None
            }
        }
    }

    /// Gather prior history for the scorer. Missing history only loses precision.
    async fn scoring_context(&self, tx: &Transaction) -> ScoringContext {
        let mut context = ScoringContext::default();
        let detector = &self.config.detector;

        if let Some(user_id) = tx.user_id.as_deref() {
            let filter = TransactionFilter::for_dimension(HistoryDimension::User(user_id.to_string()))
                .excluding(tx.id.clone());
            match self.history.count_transactions(&filter).await {
                Ok(count) => context.prior_transactions = count,
                Err(e) => tracing::warn!(user_id, error = %e, "Failed to count prior transactions"),
            }

            match self
                .assessments
                .user_assessments(user_id, detector.user_history_limit)
                .await
            {
                Ok(prior) => context.user_scores = prior.iter().map(|a| a.risk_score).collect(),
                Err(e) => tracing::warn!(user_id, error = %e, "Failed to load user assessments"),
            }

            let since = context.scored_at
                - ChronoDuration::hours(i64::from(detector.signal_frequency_window_hours));
            match self.assessments.signal_counts(user_id, since).await {
                Ok(counts) => context.signal_counts = counts,
                Err(e) => tracing::warn!(user_id, error = %e, "Failed to load signal counts"),
            }
        }

        if let Some(merchant_id) = tx.metadata.merchant_id.as_deref() {
            match self
                .assessments
                .merchant_assessments(merchant_id, detector.merchant_history_limit)
                .await
            {
                Ok(prior) => {
                    context.merchant_scores = prior.iter().map(|a| a.risk_score).collect()
                }
                Err(e) => {
                    tracing::warn!(merchant_id, error = %e, "Failed to load merchant assessments")
                }
            }
        }

        context
    }

    fn blacklisted(&self, tx: &Transaction, result: &ListCheckResult) -> FraudAssessment {
        let matched = result.describe();
        tracing::info!(transaction_id = %tx.id, lists = %matched, "Blacklist match");

        FraudAssessment {
            risk_score: 100.0,
            risk_level: RiskLevel::Critical,
            recommendation: Action::Decline,
            signals: vec![FraudSignal::new(
                "blacklist",
                100.0,
                format!("Transaction matches blacklist: {}", matched),
            )
            .with_value(matched)],
            ..base_assessment(tx)
        }
    }

    fn whitelisted(&self, tx: &Transaction, result: &ListCheckResult) -> FraudAssessment {
        let matched = result.describe();
        tracing::debug!(transaction_id = %tx.id, lists = %matched, "Whitelist match");

        FraudAssessment {
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            recommendation: Action::Allow,
            signals: vec![FraudSignal::new(
                "whitelist",
                0.0,
                format!("Transaction matches whitelist: {}", matched),
            )
            .with_value(matched)],
            ..base_assessment(tx)
        }
    }

    fn analysis_error(&self, tx: &Transaction, error: &SdkError) -> FraudAssessment {
        let score = self.scorer.config().thresholds.medium;
        FraudAssessment {
            risk_score: score,
            risk_level: self.scorer.risk_level(score),
            recommendation: Action::Review,
            signals: vec![FraudSignal::new(
                "analysis_error",
                score,
                format!("Fraud analysis could not be completed: {}", error),
            )],
            ..base_assessment(tx)
        }
    }

    async fn record_transaction(&self, tx: &Transaction, assessment: &FraudAssessment) {
        let status = match assessment.recommendation {
            Action::Allow | Action::Challenge | Action::StepUpAuth => TransactionStatus::Succeeded,
            Action::Review => TransactionStatus::Pending,
            Action::Decline => TransactionStatus::Failed,
        };
        let mut summary = TransactionSummary::from_transaction(tx, status);
        summary.risk_score = Some(assessment.risk_score);
        if summary.device_fingerprint.is_none() {
            summary.device_fingerprint = assessment.device_fingerprint.clone();
        }

        if let Err(e) = self.history.record_transaction(summary).await {
            tracing::warn!(transaction_id = %tx.id, error = %e, "Failed to record transaction");
        }
    }
}

/// Assessment skeleton with the transaction identity filled in
fn base_assessment(tx: &Transaction) -> FraudAssessment {
    FraudAssessment {
        id: uuid::Uuid::new_v4().to_string(),
        transaction_id: tx.id.clone(),
        user_id: tx.user_id.clone(),
        merchant_id: tx.metadata.merchant_id.clone(),
        risk_score: 0.0,
        risk_level: RiskLevel::Low,
        recommendation: Action::Allow,
        rule_evaluations: Vec::new(),
        signals: Vec::new(),
        device_fingerprint: tx.metadata.device_fingerprint.clone(),
        ip_address: tx.metadata.ip_address.clone(),
        geolocation: tx.metadata.geolocation.clone(),
        assessed_at: Utc::now(),
    }
}

fn validate_transaction(tx: &Transaction) -> Result<()> {
    tx.validate()
        .map_err(|e| SdkError::InvalidTransaction(e.to_string()))
}
