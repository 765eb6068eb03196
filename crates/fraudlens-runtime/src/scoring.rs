//! Risk scoring
//!
//! Fuses signals and rule evaluations into a bounded 0-100 score, a risk
//! level and a recommendation.
//!
//! score = clamp(base + signals + rules + adjustments, 0, 100)
//!
//! - base: amount brackets, currency, account age and hour of day, capped
//! - signals: contribution x family weight x time decay x frequency boost
//! - rules: matched rule risk x rules weight
//! - adjustments: signal diversity, multiple strong rules, trusted user and
//!   merchant history

use crate::error::{Result, RuntimeError};
use chrono::{DateTime, Timelike, Utc};
use fraudlens_core::{Action, FraudRuleEvaluation, FraudSignal, RiskLevel, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lower bounds of each risk level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.0,
            medium: 50.0,
            high: 70.0,
            critical: 90.0,
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: RiskThresholds,
    /// Weight per signal family
    pub signal_weights: HashMap<String, f64>,
    /// Weight of families missing from `signal_weights`
    pub default_signal_weight: f64,
    /// Signals younger than this are not decayed
    pub time_decay_hours: f64,
    pub high_risk_currencies: Vec<String>,
    pub max_base_score: f64,
    /// Users with fewer prior transactions are new
    pub new_user_threshold: usize,
    /// Inclusive UTC hour range treated as late night
    pub late_night_start_hour: u32,
    pub late_night_end_hour: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let signal_weights = [
            ("velocity", 1.2),
            ("amount", 1.0),
            ("geolocation", 1.1),
            ("device", 0.9),
            ("behavioral", 0.8),
            ("blacklist", 1.5),
        ]
        .into_iter()
        .map(|(family, weight)| (family.to_string(), weight))
        .collect();

        Self {
            thresholds: RiskThresholds::default(),
            signal_weights,
            default_signal_weight: 1.0,
            time_decay_hours: 24.0,
            high_risk_currencies: ["BTC", "ETH", "XMR", "USDT"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_base_score: 30.0,
            new_user_threshold: 3,
            late_night_start_hour: 0,
            late_night_end_hour: 5,
        }
    }
}

impl ScoringConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(t.low >= 0.0 && t.low < t.medium && t.medium < t.high && t.high < t.critical && t.critical <= 100.0) {
            return Err(RuntimeError::InvalidConfig(format!(
                "risk thresholds must be strictly increasing within 0-100 (got {}/{}/{}/{})",
                t.low, t.medium, t.high, t.critical
            )));
        }
        if let Some((family, weight)) = self
            .signal_weights
            .iter()
            .find(|(_, w)| w.is_nan() || **w < 0.0)
        {
            return Err(RuntimeError::InvalidConfig(format!(
                "signal weight for '{}' must be non-negative (got {})",
                family, weight
            )));
        }
        if self.default_signal_weight.is_nan() || self.default_signal_weight < 0.0 {
            return Err(RuntimeError::InvalidConfig(
                "scoring.default_signal_weight must be non-negative".to_string(),
            ));
        }
        if self.time_decay_hours.is_nan() || self.time_decay_hours < 0.0 {
            return Err(RuntimeError::InvalidConfig(
                "scoring.time_decay_hours must be non-negative".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.max_base_score) {
            return Err(RuntimeError::InvalidConfig(
                "scoring.max_base_score must be within 0-100".to_string(),
            ));
        }
        if self.late_night_start_hour > 23 || self.late_night_end_hour > 23 {
            return Err(RuntimeError::InvalidConfig(
                "late night hours must be within 0-23".to_string(),
            ));
        }
        Ok(())
    }
}

/// Historical context gathered by the orchestrator before scoring
#[derive(Debug, Clone)]
pub struct ScoringContext {
    /// Prior transactions of the user, any status
    pub prior_transactions: usize,
    /// Risk scores of the user's prior assessments
    pub user_scores: Vec<f64>,
    /// Risk scores of the merchant's prior assessments
    pub merchant_scores: Vec<f64>,
    /// Occurrences of each signal type for the user in the last 24 hours
    pub signal_counts: HashMap<String, usize>,
    /// Instant signals are decayed against
    pub scored_at: DateTime<Utc>,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            prior_transactions: 0,
            user_scores: Vec::new(),
            merchant_scores: Vec::new(),
            signal_counts: HashMap::new(),
            scored_at: Utc::now(),
        }
    }
}

/// One bounded adjustment applied to the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    pub reason: String,
    pub delta: f64,
}

/// How a score was put together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub signal_score: f64,
    pub rule_score: f64,
    pub adjustments: Vec<ScoreAdjustment>,
    /// Sum before clamping
    pub raw_score: f64,
}

/// Scoring result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: f64,
    pub level: RiskLevel,
    pub recommendation: Action,
    pub breakdown: ScoreBreakdown,
}

/// Risk scorer
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
    rules_weight: f64,
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            rules_weight: 1.0,
        }
    }

    /// Weight applied to matched rule risk scores
    pub fn with_rules_weight(mut self, rules_weight: f64) -> Self {
        self.rules_weight = rules_weight;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a transaction
    pub fn score(
        &self,
        tx: &Transaction,
        signals: &[FraudSignal],
        evaluations: &[FraudRuleEvaluation],
        context: &ScoringContext,
    ) -> RiskScore {
        let base_score = self.base_score(tx, context);
        let signal_score = self.signal_score(signals, context);
        let rule_score = self.rule_score(evaluations);
        let adjustments = self.adjustments(signals, evaluations, context);

        let raw_score =
            base_score + signal_score + rule_score + adjustments.iter().map(|a| a.delta).sum::<f64>();
        let score = if raw_score.is_nan() {
            0.0
        } else {
            raw_score.clamp(0.0, 100.0)
        };

        let level = self.risk_level(score);
        let recommendation = self.recommendation(score, level, signals, evaluations);

        debug!(
            transaction_id = %tx.id,
            base_score,
            signal_score,
            rule_score,
            score,
            level = %level,
            recommendation = %recommendation,
            "Scored transaction"
        );

        RiskScore {
            score,
            level,
            recommendation,
            breakdown: ScoreBreakdown {
                base_score,
                signal_score,
                rule_score,
                adjustments,
                raw_score,
            },
        }
    }

    /// Transaction-intrinsic score, capped at `max_base_score`
    pub fn base_score(&self, tx: &Transaction, context: &ScoringContext) -> f64 {
        let mut score = 0.0;
        let amount = tx.amount_f64();

        if amount >= 10_000.0 {
            score += 15.0;
        } else if amount >= 5_000.0 {
            score += 10.0;
        } else if amount >= 1_000.0 {
            score += 5.0;
        }

        if self
            .config
            .high_risk_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&tx.currency))
        {
            score += 10.0;
        }

        if tx.user_id.is_some() {
            if context.prior_transactions == 0 {
                score += 15.0;
            } else if context.prior_transactions < self.config.new_user_threshold {
                score += 8.0;
            }
        }

        if self.is_late_night(tx.created_at.hour()) {
            score += 5.0;
        }

        f64::min(score, self.config.max_base_score)
    }

    /// Weight of a signal family
    /// True if the UTC hour falls in the late-night range, which may wrap
    /// past midnight (e.g. 22 to 4)
    pub fn is_late_night(&self, hour: u32) -> bool {
        let (start, end) = (self.config.late_night_start_hour, self.config.late_night_end_hour);
        if start <= end {
            (start..=end).contains(&hour)
        } else {
            hour >= start || hour <= end
        }
    }

    pub fn signal_weight(&self, family: &str) -> f64 {
        self.config
            .signal_weights
            .get(family)
            .copied()
            .unwrap_or(self.config.default_signal_weight)
    }

    /// 1 within `time_decay_hours`, then 0.1 less per excess hour, floored at 0.5
    pub fn time_decay(&self, signal: &FraudSignal, scored_at: DateTime<Utc>) -> f64 {
        let age_hours = (scored_at - signal.detected_at).num_seconds() as f64 / 3600.0;
        if age_hours <= self.config.time_decay_hours {
            1.0
        } else {
            f64::max(0.5, 1.0 - 0.1 * (age_hours - self.config.time_decay_hours))
        }
    }

    /// Boost for signal types the user triggered recently, positive signals only
    pub fn frequency_boost(&self, signal: &FraudSignal, context: &ScoringContext) -> f64 {
        if signal.risk_contribution <= 0.0 {
            return 1.0;
        }
        let occurrences = context
            .signal_counts
            .get(&signal.signal_type)
            .copied()
            .unwrap_or(0);
        f64::min(2.0, 1.0 + 0.2 * occurrences as f64)
    }

    /// Weighted sum of signal contributions
    pub fn signal_score(&self, signals: &[FraudSignal], context: &ScoringContext) -> f64 {
        signals
            .iter()
            .map(|signal| {
                signal.risk_contribution
                    * self.signal_weight(signal.family())
                    * self.time_decay(signal, context.scored_at)
                    * self.frequency_boost(signal, context)
            })
            .sum()
    }

    /// Weighted sum of matched rule risk scores
    pub fn rule_score(&self, evaluations: &[FraudRuleEvaluation]) -> f64 {
        evaluations
            .iter()
            .filter(|e| e.matched)
            .map(|e| e.risk_score * self.rules_weight)
            .sum()
    }

    /// Bounded adjustments
    pub fn adjustments(
        &self,
        signals: &[FraudSignal],
        evaluations: &[FraudRuleEvaluation],
        context: &ScoringContext,
    ) -> Vec<ScoreAdjustment> {
        let mut adjustments = Vec::new();

        let families: HashSet<&str> = signals
            .iter()
            .filter(|s| s.risk_contribution > 0.0)
            .map(FraudSignal::family)
            .collect();
        if families.len() >= 3 {
            adjustments.push(ScoreAdjustment {
                reason: format!("signals from {} families", families.len()),
                delta: 10.0,
            });
        }

        let strong_rules = evaluations
            .iter()
            .filter(|e| e.matched && e.risk_score >= 30.0)
            .count();
        if strong_rules >= 2 {
            adjustments.push(ScoreAdjustment {
                reason: format!("{} high-risk rules matched", strong_rules),
                delta: 15.0,
            });
        }

        if context.user_scores.len() >= 10 && mean(&context.user_scores) < 20.0 {
            adjustments.push(ScoreAdjustment {
                reason: "user has a low-risk history".to_string(),
                delta: -5.0,
            });
        }

        if context.merchant_scores.len() >= 10 && mean(&context.merchant_scores) < 25.0 {
            adjustments.push(ScoreAdjustment {
                reason: "merchant has a low-risk history".to_string(),
                delta: -3.0,
            });
        }

        adjustments
    }

    /// Risk level for a clamped score
    pub fn risk_level(&self, score: f64) -> RiskLevel {
        let t = &self.config.thresholds;
        if score >= t.critical {
            RiskLevel::Critical
        } else if score >= t.high {
            RiskLevel::High
        } else if score >= t.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Recommendation for a scored transaction
    pub fn recommendation(
        &self,
        score: f64,
        level: RiskLevel,
        signals: &[FraudSignal],
        evaluations: &[FraudRuleEvaluation],
    ) -> Action {
        let matched = |action: Action| evaluations.iter().any(|e| e.matched && e.action == action);

        let decided = if matched(Action::Decline) {
            Action::Decline
        } else if matched(Action::Review) && level != RiskLevel::Low {
            Action::Review
        } else if signals.iter().any(|s| s.family() == "blacklist") {
            Action::Decline
        } else {
            match level {
                RiskLevel::Critical => Action::Decline,
                RiskLevel::High if score >= 80.0 => Action::Decline,
                RiskLevel::High => Action::Review,
                RiskLevel::Medium if score >= 60.0 => Action::Review,
                RiskLevel::Medium => Action::Challenge,
                RiskLevel::Low => Action::Allow,
            }
        };

        match decided {
            Action::Allow | Action::Challenge if matched(Action::StepUpAuth) => Action::StepUpAuth,
            Action::Allow if matched(Action::Challenge) => Action::Challenge,
            other => other,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fraudlens_core::FraudRule;
    use rust_decimal::Decimal;

    fn scorer() -> RiskScorer {
        RiskScorer::new(ScoringConfig::default())
    }

    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
    }

    fn tx(amount: i64, currency: &str) -> Transaction {
        Transaction::new("t", Decimal::from(amount), currency).at(midday())
    }

    fn context() -> ScoringContext {
        ScoringContext {
            scored_at: midday(),
            ..Default::default()
        }
    }

    fn signal(signal_type: &str, risk: f64) -> FraudSignal {
        FraudSignal::new(signal_type, risk, "test").detected_at(midday())
    }

    fn evaluation(id: &str, action: Action, risk: f64, matched: bool) -> FraudRuleEvaluation {
        let rule = FraudRule::new(id, id, action, risk);
        if matched {
            FraudRuleEvaluation::matched(&rule, Vec::new())
        } else {
            FraudRuleEvaluation::unmatched(&rule, Vec::new())
        }
    }

    #[test]
    fn test_base_score() {
        let s = scorer();
        let ctx = ScoringContext {
            prior_transactions: 5,
            ..context()
        };
        assert_eq!(s.base_score(&tx(500, "USD"), &ctx), 0.0);
        assert_eq!(s.base_score(&tx(1000, "USD"), &ctx), 5.0);
        assert_eq!(s.base_score(&tx(5000, "USD"), &ctx), 10.0);
        assert_eq!(s.base_score(&tx(10000, "ETH"), &ctx), 25.0);

        let first = tx(10000, "BTC").with_user("u1");
        // 15 + 10 + 15 capped at 30
        assert_eq!(s.base_score(&first, &context()), 30.0);

        let new_user = tx(10, "USD").with_user("u1");
        let ctx = ScoringContext {
            prior_transactions: 2,
            ..context()
        };
        assert_eq!(s.base_score(&new_user, &ctx), 8.0);

        let night = tx(10, "USD").at(Utc.with_ymd_and_hms(2024, 3, 14, 3, 30, 0).unwrap());
        assert_eq!(s.base_score(&night, &context()), 5.0);
    }

    #[test]
    fn test_late_night_range_wraps_midnight() {
        let s = RiskScorer::new(ScoringConfig {
            late_night_start_hour: 22,
            late_night_end_hour: 4,
            ..ScoringConfig::default()
        });
        assert!(s.is_late_night(23));
        assert!(s.is_late_night(0));
        assert!(s.is_late_night(4));
        assert!(!s.is_late_night(5));
        assert!(!s.is_late_night(21));

        let night = tx(10, "USD").at(Utc.with_ymd_and_hms(2024, 3, 14, 23, 15, 0).unwrap());
        assert_eq!(s.base_score(&night, &context()), 5.0);

        assert!(scorer().is_late_night(0));
        assert!(!scorer().is_late_night(6));
    }

    #[test]
    fn test_signal_weights_and_modifiers() {
        let s = scorer();
        let ctx = context();
        assert!((s.signal_score(&[signal("velocity_burst", 30.0)], &ctx) - 36.0).abs() < 1e-9);
        assert!((s.signal_score(&[signal("geo_vpn", 10.0)], &ctx) - 11.0).abs() < 1e-9);
        assert!((s.signal_score(&[signal("custom_thing", 10.0)], &ctx) - 10.0).abs() < 1e-9);

        // 29 hours old: 5 excess hours
        let old = signal("amount_high", 10.0).detected_at(midday() - Duration::hours(29));
        assert!((s.time_decay(&old, midday()) - 0.5).abs() < 1e-9);
        let older = signal("amount_high", 10.0).detected_at(midday() - Duration::hours(26));
        assert!((s.time_decay(&older, midday()) - 0.8).abs() < 1e-9);

        let ctx = ScoringContext {
            signal_counts: [("amount_high".to_string(), 2), ("geolocation_country_whitelisted".to_string(), 9)]
                .into_iter()
                .collect(),
            ..context()
        };
        assert!((s.frequency_boost(&signal("amount_high", 10.0), &ctx) - 1.4).abs() < 1e-9);
        // Negative contributions are never boosted
        assert_eq!(s.frequency_boost(&signal("geolocation_country_whitelisted", -10.0), &ctx), 1.0);

        let capped = ScoringContext {
            signal_counts: [("amount_high".to_string(), 10)].into_iter().collect(),
            ..context()
        };
        assert_eq!(s.frequency_boost(&signal("amount_high", 10.0), &capped), 2.0);
    }

    #[test]
    fn test_score_is_clamped() {
        let s = scorer();
        let huge: Vec<FraudSignal> = (0..20).map(|_| signal("velocity_violation", 50.0)).collect();
        let result = s.score(&tx(10, "USD"), &huge, &[], &context());
        assert_eq!(result.score, 100.0);
        assert_eq!(result.level, RiskLevel::Critical);
        assert!(result.breakdown.raw_score > 100.0);

        let negative: Vec<FraudSignal> = (0..20)
            .map(|_| signal("geolocation_country_whitelisted", -10.0))
            .collect();
        let result = s.score(&tx(10, "USD"), &negative, &[], &context());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.recommendation, Action::Allow);
    }

    #[test]
    fn test_adjustments() {
        let s = scorer();
        let signals = vec![
            signal("velocity_burst", 5.0),
            signal("amount_high", 5.0),
            signal("device_shared", 5.0),
        ];
        let evals = vec![
            evaluation("a", Action::Review, 30.0, true),
            evaluation("b", Action::Review, 40.0, true),
            evaluation("c", Action::Review, 90.0, false),
        ];
        let ctx = ScoringContext {
            user_scores: vec![10.0; 10],
            merchant_scores: vec![20.0; 12],
            ..context()
        };
        let deltas: Vec<f64> = s.adjustments(&signals, &evals, &ctx).iter().map(|a| a.delta).collect();
        assert_eq!(deltas, vec![10.0, 15.0, -5.0, -3.0]);

        let short_history = ScoringContext {
            user_scores: vec![10.0; 9],
            ..context()
        };
        assert!(s.adjustments(&[], &[], &short_history).is_empty());
    }

    #[test]
    fn test_risk_levels() {
        let s = scorer();
        assert_eq!(s.risk_level(0.0), RiskLevel::Low);
        assert_eq!(s.risk_level(49.9), RiskLevel::Low);
        assert_eq!(s.risk_level(50.0), RiskLevel::Medium);
        assert_eq!(s.risk_level(70.0), RiskLevel::High);
        assert_eq!(s.risk_level(90.0), RiskLevel::Critical);
    }

    #[test]
    fn test_recommendation_precedence() {
        let s = scorer();
        let decline = evaluation("d", Action::Decline, 10.0, true);
        let review = evaluation("r", Action::Review, 10.0, true);
        let step_up = evaluation("s", Action::StepUpAuth, 10.0, true);
        let challenge = evaluation("c", Action::Challenge, 10.0, true);

        assert_eq!(s.recommendation(5.0, RiskLevel::Low, &[], &[decline.clone()]), Action::Decline);
        assert_eq!(s.recommendation(55.0, RiskLevel::Medium, &[], &[review.clone()]), Action::Review);
        // Review rules only apply above low risk
        assert_eq!(s.recommendation(5.0, RiskLevel::Low, &[], &[review]), Action::Allow);
        assert_eq!(
            s.recommendation(5.0, RiskLevel::Low, &[signal("blacklist", 100.0)], &[]),
            Action::Decline
        );

        assert_eq!(s.recommendation(95.0, RiskLevel::Critical, &[], &[]), Action::Decline);
        assert_eq!(s.recommendation(85.0, RiskLevel::High, &[], &[]), Action::Decline);
        assert_eq!(s.recommendation(75.0, RiskLevel::High, &[], &[]), Action::Review);
        assert_eq!(s.recommendation(65.0, RiskLevel::Medium, &[], &[]), Action::Review);
        assert_eq!(s.recommendation(55.0, RiskLevel::Medium, &[], &[]), Action::Challenge);

        assert_eq!(s.recommendation(5.0, RiskLevel::Low, &[], &[challenge.clone()]), Action::Challenge);
        assert_eq!(s.recommendation(55.0, RiskLevel::Medium, &[], &[step_up.clone()]), Action::StepUpAuth);
        assert_eq!(s.recommendation(5.0, RiskLevel::Low, &[], &[challenge, step_up.clone()]), Action::StepUpAuth);
        // Review results are not downgraded
        assert_eq!(s.recommendation(75.0, RiskLevel::High, &[], &[step_up]), Action::Review);
    }

    #[test]
    fn test_rule_score_and_breakdown() {
        let s = scorer().with_rules_weight(0.5);
        let evals = vec![
            evaluation("a", Action::Review, 40.0, true),
            evaluation("b", Action::Review, 60.0, false),
        ];
        let result = s.score(&tx(10, "USD"), &[signal("amount_elevated", 10.0)], &evals, &context());
        assert_eq!(result.breakdown.rule_score, 20.0);
        assert_eq!(result.breakdown.signal_score, 10.0);
        assert_eq!(result.score, 30.0);
        assert_eq!(result.level, RiskLevel::Low);
        assert_eq!(result.recommendation, Action::Allow);
    }

    #[test]
    fn test_config_validation() {
        assert!(ScoringConfig::default().validate().is_ok());

        let mut config = ScoringConfig::default();
        config.thresholds.high = 95.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.signal_weights.insert("velocity".to_string(), -1.0);
        assert!(config.validate().is_err());
    }
}
