//! Behavioral profiling
//!
//! Builds a rolling statistical profile per user from successful
//! transactions, caches it, and scores how far a new transaction deviates
//! from it along six axes: amount, time of day/weekday, daily frequency,
//! location, device and payment method.

use crate::cache::TtlCache;
use crate::device::DeviceAnalyzer;
use crate::error::{Result, RuntimeError};
use crate::storage::{HistoryDimension, TransactionFilter, TransactionHistory};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc};
use fraudlens_core::{
    AnomalySeverity, BehavioralAnomaly, BehavioralProfile, DevicePatterns, FraudSignal, HourWindow,
    LocationPatterns, PaymentPatterns, RiskMetrics, RiskTrend, Transaction, TransactionPatterns,
    TransactionStatus, TransactionSummary, Value,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Risk trend dead band, in score points
const TREND_THRESHOLD: f64 = 5.0;

/// Behavioral profiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralConfig {
    /// Successful transactions needed to build a profile
    pub min_transactions_for_profile: usize,
    /// History window a profile is built from
    pub learning_period_days: u32,
    /// Profiles below this confidence only yield an insufficient-data signal
    pub min_confidence: f64,
    pub profile_cache_ttl_secs: u64,
    /// Amount / average ratio at which an amount is anomalous
    pub amount_ratio_threshold: f64,
    /// Daily count / average-per-day ratio at which frequency is anomalous
    pub frequency_ratio_threshold: f64,
}

impl Default for BehavioralConfig {
    fn default() -> Self {
        Self {
            min_transactions_for_profile: 5,
            learning_period_days: 90,
            min_confidence: 0.5,
            profile_cache_ttl_secs: 3600,
            amount_ratio_threshold: 3.0,
            frequency_ratio_threshold: 3.0,
        }
    }
}

impl BehavioralConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_transactions_for_profile == 0 {
            return Err(RuntimeError::InvalidConfig(
                "behavioral.min_transactions_for_profile must be positive".to_string(),
            ));
        }
        if self.learning_period_days == 0 {
            return Err(RuntimeError::InvalidConfig(
                "behavioral.learning_period_days must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(RuntimeError::InvalidConfig(
                "behavioral.min_confidence must be within 0-1".to_string(),
            ));
        }
        if !(self.amount_ratio_threshold > 1.0 && self.frequency_ratio_threshold > 1.0) {
            return Err(RuntimeError::InvalidConfig(
                "behavioral ratio thresholds must be greater than 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Behavioral profiler
pub struct BehavioralProfiler {
    history: Arc<dyn TransactionHistory>,
    config: BehavioralConfig,
    profiles: TtlCache<String, Option<Arc<BehavioralProfile>>>,
}

impl BehavioralProfiler {
    pub fn new(history: Arc<dyn TransactionHistory>, config: BehavioralConfig) -> Self {
        let ttl = Duration::from_secs(config.profile_cache_ttl_secs);
        Self {
            history,
            config,
            profiles: TtlCache::new(ttl),
        }
    }

    pub fn config(&self) -> &BehavioralConfig {
        &self.config
    }

    /// Build a fresh profile, bypassing the cache. `None` when the user has
    /// fewer than the minimum successful transactions in the learning period.
    pub async fn build_profile(&self, user_id: &str) -> Result<Option<BehavioralProfile>> {
        load_profile(self.history.as_ref(), &self.config, user_id, Utc::now()).await
    }

    /// Cached profile of a user
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Arc<BehavioralProfile>>> {
        let history = Arc::clone(&self.history);
        let config = self.config.clone();
        let user = user_id.to_string();

        self.profiles
            .get_or_compute(user_id.to_string(), || async move {
                let profile = load_profile(history.as_ref(), &config, &user, Utc::now()).await?;
                Ok::<_, RuntimeError>(profile.map(Arc::new))
            })
            .await
    }

    /// Drop a user's cached profile
    pub fn invalidate(&self, user_id: &str) {
        self.profiles.invalidate(&user_id.to_string());
        debug!(user_id = %user_id, "Invalidated behavioral profile");
    }

    /// Deviations of a transaction from a profile
    pub async fn detect_anomalies(
        &self,
        tx: &Transaction,
        profile: &BehavioralProfile,
    ) -> Vec<BehavioralAnomaly> {
        let mut anomalies = Vec::new();
        let confidence = profile.profile_confidence;

        anomalies.extend(self.amount_anomaly(tx, profile, confidence));
        anomalies.extend(time_anomaly(tx, profile, confidence));
        match self.frequency_anomaly(tx, profile, confidence).await {
            Ok(anomaly) => anomalies.extend(anomaly),
            Err(e) => warn!(user_id = %profile.user_id, error = %e, "Frequency history query failed"),
        }
        anomalies.extend(location_anomaly(tx, profile, confidence));
        anomalies.extend(device_anomaly(tx, profile, confidence));
        anomalies.extend(payment_method_anomaly(tx, profile, confidence));

        anomalies
    }

    /// Behavioral signals for a transaction
    pub async fn generate_signals(&self, tx: &Transaction) -> Result<Vec<FraudSignal>> {
        let Some(user_id) = tx.user_id.as_deref() else {
            return Ok(vec![insufficient_data("Transaction has no user")]);
        };

        let Some(profile) = self.get_profile(user_id).await? else {
            let filter = TransactionFilter::for_dimension(HistoryDimension::User(user_id.to_string()))
                .excluding(tx.id.clone());
            let prior = self.history.count_transactions(&filter).await?;
            if prior == 0 {
                return Ok(vec![FraudSignal::new(
                    "behavioral_first_transaction",
                    10.0,
                    "First transaction of this user",
                )]);
            }
            return Ok(vec![insufficient_data(format!(
                "Not enough successful transactions to profile user ({} on record)",
                prior
            ))]);
        };

        if profile.profile_confidence < self.config.min_confidence {
            return Ok(vec![insufficient_data(format!(
                "Profile confidence {:.2} is too low",
                profile.profile_confidence
            ))
            .with_value(profile.profile_confidence)]);
        }

        let signals: Vec<FraudSignal> = self
            .detect_anomalies(tx, &profile)
            .await
            .into_iter()
            .map(|anomaly| {
                FraudSignal::new(
                    format!("behavioral_{}", anomaly.anomaly_type),
                    anomaly.risk_contribution(),
                    anomaly.description.clone(),
                )
                .with_value(Value::object([
                    ("severity", Value::from(format!("{:?}", anomaly.severity).to_lowercase())),
                    ("deviation", Value::from(anomaly.deviation)),
                    ("expected", anomaly.expected),
                    ("observed", anomaly.observed),
                ]))
            })
            .collect();

        debug!(user_id = %user_id, count = signals.len(), "Behavioral analysis complete");
        Ok(signals)
    }

    fn amount_anomaly(
        &self,
        tx: &Transaction,
        profile: &BehavioralProfile,
        confidence: f64,
    ) -> Option<BehavioralAnomaly> {
        let patterns = &profile.transaction_patterns;
        let amount = tx.amount_f64();
        if patterns.average_amount <= 0.0 || patterns.common_amounts.iter().any(|a| (a - amount).abs() < 0.01) {
            return None;
        }

        let ratio = amount / patterns.average_amount;
        let threshold = self.config.amount_ratio_threshold;
        if ratio < threshold {
            return None;
        }

        let severity = if ratio >= threshold * 3.0 {
            AnomalySeverity::Critical
        } else if ratio >= threshold * 5.0 / 3.0 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };

        Some(BehavioralAnomaly {
            anomaly_type: "amount_anomaly".to_string(),
            severity,
            deviation: ratio / threshold,
            confidence,
            description: format!(
                "Amount {:.2} is {:.1}x the user's average of {:.2}",
                amount, ratio, patterns.average_amount
            ),
            expected: Value::from(patterns.average_amount),
            observed: Value::from(amount),
        })
    }

    async fn frequency_anomaly(
        &self,
        tx: &Transaction,
        profile: &BehavioralProfile,
        confidence: f64,
    ) -> Result<Option<BehavioralAnomaly>> {
        let average = profile.transaction_patterns.average_per_day;
        if average <= 0.0 {
            return Ok(None);
        }

        let filter = TransactionFilter::for_dimension(HistoryDimension::User(profile.user_id.clone()))
            .since(tx.created_at - ChronoDuration::hours(24))
            .with_statuses(&[TransactionStatus::Succeeded])
            .excluding(tx.id.clone());
        let today = self.history.count_transactions(&filter).await? + 1;

        let ratio = today as f64 / average;
        let threshold = self.config.frequency_ratio_threshold;
        if today < 3 || ratio < threshold {
            return Ok(None);
        }

        Ok(Some(BehavioralAnomaly {
            anomaly_type: "frequency_anomaly".to_string(),
            severity: if ratio >= threshold * 2.0 {
                AnomalySeverity::High
            } else {
                AnomalySeverity::Medium
            },
            deviation: ratio / threshold,
            confidence,
            description: format!(
                "{} transactions in 24h against an average of {:.1} per day",
                today, average
            ),
            expected: Value::from(average),
            observed: Value::from(today),
        }))
    }
}

fn insufficient_data(description: impl Into<String>) -> FraudSignal {
    FraudSignal::new("behavioral_insufficient_data", 5.0, description)
}

/// Load a user's successful transactions and build a profile from them
async fn load_profile(
    history: &dyn TransactionHistory,
    config: &BehavioralConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<BehavioralProfile>> {
    let since = now - ChronoDuration::days(i64::from(config.learning_period_days));
    let filter = TransactionFilter::for_dimension(HistoryDimension::User(user_id.to_string()))
        .since(since)
        .with_statuses(&[TransactionStatus::Succeeded]);

    let mut records = history.find_transactions(&filter).await?;
    if records.len() < config.min_transactions_for_profile {
        debug!(
            user_id = %user_id,
            count = records.len(),
            "Not enough transactions for a behavioral profile"
        );
        return Ok(None);
    }

    records.sort_by_key(|r| r.created_at);
    Ok(Some(build_from_records(user_id, &records, now)))
}

/// Build a profile from chronologically ordered records
pub fn build_from_records(
    user_id: &str,
    records: &[TransactionSummary],
    now: DateTime<Utc>,
) -> BehavioralProfile {
    let n = records.len();
    let span_days = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (last.created_at - first.created_at).num_seconds() as f64 / 86_400.0,
        _ => 0.0,
    };

    let location_patterns = location_patterns(records);
    let device_patterns = device_patterns(records);
    let has_location = !location_patterns.common_countries.is_empty();
    let has_device = !device_patterns.known_devices.is_empty();

    let confidence = (0.5 * (n as f64 / 20.0).min(1.0)
        + 0.3 * (span_days / 30.0).min(1.0)
        + if has_location { 0.1 } else { 0.0 }
        + if has_device { 0.1 } else { 0.0 })
    .min(1.0);

    BehavioralProfile {
        user_id: user_id.to_string(),
        transaction_patterns: transaction_patterns(records, span_days),
        payment_patterns: payment_patterns(records),
        location_patterns,
        device_patterns,
        risk_metrics: risk_metrics(records),
        profile_confidence: confidence,
        sample_size: n,
        last_updated: now,
    }
}

fn count_by<T, I>(items: I) -> HashMap<T, usize>
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

/// Up to `n` most frequent values, ties broken by value
fn top_n(counts: HashMap<String, usize>, n: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(value, _)| value).collect()
}

/// Share of consecutive values that differ
fn switch_rate(values: &[&str]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let switches = values.windows(2).filter(|w| w[0] != w[1]).count();
    switches as f64 / (values.len() - 1) as f64
}

/// Merge repeated hours into contiguous inclusive windows
fn hour_windows(hours: &BTreeMap<u32, usize>) -> Vec<HourWindow> {
    let mut windows: Vec<HourWindow> = Vec::new();
    for (&hour, _) in hours.iter().filter(|(_, &count)| count >= 2) {
        match windows.last_mut() {
            Some(window) if window.end + 1 == hour => window.end = hour,
            _ => windows.push(HourWindow { start: hour, end: hour }),
        }
    }
    windows
}

fn transaction_patterns(records: &[TransactionSummary], span_days: f64) -> TransactionPatterns {
    let n = records.len() as f64;
    let amounts: Vec<f64> = records.iter().map(TransactionSummary::amount_f64).collect();

    let mut common_amounts: Vec<f64> = count_by(records.iter().map(|r| r.amount.round_dp(2)))
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .filter_map(|(amount, _)| amount.to_f64())
        .collect();
    common_amounts.sort_by(|a, b| a.total_cmp(b));

    let mut hours = BTreeMap::new();
    for r in records {
        *hours.entry(r.created_at.hour()).or_insert(0) += 1;
    }

    let mut common_weekdays: Vec<u32> = count_by(records.iter().map(|r| r.created_at.weekday().num_days_from_monday()))
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .map(|(day, _)| day)
        .collect();
    common_weekdays.sort_unstable();

    let intervals: Vec<f64> = records
        .windows(2)
        .map(|w| (w[1].created_at - w[0].created_at).num_seconds() as f64 / 60.0)
        .collect();
    let average_interval_minutes = if intervals.is_empty() {
        0.0
    } else {
        intervals.iter().sum::<f64>() / intervals.len() as f64
    };

    TransactionPatterns {
        average_amount: if n > 0.0 { amounts.iter().sum::<f64>() / n } else { 0.0 },
        common_amounts,
        average_per_day: n / span_days.max(1.0),
        common_hours: hour_windows(&hours),
        common_weekdays,
        preferred_currencies: top_n(count_by(records.iter().map(|r| r.currency.to_uppercase())), 3),
        average_interval_minutes,
    }
}

fn payment_patterns(records: &[TransactionSummary]) -> PaymentPatterns {
    let methods: Vec<&str> = records.iter().filter_map(|r| r.payment_method_id.as_deref()).collect();
    let distinct: HashSet<&str> = methods.iter().copied().collect();

    PaymentPatterns {
        preferred_methods: top_n(count_by(methods.iter().map(|m| m.to_string())), 3),
        distinct_methods: distinct.len(),
        method_switch_rate: switch_rate(&methods),
    }
}

fn location_patterns(records: &[TransactionSummary]) -> LocationPatterns {
    let countries: Vec<&str> = records
        .iter()
        .filter_map(|r| r.country.as_deref())
        .filter(|c| !c.is_empty())
        .collect();
    let cities: Vec<&str> = records.iter().filter_map(|r| r.city.as_deref()).collect();

    let country_counts = count_by(countries.iter().map(|c| c.to_uppercase()));
    let location_stability = match country_counts.values().max() {
        Some(&max) => max as f64 / countries.len() as f64,
        None => 0.0,
    };

    LocationPatterns {
        common_countries: top_n(country_counts, 3),
        common_cities: top_n(count_by(cities.iter().map(|c| c.to_string())), 3),
        location_stability,
        country_switch_rate: switch_rate(&countries),
    }
}

fn device_patterns(records: &[TransactionSummary]) -> DevicePatterns {
    let devices: Vec<&str> = records.iter().filter_map(|r| r.device_fingerprint.as_deref()).collect();
    let counts = count_by(devices.iter().map(|d| d.to_string()));
    let distinct = counts.len();

    let primary = top_n(counts.clone(), 1).into_iter().next();
    let device_stability = primary
        .as_ref()
        .and_then(|p| counts.get(p))
        .map_or(0.0, |&c| c as f64 / devices.len() as f64);

    let mut known_devices: Vec<String> = counts.into_keys().collect();
    known_devices.sort();

    DevicePatterns {
        known_devices,
        primary_device: primary,
        device_stability,
        new_device_adoption_rate: if devices.is_empty() {
            0.0
        } else {
            distinct as f64 / devices.len() as f64
        },
    }
}

fn risk_metrics(records: &[TransactionSummary]) -> RiskMetrics {
    let scores: Vec<f64> = records.iter().filter_map(|r| r.risk_score).collect();
    let mean = |s: &[f64]| if s.is_empty() { 0.0 } else { s.iter().sum::<f64>() / s.len() as f64 };

    let risk_trend = if scores.len() >= 2 {
        let (first, second) = scores.split_at(scores.len() / 2);
        let delta = mean(second) - mean(first);
        if delta > TREND_THRESHOLD {
            RiskTrend::Increasing
        } else if delta < -TREND_THRESHOLD {
            RiskTrend::Decreasing
        } else {
            RiskTrend::Stable
        }
    } else {
        RiskTrend::Stable
    };

    let frauds: Vec<&TransactionSummary> = records.iter().filter(|r| r.flagged_fraud).collect();

    RiskMetrics {
        average_risk_score: mean(&scores),
        risk_trend,
        fraud_incidents: frauds.len(),
        last_fraud_at: frauds.iter().map(|r| r.created_at).max(),
    }
}

/// Circular distance in hours between two hours of day
fn hour_distance(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b);
    d.min(24 - d)
}

fn time_anomaly(tx: &Transaction, profile: &BehavioralProfile, confidence: f64) -> Option<BehavioralAnomaly> {
    let patterns = &profile.transaction_patterns;
    let hour = tx.created_at.hour();
    let weekday = tx.created_at.weekday().num_days_from_monday();

    let hour_gap = if patterns.common_hours.is_empty() || patterns.common_hours.iter().any(|w| w.contains(hour)) {
        0
    } else {
        patterns
            .common_hours
            .iter()
            .map(|w| hour_distance(hour, w.start).min(hour_distance(hour, w.end)))
            .min()
            .unwrap_or(0)
    };
    let weekday_mismatch = !patterns.common_weekdays.is_empty() && !patterns.common_weekdays.contains(&weekday);

    if hour_gap == 0 && !weekday_mismatch {
        return None;
    }

    let deviation = (hour_gap as f64 / 6.0).min(1.0) + if weekday_mismatch { 0.5 } else { 0.0 };
    let severity = if hour_gap >= 6 {
        AnomalySeverity::Medium
    } else {
        AnomalySeverity::Low
    };

    Some(BehavioralAnomaly {
        anomaly_type: "time_anomaly".to_string(),
        severity,
        deviation,
        confidence,
        description: format!(
            "Transaction at hour {} on weekday {} is outside the user's usual times",
            hour, weekday
        ),
        expected: Value::from(
            patterns
                .common_hours
                .iter()
                .map(|w| format!("{:02}-{:02}", w.start, w.end))
                .collect::<Vec<_>>(),
        ),
        observed: Value::from(hour),
    })
}

fn location_anomaly(tx: &Transaction, profile: &BehavioralProfile, confidence: f64) -> Option<BehavioralAnomaly> {
    let geo = tx.metadata.geolocation.as_ref()?;
    let patterns = &profile.location_patterns;

    if !geo.country.is_empty()
        && !patterns.common_countries.is_empty()
        && !patterns.common_countries.iter().any(|c| c.eq_ignore_ascii_case(&geo.country))
    {
        let stability = patterns.location_stability;
        return Some(BehavioralAnomaly {
            anomaly_type: "location_anomaly".to_string(),
            severity: if stability >= 0.8 {
                AnomalySeverity::High
            } else {
                AnomalySeverity::Medium
            },
            deviation: stability.max(0.5),
            confidence,
            description: format!("Transaction from {}, outside the user's usual countries", geo.country),
            expected: Value::from(patterns.common_countries.clone()),
            observed: Value::from(geo.country.as_str()),
        });
    }

    let city = geo.city.as_deref()?;
    if patterns.common_cities.is_empty() || patterns.common_cities.iter().any(|c| c.eq_ignore_ascii_case(city)) {
        return None;
    }

    Some(BehavioralAnomaly {
        anomaly_type: "location_anomaly".to_string(),
        severity: AnomalySeverity::Low,
        deviation: 0.5,
        confidence,
        description: format!("Transaction from {}, outside the user's usual cities", city),
        expected: Value::from(patterns.common_cities.clone()),
        observed: Value::from(city),
    })
}

fn device_anomaly(tx: &Transaction, profile: &BehavioralProfile, confidence: f64) -> Option<BehavioralAnomaly> {
    let fingerprint = DeviceAnalyzer::resolve_fingerprint(tx)?;
    let patterns = &profile.device_patterns;
    if patterns.known_devices.is_empty() || patterns.known_devices.contains(&fingerprint) {
        return None;
    }

    Some(BehavioralAnomaly {
        anomaly_type: "device_anomaly".to_string(),
        severity: if patterns.device_stability >= 0.8 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        },
        deviation: (1.0 - patterns.new_device_adoption_rate).max(0.3),
        confidence,
        description: "Transaction from a device the user has not used before".to_string(),
        expected: Value::from(patterns.primary_device.clone()),
        observed: Value::from(fingerprint),
    })
}

fn payment_method_anomaly(
    tx: &Transaction,
    profile: &BehavioralProfile,
    confidence: f64,
) -> Option<BehavioralAnomaly> {
    let method = tx.payment_method_id.as_deref()?;
    let patterns = &profile.payment_patterns;
    if patterns.preferred_methods.is_empty() || patterns.preferred_methods.iter().any(|m| m == method) {
        return None;
    }

    Some(BehavioralAnomaly {
        anomaly_type: "payment_method_anomaly".to_string(),
        severity: AnomalySeverity::Medium,
        deviation: (1.0 - patterns.method_switch_rate).max(0.3),
        confidence,
        description: "Transaction with a payment method the user does not usually use".to_string(),
        expected: Value::from(patterns.preferred_methods.clone()),
        observed: Value::from(method),
    })
}
