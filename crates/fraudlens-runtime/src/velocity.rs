//! Velocity checks
//!
//! Counts and sums recent transactions per identity (user, IP, device,
//! payment method) over sliding windows ending at the transaction's
//! `created_at`, and derives velocity signals from the result.

use crate::error::{Result, RuntimeError};
use crate::storage::{HistoryDimension, TransactionFilter, TransactionHistory};
use chrono::{DateTime, Duration, Utc};
use fraudlens_core::{FraudSignal, Transaction, TransactionStatus, TransactionSummary, Value};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Statuses that count towards velocity
pub const COUNTED_STATUSES: [TransactionStatus; 2] =
    [TransactionStatus::Succeeded, TransactionStatus::Processing];

/// Limits for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityLimit {
    pub window_minutes: u32,
    /// Violation when the count reaches this value
    pub max_count: usize,
    /// Violation when the summed amount reaches this value
    pub max_amount: f64,
}

impl VelocityLimit {
    pub fn new(window_minutes: u32, max_count: usize, max_amount: f64) -> Self {
        Self {
            window_minutes,
            max_count,
            max_amount,
        }
    }
}

/// Velocity checker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Per-window limits, ascending by window
    pub limits: Vec<VelocityLimit>,
    pub burst_window_minutes: u32,
    pub burst_threshold: usize,
    pub round_amount_max: f64,
    pub micro_amount_threshold: f64,
    pub escalation_lookback_hours: u32,
    pub escalation_min_transactions: usize,
    /// Last/first amount ratio that must be exceeded
    pub escalation_ratio: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            limits: vec![
                VelocityLimit::new(5, 10, 5_000.0),
                VelocityLimit::new(15, 20, 10_000.0),
                VelocityLimit::new(60, 50, 25_000.0),
                VelocityLimit::new(1440, 200, 100_000.0),
            ],
            burst_window_minutes: 5,
            burst_threshold: 5,
            round_amount_max: 1_000.0,
            micro_amount_threshold: 1.0,
            escalation_lookback_hours: 24,
            escalation_min_transactions: 3,
            escalation_ratio: 2.0,
        }
    }
}

impl VelocityConfig {
    /// Configured windows in minutes
    pub fn windows(&self) -> Vec<u32> {
        self.limits.iter().map(|l| l.window_minutes).collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.limits.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "velocity.limits must not be empty".to_string(),
            ));
        }
        let windows = self.windows();
        if windows.iter().any(|w| *w == 0) {
            return Err(RuntimeError::InvalidConfig(
                "velocity windows must be positive".to_string(),
            ));
        }
        if windows.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(RuntimeError::InvalidConfig(
                "velocity windows must be strictly ascending".to_string(),
            ));
        }
        for limit in &self.limits {
            if limit.max_count == 0 || !(limit.max_amount > 0.0) {
                return Err(RuntimeError::InvalidConfig(format!(
                    "velocity limit for {} minutes must have positive count and amount",
                    limit.window_minutes
                )));
            }
        }
        if self.burst_window_minutes == 0 || self.burst_threshold == 0 {
            return Err(RuntimeError::InvalidConfig(
                "velocity burst window and threshold must be positive".to_string(),
            ));
        }
        if self.escalation_min_transactions < 2 || self.escalation_ratio <= 1.0 {
            return Err(RuntimeError::InvalidConfig(
                "velocity escalation needs at least 2 transactions and a ratio above 1".to_string(),
            ));
        }
        Ok(())
    }

    fn longest_window(&self) -> u32 {
        self.limits.iter().map(|l| l.window_minutes).max().unwrap_or(0)
    }
}

/// Count and amount of one dimension within one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub window_minutes: u32,
    pub dimension: String,
    pub count: usize,
    pub amount: f64,
    pub violated: bool,
}

/// Result of a velocity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityCheck {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub device_fingerprint: Option<String>,
    pub payment_method_id: Option<String>,
    /// Configured windows in minutes
    pub windows: Vec<u32>,
    /// Per-window, per-dimension statistics
    pub stats: Vec<WindowStats>,
    pub is_violation: bool,
    /// Violated windows, deduplicated and ascending
    pub violated_windows: Vec<u32>,
    /// Reference instant the windows end at
    pub checked_at: DateTime<Utc>,
}

impl VelocityCheck {
    /// Statistics for one dimension and window
    pub fn stats_for(&self, dimension: &str, window_minutes: u32) -> Option<&WindowStats> {
        self.stats
            .iter()
            .find(|s| s.dimension == dimension && s.window_minutes == window_minutes)
    }
}

/// Velocity checker over a transaction history
pub struct VelocityChecker {
    history: Arc<dyn TransactionHistory>,
    config: VelocityConfig,
}

impl VelocityChecker {
    pub fn new(history: Arc<dyn TransactionHistory>, config: VelocityConfig) -> Self {
        Self { history, config }
    }

    pub fn config(&self) -> &VelocityConfig {
        &self.config
    }

    /// Count recent transactions per dimension and window.
    ///
    /// Dimension queries run concurrently; a failing query is logged and
    /// its dimension left out.
    pub async fn check_velocity(&self, tx: &Transaction) -> Result<VelocityCheck> {
        let reference = tx.created_at;
        let since = reference - Duration::minutes(i64::from(self.config.longest_window()));
        let dimensions = dimensions_of(tx);

        let queries = dimensions.iter().map(|dimension| {
            let filter = TransactionFilter::for_dimension(dimension.clone())
                .since(since)
                .with_statuses(&COUNTED_STATUSES)
                .excluding(tx.id.clone());
            async move { (dimension, self.history.find_transactions(&filter).await) }
        });

        let mut stats = Vec::new();
        let mut violated = BTreeSet::new();

        for (dimension, result) in join_all(queries).await {
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        dimension = dimension.name(),
                        error = %e,
                        "Velocity query failed, skipping dimension"
                    );
                    continue;
                }
            };

            for limit in &self.config.limits {
                let window_start = reference - Duration::minutes(i64::from(limit.window_minutes));
                let in_window: Vec<&TransactionSummary> = records
                    .iter()
                    .filter(|r| r.created_at >= window_start && r.created_at <= reference)
                    .collect();
                let count = in_window.len();
                let amount: f64 = in_window.iter().map(|r| r.amount_f64()).sum();
                let is_violated = count >= limit.max_count || amount >= limit.max_amount;

                if is_violated {
                    violated.insert(limit.window_minutes);
                }
                stats.push(WindowStats {
                    window_minutes: limit.window_minutes,
                    dimension: dimension.name().to_string(),
                    count,
                    amount,
                    violated: is_violated,
                });
            }
        }

        let violated_windows: Vec<u32> = violated.into_iter().collect();
        debug!(
            transaction_id = %tx.id,
            violated = ?violated_windows,
            "Velocity check complete"
        );

        Ok(VelocityCheck {
            user_id: tx.user_id.clone(),
            ip_address: tx.metadata.ip_address.clone(),
            device_fingerprint: tx.metadata.device_fingerprint.clone(),
            payment_method_id: tx.payment_method_id.clone(),
            windows: self.config.windows(),
            is_violation: !violated_windows.is_empty(),
            violated_windows,
            stats,
            checked_at: reference,
        })
    }

    /// Derive velocity signals from a check and the user's recent history
    pub async fn generate_velocity_signals(
        &self,
        tx: &Transaction,
        check: &VelocityCheck,
    ) -> Result<Vec<FraudSignal>> {
        let mut signals = Vec::new();

        if check.is_violation {
            let short = check.violated_windows.iter().filter(|w| **w <= 15).count();
            let risk = (20.0 + 10.0 * check.violated_windows.len() as f64 + 15.0 * short as f64)
                .min(50.0);
            signals.push(
                FraudSignal::new(
                    "velocity_violation",
                    risk,
                    format!(
                        "Velocity limits exceeded in windows {:?} (minutes)",
                        check.violated_windows
                    ),
                )
                .with_value(check.violated_windows.clone()),
            );
        }

        if let Some(user_id) = &tx.user_id {
            match self.recent_user_history(tx, user_id).await {
                Ok(recent) => {
                    signals.extend(self.burst_signal(tx, &recent));
                    signals.extend(self.escalation_signal(tx, &recent));
                }
                Err(e) => warn!(user_id = %user_id, error = %e, "User history query failed"),
            }
        }

        signals.extend(self.amount_pattern_signals(tx));
        Ok(signals)
    }

    /// Run the check and derive its signals
    pub async fn analyze(&self, tx: &Transaction) -> Result<Vec<FraudSignal>> {
        let check = self.check_velocity(tx).await?;
        self.generate_velocity_signals(tx, &check).await
    }

    async fn recent_user_history(
        &self,
        tx: &Transaction,
        user_id: &str,
    ) -> Result<Vec<TransactionSummary>> {
        let lookback = self
            .config
            .escalation_lookback_hours
            .saturating_mul(60)
            .max(self.config.burst_window_minutes);
        let filter = TransactionFilter::for_dimension(HistoryDimension::User(user_id.to_string()))
            .since(tx.created_at - Duration::minutes(i64::from(lookback)))
            .with_statuses(&COUNTED_STATUSES)
            .excluding(tx.id.clone());

        let mut records = self.history.find_transactions(&filter).await?;
        records.retain(|r| r.created_at <= tx.created_at);
        Ok(records)
    }

    fn burst_signal(&self, tx: &Transaction, recent: &[TransactionSummary]) -> Option<FraudSignal> {
        let window_start =
            tx.created_at - Duration::minutes(i64::from(self.config.burst_window_minutes));
        let count = recent.iter().filter(|r| r.created_at >= window_start).count();

        (count >= self.config.burst_threshold).then(|| {
            FraudSignal::new(
                "velocity_burst",
                30.0,
                format!(
                    "{} transactions in the last {} minutes",
                    count, self.config.burst_window_minutes
                ),
            )
            .with_value(count)
        })
    }

    fn escalation_signal(
        &self,
        tx: &Transaction,
        recent: &[TransactionSummary],
    ) -> Option<FraudSignal> {
        let window_start =
            tx.created_at - Duration::hours(i64::from(self.config.escalation_lookback_hours));
        let mut series: Vec<(DateTime<Utc>, f64)> = recent
            .iter()
            .filter(|r| r.created_at >= window_start)
            .map(|r| (r.created_at, r.amount_f64()))
            .collect();
        series.push((tx.created_at, tx.amount_f64()));
        series.sort_by(|a, b| a.0.cmp(&b.0));

        if series.len() < self.config.escalation_min_transactions {
            return None;
        }

        let amounts: Vec<f64> = series.iter().map(|(_, amount)| *amount).collect();
        let increasing = amounts.windows(2).all(|pair| pair[1] > pair[0]);
        let first = amounts[0];
        let last = amounts[amounts.len() - 1];

        (increasing && first > 0.0 && last / first > self.config.escalation_ratio).then(|| {
            FraudSignal::new(
                "velocity_amount_escalation",
                20.0,
                format!(
                    "Amounts escalated from {:.2} to {:.2} over {} transactions",
                    first,
                    last,
                    amounts.len()
                ),
            )
            .with_value(amounts)
        })
    }

    fn amount_pattern_signals(&self, tx: &Transaction) -> Vec<FraudSignal> {
        let mut signals = Vec::new();
        let amount = tx.amount_f64();

        let is_round = tx.amount > Decimal::ZERO && (tx.amount % Decimal::ONE_HUNDRED).is_zero();
        if is_round && amount <= self.config.round_amount_max {
            signals.push(
                FraudSignal::new(
                    "velocity_round_amount",
                    10.0,
                    format!("Round amount {}", tx.amount),
                )
                .with_value(tx.amount),
            );
        }

        if amount < self.config.micro_amount_threshold {
            signals.push(
                FraudSignal::new(
                    "velocity_micro_transaction",
                    15.0,
                    format!("Micro transaction of {}", tx.amount),
                )
                .with_value(Value::from(tx.amount)),
            );
        }

        signals
    }
}

/// Dimensions present on the transaction
fn dimensions_of(tx: &Transaction) -> Vec<HistoryDimension> {
    let mut dimensions = Vec::with_capacity(4);
    if let Some(user) = &tx.user_id {
        dimensions.push(HistoryDimension::User(user.clone()));
    }
    if let Some(ip) = &tx.metadata.ip_address {
        dimensions.push(HistoryDimension::Ip(ip.clone()));
    }
    if let Some(device) = &tx.metadata.device_fingerprint {
        dimensions.push(HistoryDimension::Device(device.clone()));
    }
    if let Some(method) = &tx.payment_method_id {
        dimensions.push(HistoryDimension::PaymentMethod(method.clone()));
    }
    dimensions
}
