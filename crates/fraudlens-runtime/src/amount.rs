//! Amount signals

use fraudlens_core::{FraudSignal, Transaction};

/// Amount at or above which `amount_high` fires
pub const HIGH_AMOUNT: f64 = 10_000.0;

/// Amount at or above which `amount_elevated` fires
pub const ELEVATED_AMOUNT: f64 = 5_000.0;

/// Flags large amounts and high-risk currencies
#[derive(Debug, Clone)]
pub struct AmountAnalyzer {
    high_risk_currencies: Vec<String>,
}

impl AmountAnalyzer {
    pub fn new(high_risk_currencies: Vec<String>) -> Self {
        Self {
            high_risk_currencies,
        }
    }

    /// Returns true if the currency is configured as high risk
    pub fn is_high_risk_currency(&self, currency: &str) -> bool {
        self.high_risk_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(currency))
    }

    pub fn analyze(&self, tx: &Transaction) -> Vec<FraudSignal> {
        let mut signals = Vec::new();
        let amount = tx.amount_f64();

        if amount >= HIGH_AMOUNT {
            signals.push(
                FraudSignal::new(
                    "amount_high",
                    25.0,
                    format!("Amount {} {} is high", tx.amount, tx.currency),
                )
                .with_value(tx.amount),
            );
        } else if amount >= ELEVATED_AMOUNT {
            signals.push(
                FraudSignal::new(
                    "amount_elevated",
                    10.0,
                    format!("Amount {} {} is elevated", tx.amount, tx.currency),
                )
                .with_value(tx.amount),
            );
        }

        if self.is_high_risk_currency(&tx.currency) {
            signals.push(
                FraudSignal::new(
                    "amount_currency_risk",
                    15.0,
                    format!("Currency {} is high risk", tx.currency),
                )
                .with_value(tx.currency.as_str()),
            );
        }

        signals
    }
}
