//! Geolocation analysis
//!
//! IP reputation, country lists, impossible travel between consecutive
//! transactions, IP versus reported location consistency and coordinate
//! spoofing indicators.

use crate::cache::TtlCache;
use crate::error::{Result, RuntimeError};
use crate::reputation::{IpReputation, IpReputationProvider};
use crate::storage::{HistoryDimension, TransactionFilter, TransactionHistory};
use fraudlens_core::{FraudSignal, Transaction, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geolocation analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Reputation score at or above which an IP is high risk
    pub high_risk_ip_threshold: f64,
    /// Travel speed above which travel is impossible
    pub max_velocity_kmh: f64,
    /// Fraction of `max_velocity_kmh` above which travel is unlikely
    pub unlikely_travel_ratio: f64,
    /// Distance between IP and reported location that counts as a mismatch
    pub location_mismatch_km: f64,
    pub detect_vpn: bool,
    pub detect_proxy: bool,
    pub detect_tor: bool,
    pub detect_datacenter: bool,
    /// ISO country codes
    pub blacklisted_countries: Vec<String>,
    pub whitelisted_countries: Vec<String>,
    pub high_risk_countries: Vec<String>,
    pub reputation_cache_ttl_secs: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            high_risk_ip_threshold: 75.0,
            max_velocity_kmh: 1000.0,
            unlikely_travel_ratio: 0.7,
            location_mismatch_km: 100.0,
            detect_vpn: true,
            detect_proxy: true,
            detect_tor: true,
            detect_datacenter: true,
            blacklisted_countries: Vec::new(),
            whitelisted_countries: Vec::new(),
            high_risk_countries: Vec::new(),
            reputation_cache_ttl_secs: 3600,
        }
    }
}

impl GeolocationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.high_risk_ip_threshold) {
            return Err(RuntimeError::InvalidConfig(
                "geolocation.high_risk_ip_threshold must be within 0-100".to_string(),
            ));
        }
        if !(self.max_velocity_kmh > 0.0) {
            return Err(RuntimeError::InvalidConfig(
                "geolocation.max_velocity_kmh must be positive".to_string(),
            ));
        }
        if !(self.unlikely_travel_ratio > 0.0 && self.unlikely_travel_ratio < 1.0) {
            return Err(RuntimeError::InvalidConfig(
                "geolocation.unlikely_travel_ratio must be between 0 and 1".to_string(),
            ));
        }
        if !(self.location_mismatch_km > 0.0) {
            return Err(RuntimeError::InvalidConfig(
                "geolocation.location_mismatch_km must be positive".to_string(),
            ));
        }
        if let Some(country) = self
            .blacklisted_countries
            .iter()
            .find(|c| contains_country(&self.whitelisted_countries, c))
        {
            return Err(RuntimeError::InvalidConfig(format!(
                "country {} is both blacklisted and whitelisted",
                country
            )));
        }
        Ok(())
    }
}

/// Great-circle distance in kilometres between two (latitude, longitude) points
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Number of decimal places in the shortest representation of a coordinate
pub fn decimal_places(value: f64) -> usize {
    let repr = value.abs().to_string();
    match repr.split_once('.') {
        Some((_, fraction)) => fraction.trim_end_matches('0').len(),
        None => 0,
    }
}

fn contains_country(list: &[String], country: &str) -> bool {
    list.iter().any(|c| c.eq_ignore_ascii_case(country))
}

/// Geolocation analyzer
pub struct GeolocationAnalyzer {
    history: Arc<dyn TransactionHistory>,
    reputation: Option<Arc<dyn IpReputationProvider>>,
    reputation_cache: TtlCache<String, Option<IpReputation>>,
    config: GeolocationConfig,
}

impl GeolocationAnalyzer {
    pub fn new(history: Arc<dyn TransactionHistory>, config: GeolocationConfig) -> Self {
        Self {
            history,
            reputation: None,
            reputation_cache: TtlCache::new(Duration::from_secs(config.reputation_cache_ttl_secs)),
            config,
        }
    }

    /// Attach an IP reputation provider
    pub fn with_reputation_provider(mut self, provider: Arc<dyn IpReputationProvider>) -> Self {
        self.reputation = Some(provider);
        self
    }

    pub fn config(&self) -> &GeolocationConfig {
        &self.config
    }

    /// Produce all geolocation signals for a transaction
    pub async fn analyze(&self, tx: &Transaction) -> Result<Vec<FraudSignal>> {
        let mut signals = Vec::new();
        let geo = tx.metadata.geolocation.as_ref();

        let reputation = match &tx.metadata.ip_address {
            Some(ip) => self.lookup_reputation(ip).await,
            None => {
                signals.push(FraudSignal::new(
                    "geolocation_missing_ip",
                    5.0,
                    "Transaction carries no IP address",
                ));
                None
            }
        };

        if let Some(rep) = &reputation {
            signals.extend(self.reputation_signals(rep, tx));
            signals.extend(self.consistency_signals(rep, tx));
        } else if let Some(geo) = geo {
            // Client-reported network flags still count without a reputation record
            if self.config.detect_vpn && geo.is_vpn == Some(true) {
                signals.push(vpn_signal());
            }
            if self.config.detect_tor && geo.is_tor == Some(true) {
                signals.push(tor_signal());
            }
        }

        let country = geo
            .map(|g| g.country.clone())
            .filter(|c| !c.is_empty())
            .or_else(|| reputation.as_ref().and_then(|r| r.country.clone()));
        if let Some(country) = country {
            signals.extend(self.country_signals(&country));
        }

        if let Some((lat, lon)) = geo.and_then(|g| g.coordinates()) {
            signals.extend(coordinate_signals(lat, lon));
        }

        let current_point = geo
            .and_then(|g| g.coordinates())
            .or_else(|| reputation.as_ref().and_then(|r| r.coordinates()));
        if let (Some(user_id), Some(point)) = (&tx.user_id, current_point) {
            match self.travel_signal(tx, user_id, point).await {
                Ok(signal) => signals.extend(signal),
                Err(e) => warn!(user_id = %user_id, error = %e, "Travel history query failed"),
            }
        }

        debug!(transaction_id = %tx.id, count = signals.len(), "Geolocation analysis complete");
        Ok(signals)
    }

    /// Reputation of an IP, cached per IP. Provider failures are logged and
    /// treated as "unknown".
    pub async fn lookup_reputation(&self, ip: &str) -> Option<IpReputation> {
        let provider = self.reputation.as_ref()?;
        let provider = Arc::clone(provider);
        let ip_owned = ip.to_string();

        let result = self
            .reputation_cache
            .get_or_compute(ip.to_string(), || async move { provider.lookup(&ip_owned).await })
            .await;

        match result {
            Ok(reputation) => reputation,
            Err(e) => {
                warn!(ip = %ip, error = %e, "IP reputation lookup failed");
                None
            }
        }
    }

    fn reputation_signals(&self, rep: &IpReputation, tx: &Transaction) -> Vec<FraudSignal> {
        let mut signals = Vec::new();
        let geo = tx.metadata.geolocation.as_ref();

        if rep.score >= self.config.high_risk_ip_threshold {
            signals.push(
                FraudSignal::new(
                    "geolocation_high_risk_ip",
                    25.0,
                    format!("IP {} has reputation score {}", rep.ip, rep.score),
                )
                .with_value(rep.score),
            );
        }
        if rep.is_malicious || rep.is_malware {
            signals.push(FraudSignal::new(
                "geolocation_malicious_ip",
                40.0,
                format!("IP {} is flagged as malicious", rep.ip),
            ));
        }
        if self.config.detect_vpn && (rep.is_vpn || geo.and_then(|g| g.is_vpn) == Some(true)) {
            signals.push(vpn_signal());
        }
        if self.config.detect_proxy && rep.is_proxy {
            signals.push(FraudSignal::new("geolocation_proxy", 15.0, "Connection through a proxy"));
        }
        if self.config.detect_tor && (rep.is_tor || geo.and_then(|g| g.is_tor) == Some(true)) {
            signals.push(tor_signal());
        }
        if self.config.detect_datacenter && rep.is_datacenter {
            signals.push(FraudSignal::new(
                "geolocation_datacenter",
                10.0,
                "IP belongs to a hosting provider",
            ));
        }

        signals
    }

    fn consistency_signals(&self, rep: &IpReputation, tx: &Transaction) -> Vec<FraudSignal> {
        let mut signals = Vec::new();
        let Some(geo) = tx.metadata.geolocation.as_ref() else {
            return signals;
        };

        if let Some(ip_country) = &rep.country {
            if !geo.country.is_empty() && !ip_country.eq_ignore_ascii_case(&geo.country) {
                signals.push(
                    FraudSignal::new(
                        "geolocation_country_mismatch",
                        20.0,
                        format!(
                            "IP resolves to {} but reported country is {}",
                            ip_country, geo.country
                        ),
                    )
                    .with_value(Value::object([
                        ("ip_country", Value::from(ip_country.as_str())),
                        ("reported_country", Value::from(geo.country.as_str())),
                    ])),
                );
            }
        }

        if let (Some(ip_point), Some(reported)) = (rep.coordinates(), geo.coordinates()) {
            let distance = haversine_km(ip_point, reported);
            if distance > self.config.location_mismatch_km {
                signals.push(
                    FraudSignal::new(
                        "geolocation_city_mismatch",
                        15.0,
                        format!("IP location is {:.0} km from the reported location", distance),
                    )
                    .with_value(distance),
                );
            }
        }

        signals
    }

    fn country_signals(&self, country: &str) -> Vec<FraudSignal> {
        let mut signals = Vec::new();

        if contains_country(&self.config.blacklisted_countries, country) {
            signals.push(
                FraudSignal::new(
                    "geolocation_country_blacklisted",
                    40.0,
                    format!("Country {} is blacklisted", country),
                )
                .with_value(country),
            );
        } else if contains_country(&self.config.whitelisted_countries, country) {
            signals.push(
                FraudSignal::new(
                    "geolocation_country_whitelisted",
                    -10.0,
                    format!("Country {} is whitelisted", country),
                )
                .with_value(country),
            );
        }

        if contains_country(&self.config.high_risk_countries, country) {
            signals.push(
                FraudSignal::new(
                    "geolocation_country_high_risk",
                    20.0,
                    format!("Country {} is high risk", country),
                )
                .with_value(country),
            );
        }

        signals
    }

    async fn travel_signal(
        &self,
        tx: &Transaction,
        user_id: &str,
        point: (f64, f64),
    ) -> Result<Option<FraudSignal>> {
        let filter = TransactionFilter::for_dimension(HistoryDimension::User(user_id.to_string()))
            .with_coordinates()
            .excluding(tx.id.clone());
        let history = self.history.find_transactions(&filter).await?;

        let Some(previous) = history.iter().find(|r| r.created_at <= tx.created_at) else {
            return Ok(None);
        };
        let Some(previous_point) = previous.coordinates() else {
            return Ok(None);
        };

        let distance = haversine_km(previous_point, point);
        let minutes = (tx.created_at - previous.created_at).num_seconds() as f64 / 60.0;

        let (impossible, speed) = if minutes <= 0.0 {
            (distance > self.config.location_mismatch_km, f64::INFINITY)
        } else {
            let speed = distance / (minutes / 60.0);
            (speed > self.config.max_velocity_kmh, speed)
        };

        let payload = Value::object([
            ("distance_km", Value::from(distance)),
            ("minutes", Value::from(minutes)),
            ("previous_transaction_id", Value::from(previous.id.as_str())),
        ]);

        if impossible {
            return Ok(Some(
                FraudSignal::new(
                    "geolocation_impossible_travel",
                    45.0,
                    format!("{:.0} km in {:.1} minutes since the previous transaction", distance, minutes),
                )
                .with_value(payload),
            ));
        }

        if speed > self.config.max_velocity_kmh * self.config.unlikely_travel_ratio {
            return Ok(Some(
                FraudSignal::new(
                    "geolocation_unlikely_travel",
                    25.0,
                    format!("Travel at {:.0} km/h since the previous transaction", speed),
                )
                .with_value(payload),
            ));
        }

        Ok(None)
    }
}

fn vpn_signal() -> FraudSignal {
    FraudSignal::new("geolocation_vpn", 15.0, "Connection through a VPN")
}

fn tor_signal() -> FraudSignal {
    FraudSignal::new("geolocation_tor", 30.0, "Connection through Tor")
}

fn coordinate_signals(lat: f64, lon: f64) -> Vec<FraudSignal> {
    if lat == 0.0 && lon == 0.0 {
        return vec![FraudSignal::new(
            "geolocation_null_island",
            30.0,
            "Reported coordinates are exactly (0, 0)",
        )];
    }

    let mut signals = Vec::new();
    let (lat_places, lon_places) = (decimal_places(lat), decimal_places(lon));

    if lat_places > 6 || lon_places > 6 {
        signals.push(FraudSignal::new(
            "geolocation_coordinates_too_precise",
            10.0,
            "Reported coordinates have more than 6 decimal places",
        ));
    }
    if lat_places < 2 && lon_places < 2 {
        signals.push(FraudSignal::new(
            "geolocation_coordinates_too_coarse",
            10.0,
            "Reported coordinates have fewer than 2 decimal places",
        ));
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reputation::StaticReputationProvider;
    use crate::storage::InMemoryTransactionHistory;
    use chrono::{Duration as ChronoDuration, Utc};
    use fraudlens_core::{Geolocation, TransactionStatus, TransactionSummary};
    use rust_decimal::Decimal;

    fn analyzer(records: Vec<TransactionSummary>, config: GeolocationConfig) -> GeolocationAnalyzer {
        GeolocationAnalyzer::new(
            Arc::new(InMemoryTransactionHistory::with_records(records)),
            config,
        )
    }

    fn types(signals: &[FraudSignal]) -> Vec<&str> {
        signals.iter().map(|s| s.signal_type.as_str()).collect()
    }

    #[test]
    fn test_haversine() {
        // Paris to London is roughly 344 km
        let d = haversine_km((48.8566, 2.3522), (51.5074, -0.1278));
        assert!((d - 343.5).abs() < 2.0, "distance was {}", d);
        assert_eq!(haversine_km((10.0, 10.0), (10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(48.8566), 4);
        assert_eq!(decimal_places(2.0), 0);
        assert_eq!(decimal_places(-0.1278), 4);
        assert_eq!(decimal_places(1.12345678), 8);
    }

    #[tokio::test]
    async fn test_missing_ip() {
        let analyzer = analyzer(vec![], GeolocationConfig::default());
        let tx = Transaction::new("t1", Decimal::new(10, 0), "USD");
        let signals = analyzer.analyze(&tx).await.unwrap();
        assert_eq!(types(&signals), vec!["geolocation_missing_ip"]);
    }

    #[tokio::test]
    async fn test_impossible_travel() {
        let now = Utc::now();
        let previous = Transaction::new("prev", Decimal::new(10, 0), "USD")
            .with_user("u1")
            .with_geolocation(Geolocation::new("FR").with_coordinates(48.8566, 2.3522))
            .at(now - ChronoDuration::minutes(10));
        let records = vec![TransactionSummary::from_transaction(&previous, TransactionStatus::Succeeded)];

        // About 1000 km east of Paris
        let tx = Transaction::new("cur", Decimal::new(10, 0), "USD")
            .with_user("u1")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("PL").with_coordinates(50.0647, 16.2))
            .at(now);

        let analyzer = analyzer(records, GeolocationConfig::default());
        let signals = analyzer.analyze(&tx).await.unwrap();
        assert!(types(&signals).contains(&"geolocation_impossible_travel"));
    }

    #[tokio::test]
    async fn test_unlikely_travel() {
        let now = Utc::now();
        let previous = Transaction::new("prev", Decimal::new(10, 0), "USD")
            .with_user("u1")
            .with_geolocation(Geolocation::new("FR").with_coordinates(48.8566, 2.3522))
            .at(now - ChronoDuration::minutes(25));
        let records = vec![TransactionSummary::from_transaction(&previous, TransactionStatus::Succeeded)];

        // Paris to London in 25 minutes: ~825 km/h
        let tx = Transaction::new("cur", Decimal::new(10, 0), "USD")
            .with_user("u1")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("GB").with_coordinates(51.5074, -0.1278))
            .at(now);

        let analyzer = analyzer(records, GeolocationConfig::default());
        let signals = analyzer.analyze(&tx).await.unwrap();
        let found = types(&signals);
        assert!(found.contains(&"geolocation_unlikely_travel"));
        assert!(!found.contains(&"geolocation_impossible_travel"));
    }

    #[tokio::test]
    async fn test_reputation_and_consistency() {
        let provider = StaticReputationProvider::new().with_entry(IpReputation {
            is_tor: true,
            is_datacenter: true,
            ..IpReputation::new("203.0.113.9")
                .with_score(90.0)
                .located("DE", 52.52, 13.405)
        });
        let analyzer = analyzer(vec![], GeolocationConfig::default())
            .with_reputation_provider(Arc::new(provider));

        let tx = Transaction::new("t1", Decimal::new(10, 0), "USD")
            .with_ip("203.0.113.9")
            .with_geolocation(Geolocation::new("US").with_coordinates(40.7128, -74.006));

        let signals = analyzer.analyze(&tx).await.unwrap();
        let found = types(&signals);
        assert!(found.contains(&"geolocation_high_risk_ip"));
        assert!(found.contains(&"geolocation_tor"));
        assert!(found.contains(&"geolocation_datacenter"));
        assert!(found.contains(&"geolocation_country_mismatch"));
        assert!(found.contains(&"geolocation_city_mismatch"));
        assert!(!found.contains(&"geolocation_malicious_ip"));
    }

    #[tokio::test]
    async fn test_country_lists() {
        let config = GeolocationConfig {
            blacklisted_countries: vec!["KP".to_string()],
            whitelisted_countries: vec!["CH".to_string()],
            high_risk_countries: vec!["kp".to_string()],
            ..Default::default()
        };
        let analyzer = analyzer(vec![], config);

        let blocked = Transaction::new("t1", Decimal::new(10, 0), "USD")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("KP"));
        let found = analyzer.analyze(&blocked).await.unwrap();
        assert!(types(&found).contains(&"geolocation_country_blacklisted"));
        assert!(types(&found).contains(&"geolocation_country_high_risk"));

        let trusted = Transaction::new("t2", Decimal::new(10, 0), "USD")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("CH"));
        let found = analyzer.analyze(&trusted).await.unwrap();
        let whitelisted = found
            .iter()
            .find(|s| s.signal_type == "geolocation_country_whitelisted")
            .unwrap();
        assert_eq!(whitelisted.risk_contribution, -10.0);
    }

    #[tokio::test]
    async fn test_coordinate_spoofing() {
        let analyzer = analyzer(vec![], GeolocationConfig::default());

        let null_island = Transaction::new("t1", Decimal::new(10, 0), "USD")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("US").with_coordinates(0.0, 0.0));
        let found = analyzer.analyze(&null_island).await.unwrap();
        assert_eq!(types(&found), vec!["geolocation_null_island"]);

        let precise = Transaction::new("t2", Decimal::new(10, 0), "USD")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("US").with_coordinates(40.712812345, -74.0060123));
        let found = analyzer.analyze(&precise).await.unwrap();
        assert!(types(&found).contains(&"geolocation_coordinates_too_precise"));

        let coarse = Transaction::new("t3", Decimal::new(10, 0), "USD")
            .with_ip("198.51.100.1")
            .with_geolocation(Geolocation::new("US").with_coordinates(40.0, -74.0));
        let found = analyzer.analyze(&coarse).await.unwrap();
        assert!(types(&found).contains(&"geolocation_coordinates_too_coarse"));
    }

    #[test]
    fn test_config_validation() {
        assert!(GeolocationConfig::default().validate().is_ok());

        let conflicting = GeolocationConfig {
            blacklisted_countries: vec!["RU".to_string()],
            whitelisted_countries: vec!["ru".to_string()],
            ..Default::default()
        };
        assert!(conflicting.validate().is_err());

        let bad_ratio = GeolocationConfig {
            unlikely_travel_ratio: 1.5,
            ..Default::default()
        };
        assert!(bad_ratio.validate().is_err());
    }
}
