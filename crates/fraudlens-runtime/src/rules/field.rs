//! Typed field registry
//!
//! Rule conditions address transaction data with dot paths such as
//! `metadata.geolocation.country`. Every supported path maps to an
//! extraction closure; `metadata.custom.<key>...` walks the free-form custom
//! map. Path segments may be written in camelCase (`metadata.ipAddress`).

use fraudlens_core::{Transaction, Value};
use chrono::Timelike;
use std::collections::HashMap;

/// Prefix of paths resolved through the custom metadata map
pub const CUSTOM_PREFIX: &str = "metadata.custom";

type Extractor = Box<dyn Fn(&Transaction) -> Value + Send + Sync>;

/// Table of extraction closures keyed by normalized path
pub struct FieldRegistry {
    fields: HashMap<String, Extractor>,
}

impl FieldRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Registry with every standard transaction field
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        registry.register("id", |tx| tx.id.as_str().into());
        registry.register("user_id", |tx| tx.user_id.clone().into());
        registry.register("amount", |tx| tx.amount.into());
        registry.register("currency", |tx| tx.currency.as_str().into());
        registry.register("payment_method_id", |tx| tx.payment_method_id.clone().into());
        registry.register("created_at", |tx| tx.created_at.to_rfc3339().into());
        registry.register("hour_of_day", |tx| tx.created_at.hour().into());

        registry.register("metadata.ip_address", |tx| tx.metadata.ip_address.clone().into());
        registry.register("metadata.device_fingerprint", |tx| {
            tx.metadata.device_fingerprint.clone().into()
        });
        registry.register("metadata.email", |tx| tx.metadata.email.clone().into());
        registry.register("metadata.email_domain", |tx| tx.email_domain().into());
        registry.register("metadata.merchant_id", |tx| tx.metadata.merchant_id.clone().into());

        registry.register("metadata.geolocation.country", |tx| {
            geo(tx, |g| g.country.clone().into())
        });
        registry.register("metadata.geolocation.region", |tx| {
            geo(tx, |g| g.region.clone().into())
        });
        registry.register("metadata.geolocation.city", |tx| geo(tx, |g| g.city.clone().into()));
        registry.register("metadata.geolocation.latitude", |tx| geo(tx, |g| g.latitude.into()));
        registry.register("metadata.geolocation.longitude", |tx| {
            geo(tx, |g| g.longitude.into())
        });
        registry.register("metadata.geolocation.is_vpn", |tx| geo(tx, |g| g.is_vpn.into()));
        registry.register("metadata.geolocation.is_tor", |tx| geo(tx, |g| g.is_tor.into()));

        registry.register("metadata.device.user_agent", |tx| {
            device(tx, |d| d.user_agent.clone().into())
        });
        registry.register("metadata.device.screen_resolution", |tx| {
            device(tx, |d| d.screen_resolution.clone().into())
        });
        registry.register("metadata.device.timezone", |tx| {
            device(tx, |d| d.timezone.clone().into())
        });
        registry.register("metadata.device.language", |tx| {
            device(tx, |d| d.language.clone().into())
        });
        registry.register("metadata.device.platform", |tx| {
            device(tx, |d| d.platform.clone().into())
        });
        registry.register("metadata.device.cookies_enabled", |tx| {
            device(tx, |d| d.cookies_enabled.into())
        });
        registry.register("metadata.device.java_enabled", |tx| {
            device(tx, |d| d.java_enabled.into())
        });
        registry.register("metadata.device.webdriver", |tx| device(tx, |d| d.webdriver.into()));
        registry.register("metadata.device.plugins", |tx| {
            device(tx, |d| d.plugins.clone().into())
        });
        registry.register("metadata.device.fonts", |tx| device(tx, |d| d.fonts.clone().into()));

        registry.register("metadata.behavioral_metrics.typing_speed_wpm", |tx| {
            behavior(tx, |b| b.typing_speed_wpm.into())
        });
        registry.register("metadata.behavioral_metrics.mouse_movements", |tx| {
            behavior(tx, |b| b.mouse_movements.into())
        });
        registry.register("metadata.behavioral_metrics.session_duration_seconds", |tx| {
            behavior(tx, |b| b.session_duration_seconds.into())
        });
        registry.register("metadata.behavioral_metrics.copy_paste_events", |tx| {
            behavior(tx, |b| b.copy_paste_events.into())
        });
        registry.register("metadata.behavioral_metrics.form_fill_seconds", |tx| {
            behavior(tx, |b| b.form_fill_seconds.into())
        });

        registry
    }

    /// Register (or replace) an extractor for a path
    pub fn register<F>(&mut self, path: &str, extractor: F)
    where
        F: Fn(&Transaction) -> Value + Send + Sync + 'static,
    {
        self.fields.insert(normalize_path(path), Box::new(extractor));
    }

    /// Resolve a path against a transaction; unknown or missing paths give `Null`
    pub fn resolve(&self, tx: &Transaction, path: &str) -> Value {
        let normalized = normalize_path(path);

        if let Some(extractor) = self.fields.get(&normalized) {
            return extractor(tx);
        }

        match custom_segments(path) {
            Some(segments) if !segments.is_empty() => resolve_custom(tx, &segments),
            Some(_) => Value::object(
                tx.metadata
                    .custom
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            ),
            None => {
                tracing::debug!("Unknown field path: {}, returning Null", path);
                Value::Null
            }
        }
    }

    /// Returns true if the path is a registered field or a custom-map path
    pub fn is_known(&self, path: &str) -> bool {
        self.fields.contains_key(&normalize_path(path))
            || custom_segments(path).is_some_and(|segments| !segments.is_empty())
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn geo(tx: &Transaction, f: impl Fn(&fraudlens_core::Geolocation) -> Value) -> Value {
    tx.metadata.geolocation.as_ref().map(f).unwrap_or_default()
}

fn device(tx: &Transaction, f: impl Fn(&fraudlens_core::DeviceAttributes) -> Value) -> Value {
    tx.metadata.device.as_ref().map(f).unwrap_or_default()
}

fn behavior(tx: &Transaction, f: impl Fn(&fraudlens_core::BehavioralMetrics) -> Value) -> Value {
    tx.metadata.behavioral_metrics.as_ref().map(f).unwrap_or_default()
}

/// Convert one path segment from camelCase to snake_case
pub fn camel_to_snake(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    let mut prev_lower = false;

    for c in segment.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }

    out
}

/// Normalize every segment of a dot path to snake_case
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .split('.')
        .map(camel_to_snake)
        .collect::<Vec<_>>()
        .join(".")
}

/// Raw segments after `metadata.custom`, or `None` for other paths.
/// Custom keys keep their original spelling.
fn custom_segments(path: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = path.trim().split('.').collect();
    if segments.len() < 2 {
        return None;
    }
    let head = format!("{}.{}", camel_to_snake(segments[0]), camel_to_snake(segments[1]));
    if head != CUSTOM_PREFIX {
        return None;
    }
    Some(segments[2..].to_vec())
}

fn resolve_custom(tx: &Transaction, segments: &[&str]) -> Value {
    let Some((first, rest)) = segments.split_first() else {
        return Value::Null;
    };

    let mut current = match lookup_key(&tx.metadata.custom, first) {
        Some(value) => value,
        None => return Value::Null,
    };

    for segment in rest {
        current = match current {
            Value::Object(map) => match lookup_key(map, segment) {
                Some(value) => value,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }

    current.clone()
}

/// Exact key first, then its snake_case form
fn lookup_key<'a>(map: &'a HashMap<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| map.get(&camel_to_snake(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_core::Geolocation;
    use rust_decimal::Decimal;

    fn transaction() -> Transaction {
        Transaction::new("t1", Decimal::new(12550, 2), "EUR")
            .with_user("u1")
            .with_ip("198.51.100.4")
            .with_geolocation(Geolocation::new("FR").with_city("Paris"))
            .with_custom(
                "risk",
                Value::object([("tier", Value::from("gold")), ("score", Value::from(7.0))]),
            )
            .with_custom("loginCount", 3.0)
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("ipAddress"), "ip_address");
        assert_eq!(camel_to_snake("paymentMethodId"), "payment_method_id");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(normalize_path("metadata.geolocation.isVpn"), "metadata.geolocation.is_vpn");
    }

    #[test]
    fn test_resolve_standard_fields() {
        let registry = FieldRegistry::standard();
        let tx = transaction();

        assert_eq!(registry.resolve(&tx, "amount"), Value::Number(125.5));
        assert_eq!(registry.resolve(&tx, "currency"), Value::from("EUR"));
        assert_eq!(registry.resolve(&tx, "userId"), Value::from("u1"));
        assert_eq!(registry.resolve(&tx, "metadata.ipAddress"), Value::from("198.51.100.4"));
        assert_eq!(
            registry.resolve(&tx, "metadata.geolocation.city"),
            Value::from("Paris")
        );
        assert_eq!(registry.resolve(&tx, "metadata.device.user_agent"), Value::Null);
    }

    #[test]
    fn test_resolve_custom_paths() {
        let registry = FieldRegistry::standard();
        let tx = transaction();

        assert_eq!(registry.resolve(&tx, "metadata.custom.risk.tier"), Value::from("gold"));
        assert_eq!(registry.resolve(&tx, "metadata.custom.loginCount"), Value::Number(3.0));
        assert_eq!(registry.resolve(&tx, "metadata.custom.risk.missing"), Value::Null);
        assert_eq!(registry.resolve(&tx, "metadata.custom.risk.tier.deeper"), Value::Null);
    }

    #[test]
    fn test_unknown_paths() {
        let registry = FieldRegistry::standard();
        let tx = transaction();

        assert_eq!(registry.resolve(&tx, "does.not.exist"), Value::Null);
        assert!(!registry.is_known("does.not.exist"));
        assert!(!registry.is_known("metadata.custom"));
        assert!(registry.is_known("metadata.custom.anything"));
        assert!(registry.is_known("metadata.geolocation.country"));
    }

    #[test]
    fn test_register_custom_extractor() {
        let mut registry = FieldRegistry::standard();
        registry.register("amountCents", |tx| (tx.amount_f64() * 100.0).into());

        assert_eq!(registry.resolve(&transaction(), "amount_cents"), Value::Number(12550.0));
    }
}
