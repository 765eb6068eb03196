//! Blacklist/whitelist check contract

use crate::error::Result;
use async_trait::async_trait;
use fraudlens_core::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the check a list belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Blacklist,
    Whitelist,
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListType::Blacklist => f.write_str("blacklist"),
            ListType::Whitelist => f.write_str("whitelist"),
        }
    }
}

/// Transaction identity a list is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    User,
    Email,
    EmailDomain,
    Ip,
    Device,
    PaymentMethod,
    Country,
    Merchant,
}

impl ListKind {
    /// Every kind, in check order
    pub const ALL: [ListKind; 8] = [
        ListKind::User,
        ListKind::Email,
        ListKind::EmailDomain,
        ListKind::Ip,
        ListKind::Device,
        ListKind::PaymentMethod,
        ListKind::Country,
        ListKind::Merchant,
    ];

    /// Kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::User => "user",
            ListKind::Email => "email",
            ListKind::EmailDomain => "email_domain",
            ListKind::Ip => "ip",
            ListKind::Device => "device",
            ListKind::PaymentMethod => "payment_method",
            ListKind::Country => "country",
            ListKind::Merchant => "merchant",
        }
    }

    /// Parse a kind name
    pub fn parse(name: &str) -> Option<Self> {
        ListKind::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// The transaction's value for this kind
    pub fn extract(&self, tx: &Transaction) -> Option<String> {
        match self {
            ListKind::User => tx.user_id.clone(),
            ListKind::Email => tx.metadata.email.clone(),
            ListKind::EmailDomain => tx.email_domain(),
            ListKind::Ip => tx.metadata.ip_address.clone(),
            ListKind::Device => tx.metadata.device_fingerprint.clone(),
            ListKind::PaymentMethod => tx.payment_method_id.clone(),
            ListKind::Country => tx.metadata.geolocation.as_ref().map(|g| g.country.clone()),
            ListKind::Merchant => tx.metadata.merchant_id.clone(),
        }
        .filter(|v| !v.trim().is_empty())
    }

    /// Backend list ID for this kind on the given side, e.g. `blacklist:ip`
    pub fn list_id(&self, list_type: ListType) -> String {
        format!("{}:{}", list_type, self.as_str())
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One list hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMatch {
    pub kind: ListKind,
    pub value: String,
}

/// Outcome of a blacklist or whitelist check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCheckResult {
    pub matched: bool,
    pub matches: Vec<ListMatch>,
}

impl ListCheckResult {
    /// Build a result from the hits found
    pub fn from_matches(matches: Vec<ListMatch>) -> Self {
        Self {
            matched: !matches.is_empty(),
            matches,
        }
    }

    /// Kinds that matched, comma separated
    pub fn describe(&self) -> String {
        self.matches
            .iter()
            .map(|m| m.kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Blacklist/whitelist collaborator consulted before any signal generation
#[async_trait]
pub trait ListChecker: Send + Sync {
    /// Check the transaction's identities against the blacklists
    async fn check_blacklist(&self, tx: &Transaction) -> Result<ListCheckResult>;

    /// Check the transaction's identities against the whitelists
    async fn check_whitelist(&self, tx: &Transaction) -> Result<ListCheckResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_core::Geolocation;
    use rust_decimal::Decimal;

    #[test]
    fn test_extract_values() {
        let tx = Transaction::new("t1", Decimal::new(10, 0), "USD")
            .with_user("u1")
            .with_email("Jane@Example.com")
            .with_geolocation(Geolocation::new("NG"));

        assert_eq!(ListKind::User.extract(&tx), Some("u1".to_string()));
        assert_eq!(ListKind::EmailDomain.extract(&tx), Some("example.com".to_string()));
        assert_eq!(ListKind::Country.extract(&tx), Some("NG".to_string()));
        assert_eq!(ListKind::Ip.extract(&tx), None);
    }

    #[test]
    fn test_list_id_and_parse() {
        assert_eq!(ListKind::Ip.list_id(ListType::Blacklist), "blacklist:ip");
        assert_eq!(ListKind::parse("email_domain"), Some(ListKind::EmailDomain));
        assert_eq!(ListKind::parse("phone"), None);
    }
}
