//! Records - the three normalized collections and the lookup key
//!
//! - `Leak`: a breach dataset (id, name)
//! - `Email`: one physical address, with first/last seen timestamps
//! - `Relation`: leak ↔ email edge carrying a copy of the email's domain
//!
//! All three are read-only here; ingestion lives elsewhere.

use crate::id::RecordId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A breach dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leak {
    pub id: RecordId,
    pub name: String,
}

/// A single email address observed in one or more leaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: RecordId,
    /// Full address, unique across the collection
    pub address: String,
    /// Domain part of the address, stored redundantly
    pub domain: String,
    /// First time the address was seen
    pub created_at: DateTime<Utc>,
    /// Most recent time the address was seen
    pub updated_at: DateTime<Utc>,
}

impl Email {
    pub fn first_seen(&self) -> i64 {
        self.created_at.timestamp()
    }

    pub fn last_seen(&self) -> i64 {
        self.updated_at.timestamp()
    }
}

/// Many-to-many edge between a leak and an email.
///
/// `domain` always mirrors the referenced email's domain so that domain
/// filters can run without touching the emails collection first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub leak_id: RecordId,
    pub email_id: RecordId,
    pub domain: String,
}

/// Domain part of an address (everything after the last `@`)
pub fn domain_of(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// The supported lookup axes. Built per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKey {
    /// Every leak in the store
    All,
    LeakId(RecordId),
    EmailAddress(String),
    EmailId(RecordId),
    Domain(String),
    DomainAndLeak { domain: String, leak: RecordId },
}

impl QueryKey {
    pub fn leak(id: &str) -> Result<Self> {
        Ok(QueryKey::LeakId(RecordId::parse(id)?))
    }

    pub fn email_address(address: &str) -> Result<Self> {
        Ok(QueryKey::EmailAddress(required("email address", address)?.to_string()))
    }

    pub fn email_id(id: &str) -> Result<Self> {
        Ok(QueryKey::EmailId(RecordId::parse(id)?))
    }

    pub fn domain(domain: &str) -> Result<Self> {
        Ok(QueryKey::Domain(required("domain", domain)?.to_string()))
    }

    pub fn domain_and_leak(domain: &str, leak: &str) -> Result<Self> {
        Ok(QueryKey::DomainAndLeak {
            domain: required("domain", domain)?.to_string(),
            leak: RecordId::parse(leak)?,
        })
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::All => write!(f, "all"),
            QueryKey::LeakId(id) => write!(f, "leak:{}", id),
            QueryKey::EmailAddress(address) => write!(f, "email:{}", address),
            QueryKey::EmailId(id) => write!(f, "email-id:{}", id),
            QueryKey::Domain(domain) => write!(f, "domain:{}", domain),
            QueryKey::DomainAndLeak { domain, leak } => write!(f, "domain:{}+leak:{}", domain, leak),
        }
    }
}

/// Non-blank and taken verbatim: lookups match exactly, so surrounding
/// whitespace is rejected instead of stripped.
pub(crate) fn required<'v>(field: &'static str, value: &'v str) -> Result<&'v str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyInput(field));
    }
    if trimmed.len() != value.len() {
        return Err(Error::InvalidInput(format!("{} {:?} has surrounding whitespace", field, value)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("alice@x.com"), Some("x.com"));
        assert_eq!(domain_of("odd@name@y.org"), Some("y.org"));
        assert_eq!(domain_of("no-at-sign"), None);
        assert_eq!(domain_of("trailing@"), None);
    }

    #[test]
    fn test_query_key_validation() {
        assert!(matches!(QueryKey::domain("  "), Err(Error::EmptyInput("domain"))));
        assert!(matches!(QueryKey::email_address(""), Err(Error::EmptyInput(_))));
        assert!(matches!(QueryKey::leak("not-an-id"), Err(Error::InvalidId(_))));
        assert!(matches!(
            QueryKey::domain_and_leak("x.com", "123"),
            Err(Error::InvalidId(_))
        ));

        let key = QueryKey::domain("x.com").unwrap();
        assert_eq!(key, QueryKey::Domain("x.com".to_string()));
    }

    #[test]
    fn test_surrounding_whitespace_rejected() {
        assert!(matches!(QueryKey::email_address(" a@x.com"), Err(Error::InvalidInput(_))));
        assert!(matches!(QueryKey::domain("x.com\n"), Err(Error::InvalidInput(_))));
        assert!(matches!(
            QueryKey::domain_and_leak(" x.com", "000000000000000000000001"),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(
            QueryKey::email_address("a@x.com").unwrap(),
            QueryKey::EmailAddress("a@x.com".to_string())
        );
    }

    #[test]
    fn test_query_key_display() {
        let key = QueryKey::domain_and_leak("x.com", "000000000000000000000001").unwrap();
        assert_eq!(key.to_string(), "domain:x.com+leak:000000000000000000000001");
        assert_eq!(QueryKey::All.to_string(), "all");
    }
}
