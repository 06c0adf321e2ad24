//! Storage Layer - the gateway the resolver composes
//!
//! System of record is SQLite with tables:
//! - leaks(id, name)
//! - emails(id, email, domain, created_at, updated_at)
//! - leak_email_relations(leak_id, email_id, domain)
//!
//! The gateway only answers single-table questions. Joins are the
//! resolver's job, which keeps a join-capable backend a drop-in swap.

pub mod schema;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod fixtures;

pub use sqlite::{DbStats, SqliteStore};

use crate::Result;
use crate::id::RecordId;
use crate::model::{Email, Leak, Relation};

/// Single-collection lookups over leaks, emails and relations.
///
/// Point lookups return `Ok(None)` for an absent row so callers can tell
/// "no such record" apart from a failing store. Every method is a pure
/// read and may be called from any number of requests at once.
pub trait LeakStore {
    /// Unordered scan of every leak
    fn find_all_leaks(&self) -> Result<Vec<Leak>>;

    fn find_leak_by_id(&self, id: &RecordId) -> Result<Option<Leak>>;

    fn find_email_by_id(&self, id: &RecordId) -> Result<Option<Email>>;

    /// Exact match on the unique address column
    fn find_email_by_address(&self, address: &str) -> Result<Option<Email>>;

    fn find_relations_by_leak(&self, leak_id: &RecordId) -> Result<Vec<Relation>>;

    fn find_relations_by_email(&self, email_id: &RecordId) -> Result<Vec<Relation>>;

    fn find_relations_by_domain(&self, domain: &str) -> Result<Vec<Relation>>;

    /// Relations matching both the domain and the leak
    fn find_relations_by_domain_and_leak(
        &self,
        domain: &str,
        leak_id: &RecordId,
    ) -> Result<Vec<Relation>>;
}

impl<S: LeakStore + ?Sized> LeakStore for &S {
    fn find_all_leaks(&self) -> Result<Vec<Leak>> {
        (**self).find_all_leaks()
    }

    fn find_leak_by_id(&self, id: &RecordId) -> Result<Option<Leak>> {
        (**self).find_leak_by_id(id)
    }

    fn find_email_by_id(&self, id: &RecordId) -> Result<Option<Email>> {
        (**self).find_email_by_id(id)
    }

    fn find_email_by_address(&self, address: &str) -> Result<Option<Email>> {
        (**self).find_email_by_address(address)
    }

    fn find_relations_by_leak(&self, leak_id: &RecordId) -> Result<Vec<Relation>> {
        (**self).find_relations_by_leak(leak_id)
    }

    fn find_relations_by_email(&self, email_id: &RecordId) -> Result<Vec<Relation>> {
        (**self).find_relations_by_email(email_id)
    }

    fn find_relations_by_domain(&self, domain: &str) -> Result<Vec<Relation>> {
        (**self).find_relations_by_domain(domain)
    }

    fn find_relations_by_domain_and_leak(
        &self,
        domain: &str,
        leak_id: &RecordId,
    ) -> Result<Vec<Relation>> {
        (**self).find_relations_by_domain_and_leak(domain, leak_id)
    }
}
