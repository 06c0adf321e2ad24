//! Test-only seeding helpers. The crate has no write path, so fixtures
//! insert rows with raw SQL.

use std::cell::Cell;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;

use super::SqliteStore;
use crate::id::RecordId;
use crate::model::domain_of;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

/// Hands out sequential ids and inserts rows into an in-memory store.
pub(crate) struct Seed<'a> {
    store: &'a SqliteStore,
    next: Cell<u64>,
}

impl<'a> Seed<'a> {
    pub(crate) fn new(store: &'a SqliteStore) -> Self {
        Self { store, next: Cell::new(1) }
    }

    fn next_id(&self) -> RecordId {
        let n = self.next.get();
        self.next.set(n + 1);
        let mut bytes = [0u8; 12];
        bytes[4..].copy_from_slice(&n.to_be_bytes());
        RecordId::from_bytes(bytes)
    }

    pub(crate) fn leak(&self, name: &str) -> RecordId {
        let id = self.next_id();
        self.store
            .conn()
            .execute("INSERT INTO leaks (id, name) VALUES (?1, ?2)", params![id, name])
            .unwrap();
        id
    }

    pub(crate) fn email(&self, address: &str, first: DateTime<Utc>, last: DateTime<Utc>) -> RecordId {
        let id = self.next_id();
        let domain = domain_of(address).unwrap();
        self.store
            .conn()
            .execute(
                "INSERT INTO emails (id, email, domain, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, address, domain, first, last],
            )
            .unwrap();
        id
    }

    /// Relates a leak and an email, copying the email's domain onto the edge
    pub(crate) fn relate(&self, leak: RecordId, email: RecordId) {
        self.store
            .conn()
            .execute(
                "INSERT INTO leak_email_relations (leak_id, email_id, domain)
                 SELECT ?1, id, domain FROM emails WHERE id = ?2",
                params![leak, email],
            )
            .unwrap();
    }

    /// Inserts a relation row verbatim, including ids that reference nothing
    pub(crate) fn raw_relation(&self, leak: RecordId, email: RecordId, domain: &str) {
        self.store
            .conn()
            .execute(
                "INSERT INTO leak_email_relations (leak_id, email_id, domain) VALUES (?1, ?2, ?3)",
                params![leak, email, domain],
            )
            .unwrap();
    }

    pub(crate) fn unused_id(&self) -> RecordId {
        self.next_id()
    }
}

/// Two leaks, two emails, three relations, all under x.com:
/// (L1, E1), (L1, E2), (L2, E1)
pub(crate) struct Scenario {
    pub l1: RecordId,
    pub l2: RecordId,
    pub e1: RecordId,
    pub e2: RecordId,
}

pub(crate) fn scenario(seed: &Seed<'_>) -> Scenario {
    let l1 = seed.leak("L1");
    let l2 = seed.leak("L2");
    let e1 = seed.email("e1@x.com", at(1_600_000_000), at(1_650_000_000));
    let e2 = seed.email("e2@x.com", at(1_610_000_000), at(1_610_000_000));
    seed.relate(l1, e1);
    seed.relate(l1, e2);
    seed.relate(l2, e1);
    Scenario { l1, l2, e1, e2 }
}
