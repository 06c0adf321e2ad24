//! Relation Resolver
//!
//! The store has no joins, so every "by X get Y" question is answered in
//! two phases:
//! 1. Filter: one scan of the relations table on the known side
//! 2. Hydrate: one point lookup per matched relation on the other side
//!
//! All query shapes go through [`Resolver::join`]; they differ only in the
//! relation filter, the side being hydrated, and whether duplicates are
//! dropped. The first failing lookup aborts the whole shape.

use std::collections::HashSet;
use crate::{Error, Result};
use crate::id::RecordId;
use crate::model::{required, Email, Leak, Relation};
use crate::storage::LeakStore;

/// Phase-one predicate over the relations table
#[derive(Debug, Clone, Copy)]
pub enum RelationFilter<'k> {
    Leak(&'k RecordId),
    Email(&'k RecordId),
    Domain(&'k str),
    DomainAndLeak(&'k str, &'k RecordId),
}

impl RelationFilter<'_> {
    fn fetch<S: LeakStore + ?Sized>(&self, store: &S) -> Result<Vec<Relation>> {
        match *self {
            RelationFilter::Leak(id) => store.find_relations_by_leak(id),
            RelationFilter::Email(id) => store.find_relations_by_email(id),
            RelationFilter::Domain(domain) => store.find_relations_by_domain(domain),
            RelationFilter::DomainAndLeak(domain, leak) => {
                store.find_relations_by_domain_and_leak(domain, leak)
            }
        }
    }
}

/// Whether hydrated records may repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dedup {
    /// One record per relation
    PerRelation,
    /// One record per identity
    ByIdentity,
}

/// A record reachable from the far end of a relation.
pub trait Hydrate: Sized {
    const KIND: &'static str;

    /// Id this record type has in the given relation
    fn referenced_by(relation: &Relation) -> &RecordId;

    fn fetch<S: LeakStore + ?Sized>(store: &S, id: &RecordId) -> Result<Option<Self>>;
}

impl Hydrate for Leak {
    const KIND: &'static str = "leak";

    fn referenced_by(relation: &Relation) -> &RecordId {
        &relation.leak_id
    }

    fn fetch<S: LeakStore + ?Sized>(store: &S, id: &RecordId) -> Result<Option<Self>> {
        store.find_leak_by_id(id)
    }
}

impl Hydrate for Email {
    const KIND: &'static str = "email";

    fn referenced_by(relation: &Relation) -> &RecordId {
        &relation.email_id
    }

    fn fetch<S: LeakStore + ?Sized>(store: &S, id: &RecordId) -> Result<Option<Self>> {
        store.find_email_by_id(id)
    }
}

/// Join engine over a [`LeakStore`]
pub struct Resolver<S> {
    store: S,
}

impl<S: LeakStore> Resolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The two-phase join every query shape is built from.
    ///
    /// Identity dedup happens on the relation's reference, before the
    /// lookup: equal ids are the same entity, so a repeat would hydrate to
    /// a record already in the result.
    pub fn join<T: Hydrate>(&self, filter: RelationFilter<'_>, dedup: Dedup) -> Result<Vec<T>> {
        let relations = filter.fetch(&self.store)?;
        tracing::trace!(?filter, relations = relations.len(), kind = T::KIND, "hydrating");

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(relations.len());

        for relation in &relations {
            let id = T::referenced_by(relation);
            if dedup == Dedup::ByIdentity && !seen.insert(*id) {
                continue;
            }

            let record = T::fetch(&self.store, id)?.ok_or_else(|| {
                Error::Integrity(format!(
                    "relation ({}, {}) references missing {} {}",
                    relation.leak_id,
                    relation.email_id,
                    T::KIND,
                    id
                ))
            })?;
            records.push(record);
        }

        Ok(records)
    }

    /// Every leak, unordered
    pub fn all_leaks(&self) -> Result<Vec<Leak>> {
        self.store.find_all_leaks()
    }

    pub fn leak(&self, id: &RecordId) -> Result<Leak> {
        self.store
            .find_leak_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("leak {}", id)))
    }

    pub fn email(&self, id: &RecordId) -> Result<Email> {
        self.store
            .find_email_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("email {}", id)))
    }

    /// Address → email record. An unknown address is `NotFound`.
    pub fn email_by_address(&self, address: &str) -> Result<Email> {
        let address = required("email address", address)?;
        self.store
            .find_email_by_address(address)?
            .ok_or_else(|| Error::NotFound(format!("email address {}", address)))
    }

    /// Emails of one leak, one entry per relation
    pub fn emails_by_leak(&self, leak_id: &RecordId) -> Result<Vec<Email>> {
        self.join(RelationFilter::Leak(leak_id), Dedup::PerRelation)
    }

    /// Leaks mentioning an address, one entry per relation
    pub fn leaks_by_email(&self, address: &str) -> Result<Vec<Leak>> {
        let email = self.email_by_address(address)?;
        self.leaks_by_email_id(&email.id)
    }

    pub fn leaks_by_email_id(&self, email_id: &RecordId) -> Result<Vec<Leak>> {
        self.join(RelationFilter::Email(email_id), Dedup::PerRelation)
    }

    /// Leaks mentioning any address of a domain, each leak once
    pub fn leaks_by_domain(&self, domain: &str) -> Result<Vec<Leak>> {
        let domain = required("domain", domain)?;
        self.join(RelationFilter::Domain(domain), Dedup::ByIdentity)
    }

    pub fn emails_by_domain_and_leak(&self, domain: &str, leak_id: &RecordId) -> Result<Vec<Email>> {
        let domain = required("domain", domain)?;
        self.join(RelationFilter::DomainAndLeak(domain, leak_id), Dedup::PerRelation)
    }
}
