//! Result assembly - leak reports and the lazy stream that produces them
//!
//! A query resolves its leak list up front, then hydrates each leak's
//! emails only when the consumer asks for the next report. Draining the
//! stream gives the buffered answer; pulling item by item gives the
//! streamed one. Dropping the stream stops all further lookups.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::id::RecordId;
use crate::model::{Email, Leak, QueryKey};
use crate::query::Resolver;
use crate::storage::LeakStore;

/// One email as it appears inside a leak report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEntry {
    pub email: String,
    pub domain: String,
    /// Epoch seconds
    pub first_occurrence_ts: i64,
    /// Epoch seconds
    pub last_occurrence_ts: i64,
}

impl From<&Email> for EmailEntry {
    fn from(email: &Email) -> Self {
        Self {
            email: email.address.clone(),
            domain: email.domain.clone(),
            first_occurrence_ts: email.first_seen(),
            last_occurrence_ts: email.last_seen(),
        }
    }
}

/// A leak with its nested emails, the externally visible unit of output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    pub id: RecordId,
    pub name: String,
    pub email_count: u64,
    pub emails: Vec<EmailEntry>,
}

impl LeakReport {
    pub fn assemble(leak: Leak, emails: &[Email]) -> Self {
        let emails: Vec<EmailEntry> = emails.iter().map(EmailEntry::from).collect();
        Self {
            id: leak.id,
            name: leak.name,
            email_count: emails.len() as u64,
            emails,
        }
    }
}

/// Which emails get nested under each leak
#[derive(Debug, Clone)]
enum EmailScope {
    /// Every email related to the leak
    Leak,
    /// Only the leak's emails in one domain
    Domain(String),
    /// The one email the query started from
    Single(Email),
}

/// Lazy sequence of leak reports.
///
/// Yields `Err` at most once; after an error the stream is exhausted and
/// the reports already yielded should be discarded by buffered consumers.
pub struct LeakStream<S> {
    resolver: Resolver<S>,
    pending: VecDeque<Leak>,
    scope: EmailScope,
    failed: bool,
}

impl<S: LeakStore> LeakStream<S> {
    /// Leaks still waiting for hydration
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Buffered consumption: every report, or the first error
    pub fn collect_all(self) -> Result<Vec<LeakReport>> {
        self.collect()
    }

    fn hydrate(&self, leak: &Leak) -> Result<Vec<Email>> {
        match &self.scope {
            EmailScope::Leak => self.resolver.emails_by_leak(&leak.id),
            EmailScope::Domain(domain) => self.resolver.emails_by_domain_and_leak(domain, &leak.id),
            EmailScope::Single(email) => Ok(vec![email.clone()]),
        }
    }
}

impl<S: LeakStore> Iterator for LeakStream<S> {
    type Item = Result<LeakReport>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let leak = self.pending.pop_front()?;

        match self.hydrate(&leak) {
            Ok(emails) => Some(Ok(LeakReport::assemble(leak, &emails))),
            Err(e) => {
                self.failed = true;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.pending.len()))
        }
    }
}

impl<S: LeakStore> FusedIterator for LeakStream<S> {}

/// Entry point for transports: turns a [`QueryKey`] into a [`LeakStream`]
pub struct LeakService<S> {
    resolver: Resolver<S>,
}

impl<S: LeakStore> LeakService<S> {
    pub fn new(store: S) -> Self {
        Self { resolver: Resolver::new(store) }
    }

    /// Resolve the leak side of `key` now; emails are hydrated lazily.
    ///
    /// Errors that decide the whole answer (unknown address, unknown leak,
    /// failing leak scan) surface here, before the first report.
    pub fn query(self, key: &QueryKey) -> Result<LeakStream<S>> {
        tracing::debug!(%key, "resolving query");
        let r = &self.resolver;

        let (leaks, scope) = match key {
            QueryKey::All => (r.all_leaks()?, EmailScope::Leak),
            QueryKey::LeakId(id) => (vec![r.leak(id)?], EmailScope::Leak),
            QueryKey::EmailAddress(address) => {
                let email = r.email_by_address(address)?;
                (r.leaks_by_email_id(&email.id)?, EmailScope::Single(email))
            }
            QueryKey::EmailId(id) => {
                let email = r.email(id)?;
                (r.leaks_by_email_id(&email.id)?, EmailScope::Single(email))
            }
            QueryKey::Domain(domain) => (r.leaks_by_domain(domain)?, EmailScope::Domain(domain.clone())),
            QueryKey::DomainAndLeak { domain, leak } => {
                (vec![r.leak(leak)?], EmailScope::Domain(domain.clone()))
            }
        };

        Ok(LeakStream {
            resolver: self.resolver,
            pending: leaks.into(),
            scope,
            failed: false,
        })
    }
}
