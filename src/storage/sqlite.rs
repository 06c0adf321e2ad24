//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use crate::Result;
use crate::id::RecordId;
use crate::model::{Email, Leak, Relation};
use super::{schema, LeakStore};

const LEAK_COLUMNS: &str = "SELECT id, name FROM leaks";
const EMAIL_COLUMNS: &str = "SELECT id, email, domain, created_at, updated_at FROM emails";
const RELATION_COLUMNS: &str = "SELECT leak_id, email_id, domain FROM leak_email_relations";

/// SQLite-backed leak store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing database file read-only.
    ///
    /// A missing file is an error: this layer never creates leak data.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!("Opened {} read-only", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory database with the schema applied (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create a writable database file with the schema applied (for testing)
    #[cfg(test)]
    pub(crate) fn create_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn query_leaks(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Leak>> {
        let mut stmt = self.conn.prepare(sql)?;
        let leaks = stmt
            .query_map(params, row_to_leak)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(leaks)
    }

    fn query_relations(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let relations = stmt
            .query_map(params, row_to_relation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(relations)
    }

    fn query_email(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Email>> {
        self.conn
            .query_row(sql, params, row_to_email)
            .optional()
            .map_err(Into::into)
    }

    fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            leaks: self.count("leaks")?,
            emails: self.count("emails")?,
            relations: self.count("leak_email_relations")?,
        })
    }
}

impl LeakStore for SqliteStore {
    fn find_all_leaks(&self) -> Result<Vec<Leak>> {
        self.query_leaks(LEAK_COLUMNS, [])
    }

    fn find_leak_by_id(&self, id: &RecordId) -> Result<Option<Leak>> {
        self.conn
            .query_row(&format!("{} WHERE id = ?1", LEAK_COLUMNS), [id], row_to_leak)
            .optional()
            .map_err(Into::into)
    }

    fn find_email_by_id(&self, id: &RecordId) -> Result<Option<Email>> {
        self.query_email(&format!("{} WHERE id = ?1", EMAIL_COLUMNS), [id])
    }

    fn find_email_by_address(&self, address: &str) -> Result<Option<Email>> {
        self.query_email(&format!("{} WHERE email = ?1", EMAIL_COLUMNS), [address])
    }

    fn find_relations_by_leak(&self, leak_id: &RecordId) -> Result<Vec<Relation>> {
        self.query_relations(&format!("{} WHERE leak_id = ?1", RELATION_COLUMNS), [leak_id])
    }

    fn find_relations_by_email(&self, email_id: &RecordId) -> Result<Vec<Relation>> {
        self.query_relations(&format!("{} WHERE email_id = ?1", RELATION_COLUMNS), [email_id])
    }

    fn find_relations_by_domain(&self, domain: &str) -> Result<Vec<Relation>> {
        self.query_relations(&format!("{} WHERE domain = ?1", RELATION_COLUMNS), [domain])
    }

    fn find_relations_by_domain_and_leak(
        &self,
        domain: &str,
        leak_id: &RecordId,
    ) -> Result<Vec<Relation>> {
        self.query_relations(
            &format!("{} WHERE domain = ?1 AND leak_id = ?2", RELATION_COLUMNS),
            params![domain, leak_id],
        )
    }
}

fn row_to_leak(row: &rusqlite::Row) -> rusqlite::Result<Leak> {
    Ok(Leak {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn row_to_email(row: &rusqlite::Row) -> rusqlite::Result<Email> {
    Ok(Email {
        id: row.get(0)?,
        address: row.get(1)?,
        domain: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn row_to_relation(row: &rusqlite::Row) -> rusqlite::Result<Relation> {
    Ok(Relation {
        leak_id: row.get(0)?,
        email_id: row.get(1)?,
        domain: row.get(2)?,
    })
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub leaks: usize,
    pub emails: usize,
    pub relations: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Leaks: {}", self.leaks)?;
        writeln!(f, "  Emails: {}", self.emails)?;
        writeln!(f, "  Relations: {}", self.relations)
    }
}
