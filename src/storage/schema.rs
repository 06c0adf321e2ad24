//! Database schema definitions
//!
//! Ids are 12-byte BLOBs, timestamps are RFC 3339 TEXT.

/// SQL to create the leaks table
pub const CREATE_LEAKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS leaks (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL
)
"#;

/// SQL to create the emails table
pub const CREATE_EMAILS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS emails (
    id BLOB PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create the relations table
/// `domain` duplicates emails.domain so domain filters skip the emails hop
pub const CREATE_RELATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS leak_email_relations (
    leak_id BLOB NOT NULL,
    email_id BLOB NOT NULL,
    domain TEXT NOT NULL,
    PRIMARY KEY (leak_id, email_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_relations_email ON leak_email_relations(email_id)",
    "CREATE INDEX IF NOT EXISTS idx_relations_domain_leak ON leak_email_relations(domain, leak_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_LEAKS_TABLE,
        CREATE_EMAILS_TABLE,
        CREATE_RELATIONS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// The full schema as one script, for `leakwatch schema`
pub fn schema_script() -> String {
    all_schema_statements()
        .into_iter()
        .map(|stmt| format!("{};", stmt.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
