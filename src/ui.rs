//! Terminal rendering for the CLI

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Style};
use tabled::{settings::Style as TableStyle, Table, Tabled};

use crate::query::{EmailEntry, LeakReport};

static THEME: OnceLock<Theme> = OnceLock::new();

pub struct Icons;

impl Icons {
    pub const LEAK: &str = "💧";
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const EMPTY: &str = "∅";
    pub const STATS: &str = "📊";
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub dim: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            dim: Style::new().white().dimmed(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            dim: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

pub fn header(icon: &str, text: &str) {
    println!("{} {}", icon, text.style(theme().header.clone()));
}

pub fn success(text: &str) {
    println!("{} {}", Icons::CHECK, text.style(theme().success.clone()));
}

pub fn error(text: &str) {
    eprintln!("{} {}", Icons::CROSS, text.style(theme().error.clone()));
}

pub fn empty(text: &str) {
    println!("{} {}", Icons::EMPTY, text.style(theme().dim.clone()));
}

#[derive(Tabled)]
struct EmailRow {
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "First seen")]
    first_seen: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

fn format_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn email_table(emails: &[EmailEntry]) -> String {
    if emails.is_empty() {
        return String::new();
    }

    let rows: Vec<EmailRow> = emails
        .iter()
        .map(|e| EmailRow {
            email: e.email.clone(),
            domain: e.domain.clone(),
            first_seen: format_ts(e.first_occurrence_ts),
            last_seen: format_ts(e.last_occurrence_ts),
        })
        .collect();

    Table::new(rows).with(TableStyle::rounded()).to_string()
}

/// Print one leak with its emails
pub fn leak(report: &LeakReport) {
    println!();
    println!(
        "{} {} {} {}",
        Icons::LEAK,
        report.name.style(theme().header.clone()),
        format!("({})", report.id).style(theme().dim.clone()),
        format!("{} email(s)", report.email_count).style(theme().dim.clone()),
    );
    let table = email_table(&report.emails);
    if !table.is_empty() {
        println!("{}", table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(0), "1970-01-01 00:00");
        assert_eq!(format_ts(1_600_000_000), "2020-09-13 12:26");
    }

    #[test]
    fn test_email_table() {
        assert!(email_table(&[]).is_empty());

        let table = email_table(&[EmailEntry {
            email: "a@x.com".into(),
            domain: "x.com".into(),
            first_occurrence_ts: 0,
            last_occurrence_ts: 60,
        }]);
        assert!(table.contains("a@x.com"));
        assert!(table.contains("First seen"));
        assert!(table.contains("1970-01-01 00:01"));
    }
}
