//! Leakwatch CLI - breach lookups from the terminal, or as an HTTP service

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use leakwatch::config::{self, Settings};
use leakwatch::query::{LeakReport, LeakService};
use leakwatch::storage::{schema, SqliteStore};
use leakwatch::ui::{self, Icons};
use leakwatch::QueryKey;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "leakwatch")]
#[command(version)]
#[command(about = "Breach lookup service - which leaks mention an address or a domain")]
#[command(long_about = r#"
Leakwatch answers breach lookups against a normalized leak store:
  • Which leaks mention an email address
  • Which leaks mention any address of a domain
  • Every leak with the emails it exposed

Example usage:
  leakwatch email --address alice@example.com
  leakwatch domain --name example.com --format json
  leakwatch serve --port 8081
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./leakwatch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Colored tables, printed as each leak resolves
    Text,
    /// One JSON document once everything resolved
    Json,
    /// One JSON line per leak, printed as each leak resolves
    Ndjson,
}

#[derive(Args)]
struct QueryArgs {
    /// Path to the database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the lookup API over HTTP
    Serve {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List every leak with its emails
    Leaks {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show one leak with its emails
    Leak {
        /// Leak id (24 hex characters)
        #[arg(long)]
        id: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Find the leaks that mention an email
    Email {
        /// Email address
        #[arg(short, long, required_unless_present = "id", conflicts_with = "id")]
        address: Option<String>,

        /// Email id (24 hex characters)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Find the leaks that mention any address of a domain
    Domain {
        /// Domain name
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// List the emails of one leak within one domain
    Emails {
        /// Domain name
        #[arg(long)]
        domain: String,

        /// Leak id (24 hex characters)
        #[arg(long)]
        leak: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show row counts of the three tables
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Print the table definitions ingestion must create
    Schema,

    /// Write a starter leakwatch.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let file_config = config::load_config(cli.config.as_deref())?;
    let settings_with = |database: Option<PathBuf>| Settings::resolve(file_config.as_ref(), database, None, None);

    match cli.command {
        Commands::Serve { database, host, port } => {
            let settings = Settings::resolve(file_config.as_ref(), database, host, port);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(leakwatch::server::start_server(settings))?;
        }

        Commands::Leaks { query } => {
            run_query(&settings_with(query.database), &QueryKey::All, query.format)?;
        }

        Commands::Leak { id, query } => {
            run_query(&settings_with(query.database), &QueryKey::leak(&id)?, query.format)?;
        }

        Commands::Email { address, id, query } => {
            let key = match (address, id) {
                (Some(address), _) => QueryKey::email_address(&address)?,
                (None, Some(id)) => QueryKey::email_id(&id)?,
                (None, None) => anyhow::bail!("either --address or --id is required"),
            };
            run_query(&settings_with(query.database), &key, query.format)?;
        }

        Commands::Domain { name, query } => {
            run_query(&settings_with(query.database), &QueryKey::domain(&name)?, query.format)?;
        }

        Commands::Emails { domain, leak, query } => {
            let key = QueryKey::domain_and_leak(&domain, &leak)?;
            let settings = settings_with(query.database);
            let store = SqliteStore::open(&settings.database)?;
            let report = LeakService::new(&store)
                .query(&key)?
                .next()
                .transpose()?
                .ok_or_else(|| anyhow::anyhow!("leak {} produced no report", leak))?;

            match query.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report.emails)?),
                OutputFormat::Ndjson => {
                    for email in &report.emails {
                        println!("{}", serde_json::to_string(email)?);
                    }
                }
                OutputFormat::Text => {
                    ui::header(Icons::SEARCH, &format!("{} emails of {} in {}", report.email_count, report.name, domain));
                    if report.emails.is_empty() {
                        ui::empty("No emails found.");
                    } else {
                        println!("{}", ui::email_table(&report.emails));
                    }
                }
            }
        }

        Commands::Stats { database } => {
            let settings = settings_with(database);
            let store = SqliteStore::open(&settings.database)?;
            let stats = store.stats()?;

            ui::header(Icons::STATS, &format!("Leakwatch Statistics ({:?})", settings.database));
            println!("------------------------------------");
            println!("{}", stats);
        }

        Commands::Schema => {
            println!("{}", schema::schema_script());
        }

        Commands::Init { force } => {
            let path = cli.config.clone().unwrap_or_else(config::default_config_path);
            config::write_config(&path, &config::starter_config(), force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}

/// Resolve `key` and print the reports in the requested format.
///
/// Text and NDJSON print each leak as soon as it is hydrated.
fn run_query(settings: &Settings, key: &QueryKey, format: OutputFormat) -> anyhow::Result<()> {
    tracing::debug!("Querying {} for {}", settings.database.display(), key);
    let store = SqliteStore::open(&settings.database)?;
    let stream = LeakService::new(&store).query(key)?;

    match format {
        OutputFormat::Json => {
            let leaks: Vec<LeakReport> = stream.collect_all()?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "leaks": leaks }))?);
        }
        OutputFormat::Ndjson => {
            for report in stream {
                println!("{}", serde_json::to_string(&report?)?);
            }
        }
        OutputFormat::Text => {
            ui::header(Icons::SEARCH, &format!("Leaks for {}", key));
            let mut count = 0;
            for report in stream {
                match report {
                    Ok(report) => {
                        ui::leak(&report);
                        count += 1;
                    }
                    Err(e) => {
                        ui::error(&format!("Lookup aborted after {} leak(s)", count));
                        return Err(e.into());
                    }
                }
            }
            println!();
            if count == 0 {
                ui::empty("No leaks found.");
            } else {
                ui::success(&format!("{} leak(s)", count));
            }
        }
    }

    Ok(())
}
