use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8081;

/// Contents of `leakwatch.toml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LeakwatchConfig {
    pub database: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl LeakwatchConfig {
    /// Reject values that would only fail later, at bind or open time
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(host) = &self.host {
            host.parse::<IpAddr>()
                .map_err(|_| anyhow::anyhow!("host must be an IP address, got {:?}", host))?;
        }
        if self.database.as_deref().is_some_and(|db| db.trim().is_empty()) {
            anyhow::bail!("database path is empty");
        }
        Ok(())
    }
}

/// Process-wide settings, resolved once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Settings {
    /// Flags win over the config file, the config file wins over defaults
    pub fn resolve(
        config: Option<&LeakwatchConfig>,
        database: Option<PathBuf>,
        host: Option<String>,
        port: Option<u16>,
    ) -> Self {
        let file = config.cloned().unwrap_or_default();
        Self {
            database: database
                .or_else(|| file.database.map(PathBuf::from))
                .unwrap_or_else(default_database_path),
            host: host.or(file.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.or(file.port).unwrap_or(DEFAULT_PORT),
        }
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen host {}: {}", self.host, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("leakwatch.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("leakwatch.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<LeakwatchConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    let config: LeakwatchConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;

    tracing::debug!(database = ?config.database, host = ?config.host, port = ?config.port, "Loaded config from {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &LeakwatchConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Starter config written by `leakwatch init`
pub fn starter_config() -> LeakwatchConfig {
    LeakwatchConfig {
        database: Some(default_database_path().display().to_string()),
        host: Some(DEFAULT_HOST.to_string()),
        port: Some(DEFAULT_PORT),
    }
}
