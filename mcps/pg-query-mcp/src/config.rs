//! Configuration for pg-query MCP

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::gate::GateMode;

/// Environment variable holding the connection string
pub const DB_URL_ENV: &str = "DB_URL";
/// Environment variable overriding the introspected schema
pub const DB_SCHEMA_ENV: &str = "DB_SCHEMA";
/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "PG_QUERY_CONFIG_PATH";

// ============================================================================
// Configuration Types
// ============================================================================

/// pg-query MCP configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string; `DB_URL` takes precedence
    #[serde(default)]
    pub url: Option<String>,

    /// Schema described by get_database_schema when none is given
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Per-call timeout covering connect and execution
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Run each query inside a rolled-back READ ONLY transaction
    #[serde(default = "default_true")]
    pub read_only_transaction: bool,

    /// Maximum rows returned by execute_query
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_rows() -> usize {
    1000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            schema: default_schema(),
            timeout_secs: default_timeout(),
            read_only_transaction: true,
            max_rows: default_max_rows(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub mode: GateMode,
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from the standard locations, then apply env overrides
    ///
    /// A `.env` file in the working directory is read first. Config is
    /// searched in order:
    /// 1. `PG_QUERY_CONFIG_PATH` env var
    /// 2. `~/.binks/pg-query.toml`
    /// 3. `./pg-query-mcp.toml`
    /// 4. `$XDG_CONFIG_HOME/pg-query-mcp/config.toml`
    /// 5. Default config if none found
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::search().unwrap_or_else(|| {
                tracing::info!("Using default configuration");
                Config::default()
            }),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn search() -> Option<Self> {
        let mut config_paths: Vec<PathBuf> = Vec::new();

        if let Some(home) = dirs::home_dir() {
            config_paths.push(home.join(".binks").join("pg-query.toml"));
        }
        config_paths.push(PathBuf::from("pg-query-mcp.toml"));
        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("pg-query-mcp").join("config.toml"));
        }

        config_paths
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    None
                }
            })
    }

    /// Apply `DB_URL` / `DB_SCHEMA` from `lookup` on top of file values
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(DB_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(schema) = lookup(DB_SCHEMA_ENV).filter(|v| !v.trim().is_empty()) {
            self.database.schema = schema;
        }
    }

    /// The connection string, or an error naming the variable to set
    pub fn database_url(&self) -> Result<&str> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .with_context(|| {
                format!(
                    "{} environment variable is not set. Please set it to your PostgreSQL connection string.",
                    DB_URL_ENV
                )
            })
    }
}

/// Connection string with any password masked, for logging
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}
