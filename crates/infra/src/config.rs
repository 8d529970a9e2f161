//! Configuration loading and representation.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. an optional `benchledger.toml` in the working directory
//! 3. `BENCHLEDGER__*` environment variables (`__` separates sections, e.g.
//!    `BENCHLEDGER__DATABASE__URL`, `BENCHLEDGER__KPI__SLA_DAYS`,
//!    `BENCHLEDGER__LOG__FILTER`)
//!
//! A `.env` file is read first when present.

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

use benchledger_kpi::KpiConfig;
use benchledger_observability::LogConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. Unset means "use the in-memory store".
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub kpi: KpiConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from("benchledger")
    }

    /// Load using `file_stem` (no extension) as the optional config file.
    pub fn load_from(file_stem: &str) -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(file_stem).required(false))
            .add_source(Environment::with_prefix("BENCHLEDGER").separator("__"))
            .build()
            .context("failed to read configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("failed to parse configuration")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        self.kpi
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid kpi configuration: {e}"))
    }
}
