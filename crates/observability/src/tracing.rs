//! Tracing/logging initialization.
//!
//! `RUST_LOG` always wins over the configured filter.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// The `log` section of the application config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `info,benchledger_infra=debug`.
    pub filter: String,
    /// JSON lines when true, human-readable output otherwise.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

/// Initialize tracing with defaults (JSON, `info`).
pub fn init() -> bool {
    init_with(&LogConfig::default())
}

/// Install the global subscriber.
///
/// Safe to call multiple times; returns `false` when a subscriber was
/// already installed.
pub fn init_with(config: &LogConfig) -> bool {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.filter);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    if installed {
        ::tracing::debug!(filter = %config.filter, json = config.json, "tracing initialized");
    }
    installed
}

// Falls back to `info` when neither source parses.
fn build_filter(env: Option<&str>, configured: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
