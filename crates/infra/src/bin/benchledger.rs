//! Operator CLI.
//!
//! Reads the same configuration as the services (`benchledger.toml`,
//! `BENCHLEDGER__*`, `.env`). Every command except `migrate` acts as the
//! given user and is authorized like any other caller.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use benchledger_core::{TenantId, UserId};
use benchledger_events::InMemoryEventBus;
use benchledger_infra::{AppConfig, PostgresStore, Services};

#[derive(Parser)]
#[command(name = "benchledger")]
#[command(about = "Repair-shop ledger administration")]
#[command(version)]
struct Cli {
    /// Overrides `database.url` from configuration
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the bundled schema (idempotent)
    Migrate,

    /// Print the technician KPI report as JSON
    Kpi {
        #[command(flatten)]
        caller: Caller,

        /// Report month is the one containing this instant (RFC 3339, default now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Print dashboard figures as JSON
    Dashboard {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Print accounts waiting for approval as JSON
    PendingUsers {
        #[command(flatten)]
        caller: Caller,
    },
}

#[derive(clap::Args)]
struct Caller {
    #[arg(long)]
    tenant: TenantId,

    /// Acting user; must be active
    #[arg(long)]
    user: UserId,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }
    benchledger_observability::init_with(&config.log);

    let store = PostgresStore::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    let services = Services::from_config(&config, store, Arc::new(InMemoryEventBus::new()));

    match cli.command {
        Commands::Migrate => {
            services
                .store()
                .migrate()
                .await
                .context("failed to apply migrations")?;
            tracing::info!(
                max_connections = config.database.max_connections,
                "schema is up to date"
            );
            Ok(())
        }
        Commands::Kpi { caller, as_of } => {
            let principal = services.principal(caller.tenant, caller.user).await?;
            let rows = services
                .get_kpi_data(&principal, as_of.unwrap_or_else(Utc::now))
                .await?;
            print_json(&rows)
        }
        Commands::Dashboard { caller, as_of } => {
            let principal = services.principal(caller.tenant, caller.user).await?;
            let stats = services
                .get_dashboard_stats(&principal, as_of.unwrap_or_else(Utc::now))
                .await?;
            print_json(&stats)
        }
        Commands::PendingUsers { caller } => {
            let principal = services.principal(caller.tenant, caller.user).await?;
            print_json(&services.list_pending_users(&principal).await?)
        }
    }
}
