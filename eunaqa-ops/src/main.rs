//! eunaqa-ops - operator maintenance CLI
//!
//! Consolidates the one-off administrative procedures into a single
//! parameterized command. Every invocation opens its own pool, runs one
//! procedure to completion, closes the pool, and exits non-zero on
//! unrecoverable error.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::{Pool, Sqlite};
use tracing::{error, info};

use eunaqa_ops::{apicheck, backfill, diagnose, entitlements, reports, seed};

#[derive(Debug, Parser)]
#[command(name = "eunaqa-ops", version, about = "EUNAQA operator maintenance commands")]
struct Cli {
    /// Root folder holding the database (overrides env and config file)
    #[arg(long)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Populate missing confidence scores from sweep results
    BackfillConfidence {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Consolidated database statistics report
    Stats,
    /// Report (and optionally fail) runs stuck in RUNNING
    DiagnoseRuns {
        /// Minutes without result activity before a run counts as stale
        #[arg(long, default_value_t = 30)]
        stale_minutes: i64,
        /// Transition stale runs to FAILED
        #[arg(long)]
        fail_stale: bool,
    },
    /// Insert the standard package catalog (idempotent)
    SeedCatalog,
    /// Grant a control-package purchase to a user
    GrantPurchase {
        /// User email
        #[arg(long)]
        email: String,
        /// Control package name (see seed-catalog)
        #[arg(long)]
        package: String,
        /// Override the package's unit count
        #[arg(long)]
        units: Option<i64>,
    },
    /// Probe external API connectivity and credentials
    CheckApis {
        /// LLM API base URL
        #[arg(long)]
        llm_base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Connectivity checks run without a database
    if let Command::CheckApis { llm_base_url } = &cli.command {
        let base_url = llm_base_url
            .clone()
            .or_else(|| {
                eunaqa_common::config::load_toml_config()
                    .ok()
                    .and_then(|c| c.llm_base_url)
            })
            .unwrap_or_else(|| apicheck::DEFAULT_LLM_BASE_URL.to_string());
        apicheck::check_llm_api(&base_url).await?;
        return Ok(());
    }

    let root_folder = eunaqa_common::config::resolve_root_folder(cli.root_folder.as_deref());
    let db_path = eunaqa_common::config::ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = eunaqa_common::db::init_database(&db_path).await?;

    // Run the procedure, then release the pool on every exit path
    let outcome = dispatch(&pool, cli.command).await;
    pool.close().await;
    outcome
}

async fn dispatch(pool: &Pool<Sqlite>, command: Command) -> Result<()> {
    match command {
        Command::BackfillConfidence { dry_run } => {
            let report = backfill::run_backfill(pool, dry_run).await?;
            backfill::print_report(&report, dry_run);
        }
        Command::Stats => {
            let report = reports::gather(pool).await?;
            reports::print(&report);
        }
        Command::DiagnoseRuns {
            stale_minutes,
            fail_stale,
        } => {
            let outcome = diagnose::diagnose_runs(pool, stale_minutes, fail_stale).await?;
            diagnose::print_outcome(&outcome, stale_minutes);
        }
        Command::SeedCatalog => {
            let inserted = seed::seed_catalog(pool).await?;
            println!("Seeded {} new package(s)", inserted);
        }
        Command::GrantPurchase {
            email,
            package,
            units,
        } => {
            let summary = entitlements::grant_purchase(pool, &email, &package, units).await?;
            println!(
                "Granted '{}' ({} units) to {} [purchase {}]",
                summary.package_name, summary.total_units, summary.user_email, summary.purchase_guid
            );
            if summary.prior_purchases > 0 {
                println!("User already held {} purchase(s)", summary.prior_purchases);
            }
        }
        Command::CheckApis { .. } => unreachable!("handled before opening the database"),
    }
    Ok(())
}
