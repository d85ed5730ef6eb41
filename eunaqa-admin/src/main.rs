//! eunaqa-admin - QA admin REST service
//!
//! Serves the review queue and control-panel endpoints consumed by the
//! admin frontend. Binds to localhost only; the frontend proxies to it.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use eunaqa_admin::{build_router, AppState};

/// Default bind address when neither CLI nor config names one
const DEFAULT_BIND: &str = "127.0.0.1:5730";

#[derive(Debug, Parser)]
#[command(name = "eunaqa-admin", version, about = "EUNAQA admin REST service")]
struct Args {
    /// Root folder holding the database (overrides env and config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Bind address (host:port)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting EUNAQA Admin (eunaqa-admin) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let root_folder = eunaqa_common::config::resolve_root_folder(args.root_folder.as_deref());
    let db_path = eunaqa_common::config::ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = eunaqa_common::db::init_database(&db_path).await?;
    info!("✓ Connected to database");

    let bind = args
        .bind
        .or_else(|| {
            eunaqa_common::config::load_toml_config()
                .ok()
                .and_then(|c| c.admin_bind)
        })
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let state = AppState::new(pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("eunaqa-admin listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
