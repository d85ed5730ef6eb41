//! Stuck sweep-run diagnosis
//!
//! A run is considered stale when it sits in RUNNING with no result
//! activity inside the window. Reporting is the default; `--fail-stale`
//! additionally transitions the stale runs to FAILED.

use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use eunaqa_common::db::models::QaSweepRun;
use eunaqa_common::db::{self, runs};
use eunaqa_common::Result;

/// Outcome of one diagnosis pass
#[derive(Debug, Clone)]
pub struct DiagnoseOutcome {
    pub stale: Vec<QaSweepRun>,
    /// How many stale runs were transitioned to FAILED
    pub failed: u64,
}

pub async fn diagnose_runs(
    pool: &Pool<Sqlite>,
    stale_minutes: i64,
    fail_stale: bool,
) -> Result<DiagnoseOutcome> {
    let cutoff = (chrono::Utc::now() - chrono::Duration::minutes(stale_minutes)).to_rfc3339();
    let stale = runs::find_stale_running(pool, &cutoff).await?;

    let mut failed = 0u64;
    if fail_stale {
        let now = db::now_rfc3339();
        for run in &stale {
            runs::mark_run_failed(pool, &run.guid, &now).await?;
            failed += 1;
        }
    }

    if stale.is_empty() {
        info!("No stale RUNNING runs (window: {} min)", stale_minutes);
    } else {
        warn!(
            count = stale.len(),
            failed, "Stale RUNNING runs detected"
        );
    }

    Ok(DiagnoseOutcome { stale, failed })
}

pub fn print_outcome(outcome: &DiagnoseOutcome, stale_minutes: i64) {
    if outcome.stale.is_empty() {
        println!("No runs stuck in RUNNING (no activity window: {} min)", stale_minutes);
        return;
    }

    println!("Stale RUNNING runs (no activity for {} min):", stale_minutes);
    for run in &outcome.stale {
        println!(
            "  {}  {:<30} started {}",
            run.guid,
            run.name,
            run.started_at.as_deref().unwrap_or("(never)")
        );
    }
    if outcome.failed > 0 {
        println!("Transitioned {} run(s) to FAILED", outcome.failed);
    } else {
        println!("Re-run with --fail-stale to transition them to FAILED");
    }
}
