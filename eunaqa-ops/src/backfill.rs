//! Confidence backfill over question variations
//!
//! Ensures every variation with a diagnostic history carries a confidence
//! score, without re-running AI diagnosis. Two passes:
//!
//! 1. Direct: variations with their own scored sweep result copy the latest
//!    result's score and date.
//! 2. Inherited: corrections that were never directly diagnosed derive
//!    their score from the parent's last diagnosis severity, falling back
//!    to the lineage's first version when the parent was never diagnosed.
//!
//! Re-runnable: already-scored variations are excluded by the null-score
//! predicate, so a second run performs zero updates. Any single update
//! failure aborts the whole procedure.

use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use eunaqa_common::db::{results, variations};
use eunaqa_common::scoring::{score_from_severity, Distribution};
use eunaqa_common::{Error, Result};

/// Counters from one backfill invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillOutcome {
    /// Variations that copied their own latest scored result
    pub direct_updated: u64,
    /// Corrections that inherited a severity-derived score
    pub inherited_updated: u64,
    /// Corrections with no result anywhere in their lineage
    pub skipped: u64,
}

/// Outcome plus the post-run confidence distribution over visible variations
#[derive(Debug, Clone)]
pub struct BackfillReport {
    pub outcome: BackfillOutcome,
    pub distribution: Distribution,
}

/// Run the backfill; with `dry_run` the counters are computed but nothing
/// is written.
pub async fn run_backfill(pool: &Pool<Sqlite>, dry_run: bool) -> Result<BackfillReport> {
    let mut outcome = BackfillOutcome::default();

    // Pass 1: direct results
    for guid in variations::find_unscored_with_direct_result(pool).await? {
        let result = results::find_latest_scored_result_for_variation(pool, &guid)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "Variation {} lost its scored result during backfill",
                    guid
                ))
            })?;

        let score = result.confidence_score.unwrap_or(0.0);
        debug!(variation = %guid, score, "direct backfill");
        if !dry_run {
            variations::update_confidence(pool, &guid, score, &result.created_at).await?;
        }
        outcome.direct_updated += 1;
    }

    // Pass 2: inherited from the lineage
    for v in variations::find_unscored_corrections(pool).await? {
        let parent_id = match &v.parent_version_id {
            Some(parent_id) => parent_id.clone(),
            None => continue,
        };

        let mut source = results::find_latest_result_for_variation(pool, &parent_id).await?;

        if source.is_none() {
            // Parent never diagnosed: fall back to the lineage's first version
            if let Some(root) =
                variations::find_lineage_root(pool, v.base_question_id, v.variation_number).await?
            {
                if root.guid != v.guid {
                    source = results::find_latest_result_for_variation(pool, &root.guid).await?;
                }
            }
        }

        match source {
            Some(result) => {
                // A correction is assumed to have fixed the flagged defect:
                // confidence improves on the fixed severity schedule.
                // Missing severity counts as 1.
                let severity = result.diagnosis.severidad_global.unwrap_or(1);
                let score = score_from_severity(Some(severity));
                debug!(variation = %v.guid, severity, score, "inherited backfill");
                if !dry_run {
                    variations::update_confidence(pool, &v.guid, score, &result.created_at).await?;
                }
                outcome.inherited_updated += 1;
            }
            None => {
                debug!(variation = %v.guid, "no result anywhere in lineage, skipping");
                outcome.skipped += 1;
            }
        }
    }

    let distribution = Distribution::from_scores(variations::visible_scores(pool).await?);

    info!(
        direct = outcome.direct_updated,
        inherited = outcome.inherited_updated,
        skipped = outcome.skipped,
        dry_run,
        "Backfill complete"
    );

    Ok(BackfillReport {
        outcome,
        distribution,
    })
}

/// Print the operator-facing summary
pub fn print_report(report: &BackfillReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!("{}Backfill summary", prefix);
    println!("  direct-updated:    {}", report.outcome.direct_updated);
    println!("  inherited-updated: {}", report.outcome.inherited_updated);
    println!("  skipped:           {}", report.outcome.skipped);
    println!("Confidence distribution (visible variations)");
    println!("  unscored: {}", report.distribution.unscored);
    println!("  <34%:     {}", report.distribution.low);
    println!("  34-66%:   {}", report.distribution.medium);
    println!("  >=67%:    {}", report.distribution.high);
    println!("  total:    {}", report.distribution.total());
}
