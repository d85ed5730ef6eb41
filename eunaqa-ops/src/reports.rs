//! Consolidated database statistics report
//!
//! One parameterized report replacing the family of ad-hoc check-db-stats
//! scripts this grew out of: table counts, run status summary, review
//! fix-status summary, confidence distribution and purchase integrity.

use sqlx::{Pool, Sqlite};

use eunaqa_common::db::{self, catalog, review_queue, runs, variations};
use eunaqa_common::scoring::Distribution;
use eunaqa_common::Result;

/// Everything the `stats` command reports
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub table_counts: Vec<(&'static str, i64)>,
    pub run_status: Vec<(String, i64)>,
    pub fix_status: Vec<(String, i64)>,
    pub distribution: Distribution,
    /// Purchases whose owning user no longer exists
    pub orphaned_purchases: u64,
}

pub async fn gather(pool: &Pool<Sqlite>) -> Result<StatsReport> {
    let table_counts = db::table_counts(pool).await?;
    let run_status = runs::status_summary(pool).await?;
    let fix_status = review_queue::fix_status_summary(pool).await?;
    let distribution = Distribution::from_scores(variations::visible_scores(pool).await?);
    let orphaned_purchases = catalog::find_orphaned_purchases(pool).await?.len() as u64;

    Ok(StatsReport {
        table_counts,
        run_status,
        fix_status,
        distribution,
        orphaned_purchases,
    })
}

pub fn print(report: &StatsReport) {
    println!("Table counts");
    for (table, count) in &report.table_counts {
        println!("  {:<22} {}", table, count);
    }

    println!("Sweep runs by status");
    if report.run_status.is_empty() {
        println!("  (none)");
    }
    for (status, count) in &report.run_status {
        println!("  {:<22} {}", status, count);
    }

    println!("Review queue by fix status");
    if report.fix_status.is_empty() {
        println!("  (none)");
    }
    for (status, count) in &report.fix_status {
        println!("  {:<22} {}", status, count);
    }

    println!("Confidence distribution (visible variations)");
    println!("  unscored: {}", report.distribution.unscored);
    println!("  <34%:     {}", report.distribution.low);
    println!("  34-66%:   {}", report.distribution.medium);
    println!("  >=67%:    {}", report.distribution.high);
    println!("  total:    {}", report.distribution.total());

    if report.orphaned_purchases > 0 {
        println!(
            "WARNING: {} purchase(s) reference a missing user",
            report.orphaned_purchases
        );
    }
}
