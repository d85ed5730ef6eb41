//! Named queries over QA sweep runs

use serde::Serialize;
use sqlx::{Pool, Row, Sqlite};

use crate::db::models::{QaSweepRun, RunStatus};
use crate::{Error, Result};

/// Run row joined with aggregate result statistics
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub guid: String,
    pub name: String,
    pub status: String,
    pub created_at: String,
    pub result_count: i64,
    pub mean_confidence: Option<f64>,
    pub tokens_in: i64,
    pub tokens_out: i64,
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QaSweepRun> {
    let config_json: String = row.try_get("config")?;
    let config = serde_json::from_str(&config_json).unwrap_or(serde_json::Value::Null);

    Ok(QaSweepRun {
        guid: row.try_get("guid")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        config,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
    })
}

pub async fn insert_run(pool: &Pool<Sqlite>, run: &QaSweepRun) -> Result<()> {
    sqlx::query(
        "INSERT INTO qa_sweep_runs
         (guid, name, description, status, config, created_at, started_at, ended_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&run.guid)
    .bind(&run.name)
    .bind(&run.description)
    .bind(&run.status)
    .bind(serde_json::to_string(&run.config).unwrap_or_else(|_| "{}".to_string()))
    .bind(&run.created_at)
    .bind(&run.started_at)
    .bind(&run.ended_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// All runs newest first, each with aggregate result statistics
pub async fn list_runs_with_stats(pool: &Pool<Sqlite>) -> Result<Vec<RunStats>> {
    let rows = sqlx::query(
        "SELECT g.guid, g.name, g.status, g.created_at,
                COUNT(r.guid) AS result_count,
                AVG(r.confidence_score) AS mean_confidence,
                COALESCE(SUM(r.tokens_in), 0) AS tokens_in,
                COALESCE(SUM(r.tokens_out), 0) AS tokens_out
         FROM qa_sweep_runs g
         LEFT JOIN qa_sweep_results r ON r.run_id = g.guid
         GROUP BY g.guid
         ORDER BY g.created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(RunStats {
                guid: row.try_get("guid")?,
                name: row.try_get("name")?,
                status: row.try_get("status")?,
                created_at: row.try_get("created_at")?,
                result_count: row.try_get("result_count")?,
                mean_confidence: row.try_get("mean_confidence")?,
                tokens_in: row.try_get("tokens_in")?,
                tokens_out: row.try_get("tokens_out")?,
            })
        })
        .collect()
}

/// Runs stuck in RUNNING with no result activity since the cutoff
///
/// A run with no results at all falls back to its start (or creation)
/// timestamp.
pub async fn find_stale_running(pool: &Pool<Sqlite>, cutoff: &str) -> Result<Vec<QaSweepRun>> {
    let rows = sqlx::query(
        "SELECT guid, name, description, status, config, created_at, started_at, ended_at
         FROM qa_sweep_runs g
         WHERE g.status = 'RUNNING'
           AND COALESCE((SELECT MAX(r.created_at) FROM qa_sweep_results r WHERE r.run_id = g.guid),
                        COALESCE(g.started_at, g.created_at)) < ?
         ORDER BY g.created_at",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}

/// Transition a run to FAILED, stamping its end time
pub async fn mark_run_failed(pool: &Pool<Sqlite>, guid: &str, ended_at: &str) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE qa_sweep_runs SET status = ?, ended_at = ? WHERE guid = ?",
    )
    .bind(RunStatus::Failed.as_str())
    .bind(ended_at)
    .bind(guid)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!("Run {}", guid)));
    }
    Ok(())
}

/// Run counts grouped by status (for the stats report)
pub async fn status_summary(pool: &Pool<Sqlite>) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM qa_sweep_runs GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{QaSweepResult, QuestionVariation};
    use crate::db::{results, variations};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn stats_aggregate_over_results() {
        let pool = setup_test_db().await;

        let mut run = QaSweepRun::new("nightly");
        run.status = RunStatus::Completed.as_str().to_string();
        insert_run(&pool, &run).await.unwrap();

        let v = QuestionVariation::new(1, 1, "q");
        variations::insert_variation(&pool, &v).await.unwrap();

        for score in [0.4, 0.8] {
            let mut r = QaSweepResult::new(&run.guid, &v.guid);
            r.confidence_score = Some(score);
            r.tokens_in = 100;
            r.tokens_out = 50;
            results::insert_result(&pool, &r).await.unwrap();
        }

        let stats = list_runs_with_stats(&pool).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].result_count, 2);
        assert!((stats[0].mean_confidence.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(stats[0].tokens_in, 200);
        assert_eq!(stats[0].tokens_out, 100);
    }

    #[tokio::test]
    async fn stale_detection_uses_latest_activity() {
        let pool = setup_test_db().await;

        let mut stuck = QaSweepRun::new("stuck");
        stuck.status = RunStatus::Running.as_str().to_string();
        stuck.started_at = Some("2026-01-01T00:00:00+00:00".to_string());
        insert_run(&pool, &stuck).await.unwrap();

        let mut active = QaSweepRun::new("active");
        active.status = RunStatus::Running.as_str().to_string();
        active.started_at = Some("2026-01-01T00:00:00+00:00".to_string());
        insert_run(&pool, &active).await.unwrap();

        let v = QuestionVariation::new(1, 1, "q");
        variations::insert_variation(&pool, &v).await.unwrap();
        let mut fresh = QaSweepResult::new(&active.guid, &v.guid);
        fresh.created_at = "2026-06-01T12:00:00+00:00".to_string();
        results::insert_result(&pool, &fresh).await.unwrap();

        let stale = find_stale_running(&pool, "2026-06-01T00:00:00+00:00")
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].guid, stuck.guid);

        mark_run_failed(&pool, &stuck.guid, "2026-06-02T00:00:00+00:00")
            .await
            .unwrap();
        let stale = find_stale_running(&pool, "2026-06-01T00:00:00+00:00")
            .await
            .unwrap();
        assert!(stale.is_empty());
    }
}
