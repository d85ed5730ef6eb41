//! Named queries over QA sweep results
//!
//! Many results may reference one variation; the most recent by
//! `created_at` is authoritative for backfill purposes.

use sqlx::{Pool, Row, Sqlite};

use crate::db::models::{Diagnosis, QaSweepResult};
use crate::Result;

const SELECT_COLUMNS: &str = "guid, run_id, variation_id, confidence_score, diagnosis, \
     corrections, status, tokens_in, tokens_out, latency_ms, created_at";

fn result_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QaSweepResult> {
    let diagnosis_json: String = row.try_get("diagnosis")?;
    let diagnosis: Diagnosis = serde_json::from_str(&diagnosis_json).unwrap_or_default();

    let corrections_json: Option<String> = row.try_get("corrections")?;
    let corrections = corrections_json.and_then(|json| serde_json::from_str(&json).ok());

    Ok(QaSweepResult {
        guid: row.try_get("guid")?,
        run_id: row.try_get("run_id")?,
        variation_id: row.try_get("variation_id")?,
        confidence_score: row.try_get("confidence_score")?,
        diagnosis,
        corrections,
        status: row.try_get("status")?,
        tokens_in: row.try_get("tokens_in")?,
        tokens_out: row.try_get("tokens_out")?,
        latency_ms: row.try_get("latency_ms")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_result(pool: &Pool<Sqlite>, r: &QaSweepResult) -> Result<()> {
    sqlx::query(
        "INSERT INTO qa_sweep_results
         (guid, run_id, variation_id, confidence_score, diagnosis, corrections,
          status, tokens_in, tokens_out, latency_ms, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&r.guid)
    .bind(&r.run_id)
    .bind(&r.variation_id)
    .bind(r.confidence_score)
    .bind(serde_json::to_string(&r.diagnosis).unwrap_or_else(|_| "{}".to_string()))
    .bind(
        r.corrections
            .as_ref()
            .map(|c| serde_json::to_string(c).unwrap_or_else(|_| "null".to_string())),
    )
    .bind(&r.status)
    .bind(r.tokens_in)
    .bind(r.tokens_out)
    .bind(r.latency_ms)
    .bind(&r.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent result for a variation, regardless of score
pub async fn find_latest_result_for_variation(
    pool: &Pool<Sqlite>,
    variation_id: &str,
) -> Result<Option<QaSweepResult>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM qa_sweep_results
         WHERE variation_id = ?
         ORDER BY created_at DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(variation_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(result_from_row).transpose()
}

/// Most recent result for a variation that carries a confidence score
pub async fn find_latest_scored_result_for_variation(
    pool: &Pool<Sqlite>,
    variation_id: &str,
) -> Result<Option<QaSweepResult>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM qa_sweep_results
         WHERE variation_id = ? AND confidence_score IS NOT NULL
         ORDER BY created_at DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(variation_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(result_from_row).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{QaSweepRun, QuestionVariation};
    use crate::db::{runs, variations};
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
    async fn latest_result_wins_by_created_at() {
        let pool = setup_test_db().await;

        let run = QaSweepRun::new("sweep");
        runs::insert_run(&pool, &run).await.unwrap();
        let v = QuestionVariation::new(1, 1, "q");
        variations::insert_variation(&pool, &v).await.unwrap();

        let mut older = QaSweepResult::new(&run.guid, &v.guid);
        older.confidence_score = Some(0.2);
        older.created_at = "2026-01-01T00:00:00+00:00".to_string();
        insert_result(&pool, &older).await.unwrap();

        let mut newer = QaSweepResult::new(&run.guid, &v.guid);
        newer.confidence_score = Some(0.9);
        newer.created_at = "2026-02-01T00:00:00+00:00".to_string();
        insert_result(&pool, &newer).await.unwrap();

        let latest = find_latest_result_for_variation(&pool, &v.guid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.guid, newer.guid);
        assert_eq!(latest.confidence_score, Some(0.9));
    }

    #[tokio::test]
    async fn scored_lookup_skips_unscored_results() {
        let pool = setup_test_db().await;

        let run = QaSweepRun::new("sweep");
        runs::insert_run(&pool, &run).await.unwrap();
        let v = QuestionVariation::new(1, 1, "q");
        variations::insert_variation(&pool, &v).await.unwrap();

        let mut scored = QaSweepResult::new(&run.guid, &v.guid);
        scored.confidence_score = Some(0.75);
        scored.created_at = "2026-01-01T00:00:00+00:00".to_string();
        insert_result(&pool, &scored).await.unwrap();

        let mut unscored = QaSweepResult::new(&run.guid, &v.guid);
        unscored.created_at = "2026-02-01T00:00:00+00:00".to_string();
        insert_result(&pool, &unscored).await.unwrap();

        let latest_any = find_latest_result_for_variation(&pool, &v.guid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest_any.guid, unscored.guid);

        let latest_scored = find_latest_scored_result_for_variation(&pool, &v.guid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest_scored.guid, scored.guid);
    }

    #[tokio::test]
    async fn diagnosis_roundtrip() {
        let pool = setup_test_db().await;

        let run = QaSweepRun::new("sweep");
        runs::insert_run(&pool, &run).await.unwrap();
        let v = QuestionVariation::new(1, 1, "q");
        variations::insert_variation(&pool, &v).await.unwrap();

        let mut r = QaSweepResult::new(&run.guid, &v.guid);
        r.diagnosis = Diagnosis {
            severidad_global: Some(2),
            etiquetas: vec!["ambigua".into(), "distractor_debil".into()],
            riesgo: Some("medium".into()),
            decision: Some("review".into()),
        };
        insert_result(&pool, &r).await.unwrap();

        let loaded = find_latest_result_for_variation(&pool, &v.guid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.diagnosis.severidad_global, Some(2));
        assert_eq!(loaded.diagnosis.etiquetas.len(), 2);
    }
}
