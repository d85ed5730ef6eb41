//! Named queries over the human review queue
//!
//! Items are created by the diagnostic process and terminated by an
//! operator approve/reject. The terminating transition is optimistic:
//! it only fires while `fix_status` is still pending, so concurrent
//! decisions on the same item cannot double-apply a patch.

use sqlx::{Pool, Row, Sqlite, Transaction};

use crate::db::models::{FixStatus, ReviewQueueItem, RiskLevel};
use crate::Result;

const SELECT_COLUMNS: &str = "guid, result_id, variation_id, risk_level, labels, critique, \
     patch, fix_status, review_notes, reviewed_at, created_at";

fn item_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ReviewQueueItem> {
    let labels_json: String = row.try_get("labels")?;
    let labels = serde_json::from_str(&labels_json).unwrap_or_default();

    let patch_json: String = row.try_get("patch")?;
    let patch = serde_json::from_str(&patch_json).unwrap_or(serde_json::Value::Null);

    Ok(ReviewQueueItem {
        guid: row.try_get("guid")?,
        result_id: row.try_get("result_id")?,
        variation_id: row.try_get("variation_id")?,
        risk_level: row.try_get("risk_level")?,
        labels,
        critique: row.try_get("critique")?,
        patch,
        fix_status: row.try_get("fix_status")?,
        review_notes: row.try_get("review_notes")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_item(pool: &Pool<Sqlite>, item: &ReviewQueueItem) -> Result<()> {
    sqlx::query(
        "INSERT INTO review_queue_items
         (guid, result_id, variation_id, risk_level, labels, critique, patch,
          fix_status, review_notes, reviewed_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.guid)
    .bind(&item.result_id)
    .bind(&item.variation_id)
    .bind(&item.risk_level)
    .bind(serde_json::to_string(&item.labels).unwrap_or_else(|_| "[]".to_string()))
    .bind(&item.critique)
    .bind(serde_json::to_string(&item.patch).unwrap_or_else(|_| "[]".to_string()))
    .bind(&item.fix_status)
    .bind(&item.review_notes)
    .bind(&item.reviewed_at)
    .bind(&item.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_item(pool: &Pool<Sqlite>, guid: &str) -> Result<Option<ReviewQueueItem>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM review_queue_items WHERE guid = ?",
        SELECT_COLUMNS
    ))
    .bind(guid)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(item_from_row).transpose()
}

/// Pending items newest first, optionally filtered by risk level
pub async fn list_pending(
    pool: &Pool<Sqlite>,
    risk_level: Option<RiskLevel>,
) -> Result<Vec<ReviewQueueItem>> {
    let rows = match risk_level {
        Some(level) => {
            sqlx::query(&format!(
                "SELECT {} FROM review_queue_items
                 WHERE fix_status = 'pending' AND risk_level = ?
                 ORDER BY created_at DESC",
                SELECT_COLUMNS
            ))
            .bind(level.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM review_queue_items
                 WHERE fix_status = 'pending'
                 ORDER BY created_at DESC",
                SELECT_COLUMNS
            ))
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(item_from_row).collect()
}

/// Optimistically transition an item out of pending inside an open transaction
///
/// Returns false when the item was no longer pending (already resolved by a
/// concurrent decision); the caller must roll back.
pub async fn resolve_item(
    tx: &mut Transaction<'_, Sqlite>,
    guid: &str,
    status: FixStatus,
    notes: Option<&str>,
    reviewed_at: &str,
) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE review_queue_items
         SET fix_status = ?, review_notes = ?, reviewed_at = ?
         WHERE guid = ? AND fix_status = 'pending'",
    )
    .bind(status.as_str())
    .bind(notes)
    .bind(reviewed_at)
    .bind(guid)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

/// Item counts grouped by fix status (for the stats report)
pub async fn fix_status_summary(pool: &Pool<Sqlite>) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT fix_status, COUNT(*) FROM review_queue_items GROUP BY fix_status ORDER BY fix_status",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
