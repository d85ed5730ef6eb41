//! Named queries over question variations
//!
//! The backfill and the admin control panel go through these operations
//! instead of composing their own SQL.

use sqlx::{Pool, Row, Sqlite, Transaction};

use crate::db::models::QuestionVariation;
use crate::{Error, Result};

/// Optional filters for the control-panel listing
#[derive(Debug, Default, Clone)]
pub struct VariationFilter {
    pub specialty: Option<String>,
    pub topic: Option<String>,
    /// Matches a diagnosis label on any of the variation's sweep results
    pub label: Option<String>,
}

const SELECT_COLUMNS: &str = "v.guid, v.base_question_id, v.variation_number, v.version, \
     v.parent_version_id, v.statement, v.options, v.correct_answer, v.explanation, \
     v.specialty, v.topic, v.confidence_score, v.last_qa_date, v.is_visible, v.created_at";

fn variation_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionVariation> {
    let options_json: String = row.try_get("options")?;
    let options = serde_json::from_str(&options_json).unwrap_or_default();

    Ok(QuestionVariation {
        guid: row.try_get("guid")?,
        base_question_id: row.try_get("base_question_id")?,
        variation_number: row.try_get("variation_number")?,
        version: row.try_get("version")?,
        parent_version_id: row.try_get("parent_version_id")?,
        statement: row.try_get("statement")?,
        options,
        correct_answer: row.try_get("correct_answer")?,
        explanation: row.try_get("explanation")?,
        specialty: row.try_get("specialty")?,
        topic: row.try_get("topic")?,
        confidence_score: row.try_get("confidence_score")?,
        last_qa_date: row.try_get("last_qa_date")?,
        is_visible: row.try_get::<i64, _>("is_visible")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_variation(pool: &Pool<Sqlite>, v: &QuestionVariation) -> Result<()> {
    sqlx::query(
        "INSERT INTO question_variations
         (guid, base_question_id, variation_number, version, parent_version_id,
          statement, options, correct_answer, explanation, specialty, topic,
          confidence_score, last_qa_date, is_visible, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&v.guid)
    .bind(v.base_question_id)
    .bind(v.variation_number)
    .bind(v.version)
    .bind(&v.parent_version_id)
    .bind(&v.statement)
    .bind(serde_json::to_string(&v.options).unwrap_or_else(|_| "[]".to_string()))
    .bind(&v.correct_answer)
    .bind(&v.explanation)
    .bind(&v.specialty)
    .bind(&v.topic)
    .bind(v.confidence_score)
    .bind(&v.last_qa_date)
    .bind(v.is_visible as i64)
    .bind(&v.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_variation(pool: &Pool<Sqlite>, guid: &str) -> Result<Option<QuestionVariation>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM question_variations v WHERE v.guid = ?",
        SELECT_COLUMNS
    ))
    .bind(guid)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(variation_from_row).transpose()
}

/// Variations with a null score that have at least one scored direct result
pub async fn find_unscored_with_direct_result(pool: &Pool<Sqlite>) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT v.guid FROM question_variations v
         WHERE v.confidence_score IS NULL
           AND EXISTS (SELECT 1 FROM qa_sweep_results r
                       WHERE r.variation_id = v.guid
                         AND r.confidence_score IS NOT NULL)
         ORDER BY v.created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(guid,)| guid).collect())
}

/// Corrections (parent set) still lacking a score and any scored direct result
pub async fn find_unscored_corrections(pool: &Pool<Sqlite>) -> Result<Vec<QuestionVariation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM question_variations v
         WHERE v.confidence_score IS NULL
           AND v.parent_version_id IS NOT NULL
           AND NOT EXISTS (SELECT 1 FROM qa_sweep_results r
                           WHERE r.variation_id = v.guid
                             AND r.confidence_score IS NOT NULL)
         ORDER BY v.created_at",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(variation_from_row).collect()
}

/// First version (version = 1) of a `(base_question_id, variation_number)` lineage
pub async fn find_lineage_root(
    pool: &Pool<Sqlite>,
    base_question_id: i64,
    variation_number: i64,
) -> Result<Option<QuestionVariation>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM question_variations v
         WHERE v.base_question_id = ? AND v.variation_number = ? AND v.version = 1
         LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(base_question_id)
    .bind(variation_number)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(variation_from_row).transpose()
}

/// Write a derived confidence score and QA date onto a variation
pub async fn update_confidence(
    pool: &Pool<Sqlite>,
    guid: &str,
    score: f64,
    last_qa_date: &str,
) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE question_variations SET confidence_score = ?, last_qa_date = ? WHERE guid = ?",
    )
    .bind(score)
    .bind(last_qa_date)
    .bind(guid)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!("Variation {}", guid)));
    }
    Ok(())
}

/// Apply one field-level patch edit inside an open transaction
///
/// Recognized fields: `statement`, `correct_answer`, `explanation` and
/// `option:<index>`. Anything else is a malformed patch.
pub async fn apply_edit(
    tx: &mut Transaction<'_, Sqlite>,
    variation_id: &str,
    field: &str,
    proposed_value: &serde_json::Value,
) -> Result<()> {
    let value = value_as_string(proposed_value)?;

    let column = match field {
        "statement" => Some("statement"),
        "correct_answer" => Some("correct_answer"),
        "explanation" => Some("explanation"),
        _ => None,
    };

    if let Some(column) = column {
        let updated = sqlx::query(&format!(
            "UPDATE question_variations SET {} = ? WHERE guid = ?",
            column
        ))
        .bind(&value)
        .bind(variation_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("Variation {}", variation_id)));
        }
        return Ok(());
    }

    if let Some(index) = field.strip_prefix("option:") {
        let index: usize = index
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid patch field: {}", field)))?;

        let options_json: Option<(String,)> =
            sqlx::query_as("SELECT options FROM question_variations WHERE guid = ?")
                .bind(variation_id)
                .fetch_optional(&mut **tx)
                .await?;

        let (options_json,) = options_json
            .ok_or_else(|| Error::NotFound(format!("Variation {}", variation_id)))?;

        let mut options: Vec<String> = serde_json::from_str(&options_json).unwrap_or_default();
        if index >= options.len() {
            return Err(Error::InvalidInput(format!(
                "Patch targets option {} but variation has {} options",
                index,
                options.len()
            )));
        }
        options[index] = value;

        sqlx::query("UPDATE question_variations SET options = ? WHERE guid = ?")
            .bind(serde_json::to_string(&options).unwrap_or_else(|_| "[]".to_string()))
            .bind(variation_id)
            .execute(&mut **tx)
            .await?;
        return Ok(());
    }

    Err(Error::InvalidInput(format!("Invalid patch field: {}", field)))
}

/// Stamp a variation's QA date inside an open transaction
pub async fn touch_last_qa_date(
    tx: &mut Transaction<'_, Sqlite>,
    variation_id: &str,
    when: &str,
) -> Result<()> {
    sqlx::query("UPDATE question_variations SET last_qa_date = ? WHERE guid = ?")
        .bind(when)
        .bind(variation_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn filter_clause(filter: &VariationFilter) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(specialty) = &filter.specialty {
        conditions.push("v.specialty = ?");
        binds.push(specialty.clone());
    }
    if let Some(topic) = &filter.topic {
        conditions.push("v.topic = ?");
        binds.push(topic.clone());
    }
    if let Some(label) = &filter.label {
        conditions.push(
            "EXISTS (SELECT 1 FROM qa_sweep_results r
                     WHERE r.variation_id = v.guid AND r.diagnosis LIKE ?)",
        );
        // Labels are stored inside the diagnosis JSON as quoted strings
        binds.push(format!("%\"{}\"%", label.replace(['%', '_', '"'], "")));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (where_clause, binds)
}

/// Total rows matching the control-panel filter
pub async fn count_variations(pool: &Pool<Sqlite>, filter: &VariationFilter) -> Result<i64> {
    let (where_clause, binds) = filter_clause(filter);
    let count_sql = format!("SELECT COUNT(*) FROM question_variations v{}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    Ok(count_query.fetch_one(pool).await?)
}

/// One page of the control-panel listing, newest first
pub async fn list_variations(
    pool: &Pool<Sqlite>,
    filter: &VariationFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<QuestionVariation>> {
    let (where_clause, binds) = filter_clause(filter);
    let page_sql = format!(
        "SELECT {} FROM question_variations v{} ORDER BY v.created_at DESC LIMIT ? OFFSET ?",
        SELECT_COLUMNS, where_clause
    );
    let mut page_query = sqlx::query(&page_sql);
    for bind in &binds {
        page_query = page_query.bind(bind);
    }
    let rows = page_query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.iter().map(variation_from_row).collect()
}

/// Bulk delete; returns the number of rows removed
pub async fn delete_variations(pool: &Pool<Sqlite>, guids: &[String]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut deleted = 0u64;
    for guid in guids {
        deleted += sqlx::query("DELETE FROM question_variations WHERE guid = ?")
            .bind(guid)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(deleted)
}

/// Confidence scores of all visible variations (for distribution reports)
pub async fn visible_scores(pool: &Pool<Sqlite>) -> Result<Vec<Option<f64>>> {
    let rows: Vec<(Option<f64>,)> = sqlx::query_as(
        "SELECT confidence_score FROM question_variations WHERE is_visible = 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(score,)| score).collect())
}

fn value_as_string(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::InvalidInput(format!(
            "Patch value must be a scalar, got: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn insert_and_get_roundtrip() {
        let pool = setup_test_db().await;

        let mut v = QuestionVariation::new(101, 1, "¿Cuál es el diagnóstico más probable?");
        v.options = vec!["A".into(), "B".into(), "C".into()];
        v.correct_answer = "B".into();
        v.specialty = Some("Medicina Interna".into());
        insert_variation(&pool, &v).await.unwrap();

        let loaded = get_variation(&pool, &v.guid).await.unwrap().unwrap();
        assert_eq!(loaded.base_question_id, 101);
        assert_eq!(loaded.options, vec!["A", "B", "C"]);
        assert_eq!(loaded.specialty.as_deref(), Some("Medicina Interna"));
        assert!(loaded.confidence_score.is_none());
    }

    #[tokio::test]
    async fn lineage_root_is_version_one() {
        let pool = setup_test_db().await;

        let v1 = QuestionVariation::new(7, 2, "v1");
        insert_variation(&pool, &v1).await.unwrap();

        let mut v2 = QuestionVariation::new(7, 2, "v2");
        v2.version = 2;
        v2.parent_version_id = Some(v1.guid.clone());
        insert_variation(&pool, &v2).await.unwrap();

        let root = find_lineage_root(&pool, 7, 2).await.unwrap().unwrap();
        assert_eq!(root.guid, v1.guid);

        assert!(find_lineage_root(&pool, 7, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_confidence_requires_existing_row() {
        let pool = setup_test_db().await;

        let v = QuestionVariation::new(1, 1, "q");
        insert_variation(&pool, &v).await.unwrap();

        update_confidence(&pool, &v.guid, 0.85, "2026-01-01T00:00:00+00:00")
            .await
            .unwrap();
        let loaded = get_variation(&pool, &v.guid).await.unwrap().unwrap();
        assert_eq!(loaded.confidence_score, Some(0.85));

        let missing = update_confidence(&pool, "no-such-guid", 0.5, "2026-01-01T00:00:00+00:00").await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn apply_edit_rejects_unknown_field() {
        let pool = setup_test_db().await;

        let v = QuestionVariation::new(1, 1, "q");
        insert_variation(&pool, &v).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let result = apply_edit(&mut tx, &v.guid, "difficulty", &serde_json::json!("x")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn apply_edit_updates_option_by_index() {
        let pool = setup_test_db().await;

        let mut v = QuestionVariation::new(1, 1, "q");
        v.options = vec!["uno".into(), "dos".into()];
        insert_variation(&pool, &v).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        apply_edit(&mut tx, &v.guid, "option:1", &serde_json::json!("corregido"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let loaded = get_variation(&pool, &v.guid).await.unwrap().unwrap();
        assert_eq!(loaded.options, vec!["uno", "corregido"]);

        // Out-of-range index is a malformed patch
        let mut tx = pool.begin().await.unwrap();
        let result = apply_edit(&mut tx, &v.guid, "option:5", &serde_json::json!("x")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn list_variations_filters_and_counts() {
        let pool = setup_test_db().await;

        for i in 0..3 {
            let mut v = QuestionVariation::new(i, 1, format!("q{}", i));
            v.specialty = Some(if i == 0 { "Pediatría" } else { "Cirugía" }.into());
            insert_variation(&pool, &v).await.unwrap();
        }

        let filter = VariationFilter {
            specialty: Some("Cirugía".into()),
            ..Default::default()
        };
        assert_eq!(count_variations(&pool, &filter).await.unwrap(), 2);
        let page = list_variations(&pool, &filter, 10, 0).await.unwrap();
        assert_eq!(page.len(), 2);

        let all = VariationFilter::default();
        assert_eq!(count_variations(&pool, &all).await.unwrap(), 3);
        let page = list_variations(&pool, &all, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn delete_variations_reports_count() {
        let pool = setup_test_db().await;

        let a = QuestionVariation::new(1, 1, "a");
        let b = QuestionVariation::new(2, 1, "b");
        insert_variation(&pool, &a).await.unwrap();
        insert_variation(&pool, &b).await.unwrap();

        let deleted = delete_variations(&pool, &[a.guid.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(get_variation(&pool, &a.guid).await.unwrap().is_none());
        assert!(get_variation(&pool, &b.guid).await.unwrap().is_some());
    }
}
