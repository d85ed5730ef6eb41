//! Database initialization and named queries
//!
//! One `SqlitePool` is constructed at startup and passed explicitly into
//! every procedure; there are no module-level connection singletons.

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

pub mod catalog;
pub mod models;
pub mod results;
pub mod review_queue;
pub mod runs;
pub mod variations;

/// All tables owned by this schema, in creation order
pub const TABLES: &[&str] = &[
    "users",
    "question_variations",
    "qa_sweep_runs",
    "qa_sweep_results",
    "review_queue_items",
    "control_packages",
    "exam_packages",
    "mock_exam_packages",
    "control_purchases",
];

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Wait on locks instead of failing immediately
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
///
/// Split out from [`init_database`] so tests can apply the schema to an
/// in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_question_variations_table(pool).await?;
    create_qa_sweep_runs_table(pool).await?;
    create_qa_sweep_results_table(pool).await?;
    create_review_queue_items_table(pool).await?;
    create_catalog_tables(pool).await?;
    create_control_purchases_table(pool).await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_question_variations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_variations (
            guid TEXT PRIMARY KEY,
            base_question_id INTEGER NOT NULL,
            variation_number INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            parent_version_id TEXT,
            statement TEXT NOT NULL,
            options TEXT NOT NULL DEFAULT '[]',
            correct_answer TEXT NOT NULL,
            explanation TEXT NOT NULL DEFAULT '',
            specialty TEXT,
            topic TEXT,
            confidence_score REAL,
            last_qa_date TEXT,
            is_visible INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_variations_lineage
         ON question_variations (base_question_id, variation_number, version)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_qa_sweep_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS qa_sweep_runs (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'PENDING',
            config TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            started_at TEXT,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_qa_sweep_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS qa_sweep_results (
            guid TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES qa_sweep_runs(guid),
            variation_id TEXT NOT NULL REFERENCES question_variations(guid),
            confidence_score REAL,
            diagnosis TEXT NOT NULL DEFAULT '{}',
            corrections TEXT,
            status TEXT NOT NULL DEFAULT 'COMPLETED',
            tokens_in INTEGER NOT NULL DEFAULT 0,
            tokens_out INTEGER NOT NULL DEFAULT 0,
            latency_ms INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_results_variation
         ON qa_sweep_results (variation_id, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_review_queue_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_queue_items (
            guid TEXT PRIMARY KEY,
            result_id TEXT NOT NULL REFERENCES qa_sweep_results(guid),
            variation_id TEXT NOT NULL REFERENCES question_variations(guid),
            risk_level TEXT NOT NULL,
            labels TEXT NOT NULL DEFAULT '[]',
            critique TEXT NOT NULL DEFAULT '',
            patch TEXT NOT NULL DEFAULT '[]',
            fix_status TEXT NOT NULL DEFAULT 'pending',
            review_notes TEXT,
            reviewed_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_catalog_tables(pool: &SqlitePool) -> Result<()> {
    for table in ["control_packages", "exam_packages", "mock_exam_packages"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                guid TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                unit_count INTEGER NOT NULL,
                price_clp INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
            table
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn create_control_purchases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS control_purchases (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            package_id TEXT NOT NULL,
            total_units INTEGER NOT NULL,
            used_units INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Row counts for every known table, in schema order
pub async fn table_counts(pool: &SqlitePool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        // Table names come from the static whitelist above, never from input
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        counts.push((*table, count));
    }
    Ok(counts)
}

/// Current UTC timestamp in the text format used across the schema
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
