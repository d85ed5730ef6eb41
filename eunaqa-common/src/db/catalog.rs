//! Named queries over users, package catalogs and purchases

use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::db::models::{ControlPurchase, Package, User};
use crate::Result;

/// Which catalog table a package lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Control,
    Exam,
    MockExam,
}

impl PackageKind {
    /// Catalog table name; the enum is the whitelist
    pub fn table(&self) -> &'static str {
        match self {
            PackageKind::Control => "control_packages",
            PackageKind::Exam => "exam_packages",
            PackageKind::MockExam => "mock_exam_packages",
        }
    }
}

fn package_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Package> {
    Ok(Package {
        guid: row.try_get("guid")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        unit_count: row.try_get("unit_count")?,
        price_clp: row.try_get("price_clp")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_user(pool: &Pool<Sqlite>, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (guid, email, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&user.guid)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.created_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT guid, email, name, created_at FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        Ok(User {
            guid: row.try_get("guid")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
        })
    })
    .transpose()
}

/// Insert a package unless one with the same name exists; returns true on insert
pub async fn insert_package_if_absent(
    pool: &Pool<Sqlite>,
    kind: PackageKind,
    name: &str,
    description: &str,
    unit_count: i64,
    price_clp: i64,
) -> Result<bool> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (guid, name, description, unit_count, price_clp, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, 1, ?)
         ON CONFLICT(name) DO NOTHING",
        kind.table()
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(description)
    .bind(unit_count)
    .bind(price_clp)
    .bind(super::now_rfc3339())
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted == 1)
}

pub async fn find_package_by_name(
    pool: &Pool<Sqlite>,
    kind: PackageKind,
    name: &str,
) -> Result<Option<Package>> {
    let row = sqlx::query(&format!(
        "SELECT guid, name, description, unit_count, price_clp, is_active, created_at
         FROM {} WHERE name = ?",
        kind.table()
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(package_from_row).transpose()
}

pub async fn insert_purchase(pool: &Pool<Sqlite>, purchase: &ControlPurchase) -> Result<()> {
    sqlx::query(
        "INSERT INTO control_purchases
         (guid, user_id, package_id, total_units, used_units, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&purchase.guid)
    .bind(&purchase.user_id)
    .bind(&purchase.package_id)
    .bind(purchase.total_units)
    .bind(purchase.used_units)
    .bind(&purchase.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn purchases_for_user(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<ControlPurchase>> {
    let rows = sqlx::query(
        "SELECT guid, user_id, package_id, total_units, used_units, created_at
         FROM control_purchases WHERE user_id = ? ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ControlPurchase {
                guid: row.try_get("guid")?,
                user_id: row.try_get("user_id")?,
                package_id: row.try_get("package_id")?,
                total_units: row.try_get("total_units")?,
                used_units: row.try_get("used_units")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Purchases whose owning user no longer exists (data-integrity mismatch)
pub async fn find_orphaned_purchases(pool: &Pool<Sqlite>) -> Result<Vec<ControlPurchase>> {
    let rows = sqlx::query(
        "SELECT p.guid, p.user_id, p.package_id, p.total_units, p.used_units, p.created_at
         FROM control_purchases p
         WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.guid = p.user_id)
         ORDER BY p.created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ControlPurchase {
                guid: row.try_get("guid")?,
                user_id: row.try_get("user_id")?,
                package_id: row.try_get("package_id")?,
                total_units: row.try_get("total_units")?,
                used_units: row.try_get("used_units")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}
