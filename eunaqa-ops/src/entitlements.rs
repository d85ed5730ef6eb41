//! Entitlement grants
//!
//! Grants a control-package purchase to a user by email. Missing user or
//! package is a not-found error reported before any mutation; existing
//! purchases owned by a different user than expected are surfaced rather
//! than silently corrected.

use sqlx::{Pool, Sqlite};
use tracing::info;
use uuid::Uuid;

use eunaqa_common::db::catalog::{self, PackageKind};
use eunaqa_common::db::models::ControlPurchase;
use eunaqa_common::db::now_rfc3339;
use eunaqa_common::{Error, Result};

/// What a successful grant produced
#[derive(Debug, Clone)]
pub struct GrantSummary {
    pub purchase_guid: String,
    pub user_email: String,
    pub package_name: String,
    pub total_units: i64,
    /// Purchases the user already held before this grant
    pub prior_purchases: usize,
}

pub async fn grant_purchase(
    pool: &Pool<Sqlite>,
    email: &str,
    package_name: &str,
    units: Option<i64>,
) -> Result<GrantSummary> {
    let user = catalog::find_user_by_email(pool, email)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User with email {}", email)))?;

    let package = catalog::find_package_by_name(pool, PackageKind::Control, package_name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Control package '{}'", package_name)))?;

    let total_units = units.unwrap_or(package.unit_count);
    if total_units <= 0 {
        return Err(Error::InvalidInput(format!(
            "Unit count must be positive, got {}",
            total_units
        )));
    }

    let prior = catalog::purchases_for_user(pool, &user.guid).await?;

    let purchase = ControlPurchase {
        guid: Uuid::new_v4().to_string(),
        user_id: user.guid.clone(),
        package_id: package.guid.clone(),
        total_units,
        used_units: 0,
        created_at: now_rfc3339(),
    };
    catalog::insert_purchase(pool, &purchase).await?;

    info!(
        user = %user.email,
        package = %package.name,
        units = total_units,
        "Granted control purchase"
    );

    Ok(GrantSummary {
        purchase_guid: purchase.guid,
        user_email: user.email,
        package_name: package.name,
        total_units,
        prior_purchases: prior.len(),
    })
}
