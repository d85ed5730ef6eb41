//! Catalog seeding
//!
//! Inserts the standard package catalog, keyed by name so re-running never
//! duplicates rows.

use sqlx::{Pool, Sqlite};
use tracing::info;

use eunaqa_common::db::catalog::{insert_package_if_absent, PackageKind};
use eunaqa_common::Result;

/// (kind, name, description, unit_count, price_clp)
const DEFAULT_CATALOG: &[(PackageKind, &str, &str, i64, i64)] = &[
    (
        PackageKind::Control,
        "Controles x10",
        "10 controles de práctica por especialidad",
        10,
        14990,
    ),
    (
        PackageKind::Control,
        "Controles x25",
        "25 controles de práctica por especialidad",
        25,
        29990,
    ),
    (
        PackageKind::Exam,
        "Ensayo EUNACOM",
        "Un ensayo completo cronometrado de 180 preguntas",
        1,
        9990,
    ),
    (
        PackageKind::Exam,
        "Pack 3 Ensayos",
        "Tres ensayos completos cronometrados",
        3,
        24990,
    ),
    (
        PackageKind::MockExam,
        "Simulacro Teórico",
        "Simulacro en condiciones reales de examen",
        1,
        19990,
    ),
];

/// Seed the catalog; returns how many packages were newly inserted
pub async fn seed_catalog(pool: &Pool<Sqlite>) -> Result<u64> {
    let mut inserted = 0u64;
    for (kind, name, description, unit_count, price_clp) in DEFAULT_CATALOG {
        if insert_package_if_absent(pool, *kind, name, description, *unit_count, *price_clp).await? {
            info!(package = name, table = kind.table(), "Seeded catalog package");
            inserted += 1;
        }
    }
    info!(
        inserted,
        existing = DEFAULT_CATALOG.len() as u64 - inserted,
        "Catalog seed complete"
    );
    Ok(inserted)
}
