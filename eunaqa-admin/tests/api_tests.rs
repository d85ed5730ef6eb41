//! Integration tests for eunaqa-admin API endpoints
//!
//! Covers the review queue decision flow, control-panel listings, bulk
//! delete and the confidence distribution report. Every test runs against
//! a seeded in-memory database.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`

use eunaqa_admin::{build_router, AppState};
use eunaqa_common::db::models::{
    QaSweepResult, QaSweepRun, QuestionVariation, ReviewQueueItem, RiskLevel,
};
use eunaqa_common::db::{results, review_queue, runs, variations};

/// Test helper: in-memory database with schema applied
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory database");
    eunaqa_common::db::init_schema(&pool)
        .await
        .expect("apply schema");
    pool
}

fn setup_app(db: SqlitePool) -> axum::Router {
    build_router(AppState::new(db))
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

/// Seed one variation with a sweep run/result behind it
async fn seed_variation(pool: &SqlitePool, base_id: i64) -> (QaSweepRun, QuestionVariation) {
    let run = QaSweepRun::new(format!("sweep-{}", base_id));
    runs::insert_run(pool, &run).await.unwrap();

    let mut v = QuestionVariation::new(base_id, 1, format!("Pregunta {}", base_id));
    v.options = vec!["A".into(), "B".into(), "C".into(), "D".into()];
    v.correct_answer = "B".into();
    variations::insert_variation(pool, &v).await.unwrap();

    (run, v)
}

/// Seed a pending review item with the given patch payload
async fn seed_review_item(
    pool: &SqlitePool,
    run: &QaSweepRun,
    variation: &QuestionVariation,
    risk: RiskLevel,
    patch: Value,
) -> ReviewQueueItem {
    let r = QaSweepResult::new(&run.guid, &variation.guid);
    results::insert_result(pool, &r).await.unwrap();

    let mut item = ReviewQueueItem::new(&r.guid, &variation.guid, risk);
    item.patch = patch;
    item.critique = "Distractor débil en la alternativa C".to_string();
    review_queue::insert_item(pool, &item).await.unwrap();
    item
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(setup_test_db().await);

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "eunaqa-admin");
    assert!(body["version"].is_string());
}

// =============================================================================
// Review queue listing
// =============================================================================

#[tokio::test]
async fn test_review_queue_listing_and_priority_filter() {
    let pool = setup_test_db().await;
    let (run, v1) = seed_variation(&pool, 1).await;
    seed_review_item(&pool, &run, &v1, RiskLevel::High, json!([])).await;
    let (run2, v2) = seed_variation(&pool, 2).await;
    seed_review_item(&pool, &run2, &v2, RiskLevel::Low, json!([])).await;

    let app = setup_app(pool);

    let response = app
        .clone()
        .oneshot(get_request("/api/qa-sweep/review-queue"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get_request("/api/qa-sweep/review-queue?priority=high"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["risk_level"], "high");
}

#[tokio::test]
async fn test_review_queue_invalid_priority_rejected() {
    let app = setup_app(setup_test_db().await);

    let response = app
        .oneshot(get_request("/api/qa-sweep/review-queue?priority=urgent"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("risk level"));
}

// =============================================================================
// Approve
// =============================================================================

#[tokio::test]
async fn test_approve_applies_patch_once() {
    let pool = setup_test_db().await;
    let (run, v) = seed_variation(&pool, 10).await;
    let patch = json!([
        {
            "field": "statement",
            "original_value": v.statement,
            "proposed_value": "Pregunta corregida",
            "reason": "Enunciado ambiguo",
            "confidence": 0.92
        },
        {
            "field": "option:2",
            "original_value": "C",
            "proposed_value": "C corregida",
            "reason": "Distractor débil",
            "confidence": 0.8
        }
    ]);
    let item = seed_review_item(&pool, &run, &v, RiskLevel::High, patch).await;

    let app = setup_app(pool.clone());
    let uri = format!("/api/qa-sweep/review-queue/{}/approve", item.guid);

    let response = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);

    // Patch landed on the variation and the QA date was stamped
    let updated = variations::get_variation(&pool, &v.guid).await.unwrap().unwrap();
    assert_eq!(updated.statement, "Pregunta corregida");
    assert_eq!(updated.options[2], "C corregida");
    assert_eq!(updated.options[0], "A");
    assert!(updated.last_qa_date.is_some());

    let resolved = review_queue::get_item(&pool, &item.guid).await.unwrap().unwrap();
    assert_eq!(resolved.fix_status, "applied");

    // Approving again is reported as already-resolved, never double-applied
    let response = app
        .oneshot(json_request("POST", &uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let after = variations::get_variation(&pool, &v.guid).await.unwrap().unwrap();
    assert_eq!(after.statement, "Pregunta corregida");
}

#[tokio::test]
async fn test_approve_missing_item_is_not_found() {
    let app = setup_app(setup_test_db().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/qa-sweep/review-queue/no-such-item/approve",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_approve_malformed_patch_fails_without_committing() {
    let pool = setup_test_db().await;
    let (run, v) = seed_variation(&pool, 20).await;
    // Patch payload that is not an edit array
    let item = seed_review_item(&pool, &run, &v, RiskLevel::Medium, json!({"oops": true})).await;

    let app = setup_app(pool.clone());
    let uri = format!("/api/qa-sweep/review-queue/{}/approve", item.guid);

    let response = app.oneshot(json_request("POST", &uri, json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing committed: item still pending, variation untouched
    let unresolved = review_queue::get_item(&pool, &item.guid).await.unwrap().unwrap();
    assert_eq!(unresolved.fix_status, "pending");
    let untouched = variations::get_variation(&pool, &v.guid).await.unwrap().unwrap();
    assert_eq!(untouched.statement, v.statement);
    assert!(untouched.last_qa_date.is_none());
}

#[tokio::test]
async fn test_approve_unknown_patch_field_rolls_back() {
    let pool = setup_test_db().await;
    let (run, v) = seed_variation(&pool, 21).await;
    let patch = json!([
        {
            "field": "statement",
            "original_value": v.statement,
            "proposed_value": "Cambiada",
            "reason": null,
            "confidence": null
        },
        {
            "field": "difficulty",
            "original_value": "easy",
            "proposed_value": "hard",
            "reason": null,
            "confidence": null
        }
    ]);
    let item = seed_review_item(&pool, &run, &v, RiskLevel::High, patch).await;

    let app = setup_app(pool.clone());
    let uri = format!("/api/qa-sweep/review-queue/{}/approve", item.guid);

    let response = app.oneshot(json_request("POST", &uri, json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // First edit must not survive the failed second edit
    let untouched = variations::get_variation(&pool, &v.guid).await.unwrap().unwrap();
    assert_eq!(untouched.statement, v.statement);
    let unresolved = review_queue::get_item(&pool, &item.guid).await.unwrap().unwrap();
    assert_eq!(unresolved.fix_status, "pending");
}

// =============================================================================
// Reject
// =============================================================================

#[tokio::test]
async fn test_reject_records_notes_and_preserves_content() {
    let pool = setup_test_db().await;
    let (run, v) = seed_variation(&pool, 30).await;
    let patch = json!([
        {
            "field": "statement",
            "original_value": v.statement,
            "proposed_value": "No debería aplicarse",
            "reason": null,
            "confidence": null
        }
    ]);
    let item = seed_review_item(&pool, &run, &v, RiskLevel::Medium, patch).await;

    let app = setup_app(pool.clone());
    let uri = format!("/api/qa-sweep/review-queue/{}/reject", item.guid);

    let response = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({"notes": "La pregunta es correcta"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let rejected = review_queue::get_item(&pool, &item.guid).await.unwrap().unwrap();
    assert_eq!(rejected.fix_status, "rejected");
    assert_eq!(rejected.review_notes.as_deref(), Some("La pregunta es correcta"));

    // Content unchanged
    let untouched = variations::get_variation(&pool, &v.guid).await.unwrap().unwrap();
    assert_eq!(untouched.statement, v.statement);

    // Rejecting a resolved item is a conflict
    let response = app
        .oneshot(json_request("POST", &uri, json!({"notes": "otra vez"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reject_requires_notes() {
    let pool = setup_test_db().await;
    let (run, v) = seed_variation(&pool, 31).await;
    let item = seed_review_item(&pool, &run, &v, RiskLevel::Low, json!([])).await;

    let app = setup_app(pool);
    let uri = format!("/api/qa-sweep/review-queue/{}/reject", item.guid);

    let response = app
        .oneshot(json_request("POST", &uri, json!({"notes": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Control panel: variations
// =============================================================================

#[tokio::test]
async fn test_variations_pagination_and_filters() {
    let pool = setup_test_db().await;
    for i in 0..3 {
        let mut v = QuestionVariation::new(100 + i, 1, format!("q{}", i));
        v.specialty = Some(if i == 0 { "Pediatría" } else { "Cirugía" }.to_string());
        variations::insert_variation(&pool, &v).await.unwrap();
    }

    let app = setup_app(pool);

    let response = app
        .clone()
        .oneshot(get_request("/api/admin/qa-control/variations?page=1&limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["variations"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);

    let response = app
        .clone()
        .oneshot(get_request("/api/admin/qa-control/variations?page=2&limit=2"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["variations"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["page"], 2);

    // Out-of-bounds page is clamped, not an error
    let response = app
        .clone()
        .oneshot(get_request("/api/admin/qa-control/variations?page=99&limit=2"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pagination"]["page"], 2);

    let response = app
        .oneshot(get_request(
            "/api/admin/qa-control/variations?specialty=Pediatr%C3%ADa",
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_bulk_delete_variations() {
    let pool = setup_test_db().await;
    let a = QuestionVariation::new(1, 1, "a");
    let b = QuestionVariation::new(2, 1, "b");
    variations::insert_variation(&pool, &a).await.unwrap();
    variations::insert_variation(&pool, &b).await.unwrap();

    let app = setup_app(pool.clone());

    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            "/api/admin/qa-control/variations",
            json!({"variationIds": [a.guid, "missing"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("1 of 2"));

    assert!(variations::get_variation(&pool, &b.guid).await.unwrap().is_some());

    // Empty id list is a validation error
    let response = app
        .oneshot(json_request(
            "DELETE",
            "/api/admin/qa-control/variations",
            json!({"variationIds": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Control panel: runs and distribution
// =============================================================================

#[tokio::test]
async fn test_runs_listing_with_stats() {
    let pool = setup_test_db().await;
    let (run, v) = seed_variation(&pool, 50).await;
    let mut r = QaSweepResult::new(&run.guid, &v.guid);
    r.confidence_score = Some(0.5);
    r.tokens_in = 120;
    r.tokens_out = 40;
    results::insert_result(&pool, &r).await.unwrap();

    let app = setup_app(pool);
    let response = app
        .oneshot(get_request("/api/admin/qa-control/runs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let runs = body["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["result_count"], 1);
    assert_eq!(runs[0]["tokens_in"], 120);
}

#[tokio::test]
async fn test_confidence_distribution_partitions_visible_set() {
    let pool = setup_test_db().await;

    // unscored / low / medium / high, plus one hidden row that must not count
    let specs = [
        (None, true),
        (Some(0.1), true),
        (Some(0.5), true),
        (Some(0.9), true),
        (Some(0.9), false),
    ];
    for (i, (score, visible)) in specs.iter().enumerate() {
        let mut v = QuestionVariation::new(i as i64, 1, format!("q{}", i));
        v.confidence_score = *score;
        v.is_visible = *visible;
        variations::insert_variation(&pool, &v).await.unwrap();
    }

    let app = setup_app(pool);
    let response = app
        .oneshot(get_request("/api/admin/qa-control/confidence-distribution"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["distribution"]["unscored"], 1);
    assert_eq!(body["distribution"]["low"], 1);
    assert_eq!(body["distribution"]["medium"], 1);
    assert_eq!(body["distribution"]["high"], 1);
    assert_eq!(body["total"], 4);
}
