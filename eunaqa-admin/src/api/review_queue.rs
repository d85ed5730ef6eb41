//! QA review queue endpoints
//!
//! Presents pending AI-diagnosed items to an operator and applies their
//! approve/reject decision. Approval mutates exam content visible to
//! students, so patch application and the status transition share one
//! transaction.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use eunaqa_common::db::models::{FixStatus, ReviewQueueItem, RiskLevel};
use eunaqa_common::db::{self, review_queue, variations};

use crate::{ApiError, ApiResult, AppState};

/// Query parameters for the queue listing
#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    /// Optional risk filter: high, medium or low
    pub priority: Option<String>,
}

/// Queue listing response
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub items: Vec<ReviewQueueItem>,
}

/// Outcome of an approve/reject decision
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub message: String,
}

/// Request body for a rejection
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub notes: String,
}

/// GET /api/qa-sweep/review-queue
///
/// Returns the full filtered set of pending items, newest first.
pub async fn list_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Json<QueueResponse>> {
    // Validate the filter before touching the database
    let risk_level = query
        .priority
        .as_deref()
        .map(RiskLevel::parse)
        .transpose()?;

    let items = review_queue::list_pending(&state.db, risk_level).await?;
    Ok(Json(QueueResponse { items }))
}

/// POST /api/qa-sweep/review-queue/:id/approve
///
/// Applies the item's patch to the underlying variation field by field and
/// marks the item applied. Succeeds or fails as a unit: a malformed patch
/// aborts without committing the status change, and a concurrent decision
/// on the same item loses the optimistic pending check and reports a
/// conflict instead of double-applying.
pub async fn approve_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DecisionResponse>> {
    let item = review_queue::get_item(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Review queue item {}", id)))?;

    if item.fix_status != FixStatus::Pending.as_str() {
        return Err(ApiError::Conflict(format!(
            "Item {} already resolved ({})",
            id, item.fix_status
        )));
    }

    let edits = item.parsed_patch()?;
    let now = db::now_rfc3339();

    let mut tx = state.db.begin().await?;
    for edit in &edits {
        variations::apply_edit(&mut tx, &item.variation_id, &edit.field, &edit.proposed_value)
            .await?;
    }
    variations::touch_last_qa_date(&mut tx, &item.variation_id, &now).await?;

    let transitioned =
        review_queue::resolve_item(&mut tx, &item.guid, FixStatus::Applied, None, &now).await?;
    if !transitioned {
        tx.rollback().await?;
        return Err(ApiError::Conflict(format!("Item {} already resolved", id)));
    }
    tx.commit().await?;

    info!(
        item = %item.guid,
        variation = %item.variation_id,
        edits = edits.len(),
        "Review queue item approved"
    );

    Ok(Json(DecisionResponse {
        success: true,
        message: format!("Applied {} edit(s) to variation {}", edits.len(), item.variation_id),
    }))
}

/// POST /api/qa-sweep/review-queue/:id/reject
///
/// Records operator notes and marks the item rejected. Content is left
/// unchanged.
pub async fn reject_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    if payload.notes.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Rejection notes cannot be empty".to_string(),
        ));
    }

    let item = review_queue::get_item(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Review queue item {}", id)))?;

    if item.fix_status != FixStatus::Pending.as_str() {
        return Err(ApiError::Conflict(format!(
            "Item {} already resolved ({})",
            id, item.fix_status
        )));
    }

    let now = db::now_rfc3339();
    let mut tx = state.db.begin().await?;
    let transitioned = review_queue::resolve_item(
        &mut tx,
        &item.guid,
        FixStatus::Rejected,
        Some(payload.notes.trim()),
        &now,
    )
    .await?;
    if !transitioned {
        tx.rollback().await?;
        return Err(ApiError::Conflict(format!("Item {} already resolved", id)));
    }
    tx.commit().await?;

    info!(item = %item.guid, "Review queue item rejected");

    Ok(Json(DecisionResponse {
        success: true,
        message: format!("Item {} rejected", id),
    }))
}
