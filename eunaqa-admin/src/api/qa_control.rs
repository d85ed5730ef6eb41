//! QA control-panel endpoints
//!
//! Tabular listings and bulk actions behind the admin frontend's control
//! panel: variation browsing with filters, bulk delete, run statistics and
//! the confidence distribution report.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use eunaqa_common::db::models::QuestionVariation;
use eunaqa_common::db::runs::{self, RunStats};
use eunaqa_common::db::variations::{self, VariationFilter};
use eunaqa_common::scoring::Distribution;

use crate::pagination::{calculate_pagination, Pagination};
use crate::{ApiError, ApiResult, AppState};

fn default_page() -> i64 {
    1
}

/// Query parameters for the variation listing
#[derive(Debug, Deserialize)]
pub struct VariationsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub limit: Option<i64>,
    pub label: Option<String>,
    pub specialty: Option<String>,
    pub topic: Option<String>,
}

/// Paginated variation listing response
#[derive(Debug, Serialize)]
pub struct VariationsResponse {
    pub variations: Vec<QuestionVariation>,
    pub pagination: Pagination,
}

/// GET /api/admin/qa-control/variations
pub async fn list_variations(
    State(state): State<AppState>,
    Query(query): Query<VariationsQuery>,
) -> ApiResult<Json<VariationsResponse>> {
    let filter = VariationFilter {
        specialty: query.specialty,
        topic: query.topic,
        label: query.label,
    };

    let total = variations::count_variations(&state.db, &filter).await?;
    let p = calculate_pagination(total, query.page, query.limit);
    let page = variations::list_variations(&state.db, &filter, p.limit, p.offset).await?;

    Ok(Json(VariationsResponse {
        variations: page,
        pagination: p,
    }))
}

/// Request body for a bulk delete
#[derive(Debug, Deserialize)]
pub struct DeleteVariationsRequest {
    #[serde(rename = "variationIds")]
    pub variation_ids: Vec<String>,
}

/// Bulk action response
#[derive(Debug, Serialize)]
pub struct BulkActionResponse {
    pub success: bool,
    pub message: String,
}

/// DELETE /api/admin/qa-control/variations
pub async fn delete_variations(
    State(state): State<AppState>,
    Json(payload): Json<DeleteVariationsRequest>,
) -> ApiResult<Json<BulkActionResponse>> {
    if payload.variation_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "variationIds cannot be empty".to_string(),
        ));
    }

    let deleted = variations::delete_variations(&state.db, &payload.variation_ids).await?;
    info!(requested = payload.variation_ids.len(), deleted, "Bulk variation delete");

    Ok(Json(BulkActionResponse {
        success: true,
        message: format!(
            "Deleted {} of {} variation(s)",
            deleted,
            payload.variation_ids.len()
        ),
    }))
}

/// Run listing response
#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub runs: Vec<RunStats>,
}

/// GET /api/admin/qa-control/runs
///
/// Runs newest first, each with aggregate result statistics.
pub async fn list_runs(State(state): State<AppState>) -> ApiResult<Json<RunsResponse>> {
    let runs = runs::list_runs_with_stats(&state.db).await?;
    Ok(Json(RunsResponse { runs }))
}

/// Confidence distribution response
#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    pub distribution: Distribution,
    pub total: u64,
}

/// GET /api/admin/qa-control/confidence-distribution
///
/// Bucket counts over visible variations only. The buckets partition the
/// set exactly, so the counts always sum to the total.
pub async fn confidence_distribution(
    State(state): State<AppState>,
) -> ApiResult<Json<DistributionResponse>> {
    let scores = variations::visible_scores(&state.db).await?;
    let distribution = Distribution::from_scores(scores);

    Ok(Json(DistributionResponse {
        total: distribution.total(),
        distribution,
    }))
}
