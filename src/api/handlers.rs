//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::AppState;
use super::types::{ApiError, ErrorResponse, TemplateSummary, quote_error};
use crate::engine::{Quote, QuoteRequest, TierKey, select_tier};
use crate::error::{AtStage, Stage};

/// `POST /quotes` → 200 + `Quote` JSON, 422 for invalid input, 404 for
/// unknown templates.
pub async fn create_quote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let facility = &request.facility;
    let template = state
        .loader
        .template(&facility.industry, facility.subtype.as_deref())
        .await
        .at(Stage::Template)
        .map_err(|e| quote_error(&e))?;
    let region = state
        .loader
        .cost_tables(&request.region)
        .await
        .at(Stage::Region)
        .map_err(|e| quote_error(&e))?;
    let quote = state
        .engine
        .compute_quote_with(&template, &region, &request)
        .map_err(|e| quote_error(&e))?;
    Ok(Json(Quote::clone(&quote)))
}

/// `GET /quotes/{id}` → 200 + `Quote` JSON, or 404.
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    state
        .engine
        .quote(&id)
        .map(|q| Json(Quote::clone(&q)))
        .ok_or_else(|| not_found(&id))
}

/// `GET /quotes/{id}/tiers/{tier}` → 200 + tier view JSON; 400 for an
/// unknown tier name.
pub async fn get_tier(
    State(state): State<Arc<AppState>>,
    Path((id, tier)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tier: TierKey = tier
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, Json(ErrorResponse::message(e))))?;
    let quote = state.engine.quote(&id).ok_or_else(|| not_found(&id))?;
    serde_json::to_value(select_tier(&quote, tier))
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::message(e.to_string())),
            )
        })
}

/// `GET /templates` → 200 + `Vec<TemplateSummary>` JSON.
pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<TemplateSummary>> {
    Json(
        state
            .engine
            .catalog()
            .templates()
            .map(|t| TemplateSummary::from(t.as_ref()))
            .collect(),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::message(format!("no quote with id \"{id}\""))),
    )
}
