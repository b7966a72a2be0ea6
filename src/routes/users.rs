use actix_web::{http::header::AUTHORIZATION, web, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use validator::Validate;

use crate::core::RetrievalService;
use crate::error::ApiError;
use crate::models::{
    BatchUserDataRequest, BatchUserDataResponse, FilteredUsersResponse, GetByFiltersRequest,
    GetByIdsRequest, HealthResponse, MatchesResponse, RecommendationsResponse, UsersByIdsResponse,
};
use crate::services::{bearer_token, CallerIdentity, IdentityVerifier};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub retrieval: RetrievalService,
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Configure all user-retrieval routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/users/by-ids", web::post().to(get_users_by_ids))
        .route("/users/filter", web::post().to(get_users_by_filters))
        .route("/users/batch", web::post().to(batch_get_user_data))
        .route("/users/recommendations", web::get().to(get_recommendations))
        .route("/matches", web::get().to(get_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let store_healthy = match state.retrieval.store().health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Fetch full user records by id
///
/// POST /api/v1/users/by-ids
///
/// Request body:
/// ```json
/// { "ids": ["string"] }
/// ```
///
/// `total_requested` counts the ids as sent, duplicates included, while
/// `users` and `total_found` hold each found id once.
async fn get_users_by_ids(
    state: web::Data<AppState>,
    req: web::Json<GetByIdsRequest>,
) -> Result<HttpResponse, ApiError> {
    let ids = req.into_inner().ids;
    let result = state.retrieval.get_by_ids(&ids).await;

    Ok(HttpResponse::Ok().json(UsersByIdsResponse {
        success: true,
        users: result.users,
        total_requested: result.total_requested,
        total_found: result.total_found,
    }))
}

/// Discover users matching filters
///
/// POST /api/v1/users/filter
///
/// Request body (all optional):
/// ```json
/// {
///   "age_min": 21,
///   "age_max": 35,
///   "interests": ["hiking"],
///   "max_distance": 50,
///   "education": "bachelor",
///   "limit": 50,
///   "exclude_ids": ["string"]
/// }
/// ```
async fn get_users_by_filters(
    state: web::Data<AppState>,
    http_req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&state, &http_req)?;

    let req: GetByFiltersRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GetByFiltersRequest::default()
    } else {
        parse_json(&body)?
    };
    req.validate()?;

    let criteria = req.into_criteria(state.retrieval.settings());
    tracing::info!("Filtering users for {}, limit: {}", caller.user_id, criteria.limit);

    let outcome = state.retrieval.get_by_filters(&caller.user_id, &criteria).await?;

    Ok(HttpResponse::Ok().json(FilteredUsersResponse {
        success: true,
        count: outcome.users.len(),
        users: outcome.users,
    }))
}

/// Compact user data for many ids
///
/// POST /api/v1/users/batch
///
/// Request body:
/// ```json
/// { "user_ids": ["string"] }
/// ```
async fn batch_get_user_data(
    state: web::Data<AppState>,
    http_req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&state, &http_req)?;

    let req: BatchUserDataRequest = parse_json(&body)?;
    tracing::debug!("Batch user data for {}: {} ids requested", caller.user_id, req.user_ids.len());

    let ids = req.into_identifier_batch(state.retrieval.settings().batch_cap);
    let result = state.retrieval.batch_get_user_data(ids).await;

    Ok(HttpResponse::Ok().json(BatchUserDataResponse {
        success: true,
        users: result.users,
        total_requested: result.total_requested,
        total_found: result.total_found,
        missing_ids: result.missing_ids,
    }))
}

/// Scored recommendations for the caller
///
/// GET /api/v1/users/recommendations
async fn get_recommendations(
    state: web::Data<AppState>,
    http_req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&state, &http_req)?;
    let recommendations = state.retrieval.recommendations(&caller.user_id).await?;

    Ok(HttpResponse::Ok().json(RecommendationsResponse {
        success: true,
        count: recommendations.len(),
        recommendations,
    }))
}

/// The caller's active matches
///
/// GET /api/v1/matches
async fn get_matches(
    state: web::Data<AppState>,
    http_req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&state, &http_req)?;
    let matches = state.retrieval.matches(&caller.user_id).await?;

    Ok(HttpResponse::Ok().json(MatchesResponse {
        success: true,
        count: matches.len(),
        matches,
    }))
}

fn authenticate(state: &AppState, req: &HttpRequest) -> Result<CallerIdentity, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let caller = bearer_token(header).and_then(|token| state.verifier.verify(token));
    if let Err(e) = &caller {
        tracing::info!("Rejected request to {}: {}", req.path(), e);
    }
    Ok(caller?)
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid JSON: {}", e)))
}
