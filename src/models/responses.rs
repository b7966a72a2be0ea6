use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::domain::{DiscoveredUser, EssentialProjection, MatchSummary, Recommendation, UserRecord};

/// Response for the by-id endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersByIdsResponse {
    pub success: bool,
    pub users: Vec<UserRecord>,
    pub total_requested: usize,
    pub total_found: usize,
}

/// Response for the discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredUsersResponse {
    pub success: bool,
    pub users: Vec<DiscoveredUser>,
    pub count: usize,
}

/// Response for the batch user-data endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUserDataResponse {
    pub success: bool,
    pub users: HashMap<String, EssentialProjection>,
    pub total_requested: usize,
    pub total_found: usize,
    pub missing_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub success: bool,
    pub matches: Vec<MatchSummary>,
    pub count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error envelope returned on every failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
