use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

use crate::config::RetrievalSettings;
use crate::models::FilterCriteria;

/// Request to fetch full user records by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetByIdsRequest {
    pub ids: Vec<String>,
}

/// Request to discover users matching a set of filters
///
/// Every field is optional; an empty body means "no filters".
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_age_bounds"))]
pub struct GetByFiltersRequest {
    #[serde(default)]
    pub age_min: Option<u32>,
    #[serde(default)]
    pub age_max: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub max_distance: Option<f64>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
}

fn validate_age_bounds(req: &GetByFiltersRequest) -> Result<(), ValidationError> {
    match (req.age_min, req.age_max) {
        (Some(min), Some(max)) if min > max => {
            Err(ValidationError::new("age_min must not exceed age_max"))
        }
        _ => Ok(()),
    }
}

impl GetByFiltersRequest {
    /// Apply defaults and clamp the limit, producing the criteria the core runs on
    pub fn into_criteria(self, settings: &RetrievalSettings) -> FilterCriteria {
        let max_limit = settings.max_filter_limit.max(1);
        let limit = self
            .limit
            .map(|l| l as usize)
            .unwrap_or(settings.default_filter_limit)
            .clamp(1, max_limit);

        FilterCriteria {
            age_min: self.age_min,
            age_max: self.age_max,
            interests: self.interests.into_iter().collect::<HashSet<_>>(),
            max_distance_km: self.max_distance.unwrap_or(settings.default_max_distance_km),
            education: self.education.filter(|e| !e.is_empty()),
            limit,
            exclude_ids: self.exclude_ids.into_iter().collect(),
        }
    }
}

/// Request for the compact batch projection of many users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUserDataRequest {
    pub user_ids: Vec<String>,
}

impl BatchUserDataRequest {
    /// Drop duplicates (first occurrence wins) and cap the list
    pub fn into_identifier_batch(self, cap: usize) -> Vec<String> {
        let mut seen = HashSet::with_capacity(self.user_ids.len());
        self.user_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .take(cap)
            .collect()
    }
}
