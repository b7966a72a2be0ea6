use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Geographic position of a user in degrees
///
/// A stored location with only one coordinate reads the other as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// User document as held by the store
///
/// Attributes the service does not model are kept in `extra` so the
/// full-record endpoints hand them back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(rename = "isProfileComplete", default)]
    pub is_profile_complete: bool,
    #[serde(rename = "lastLogin", default)]
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    /// Bare record with only an identifier, mostly useful for fixtures
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            age: None,
            bio: None,
            photos: Vec::new(),
            interests: Vec::new(),
            location: None,
            education: None,
            is_profile_complete: false,
            last_login: None,
            extra: Map::new(),
        }
    }

    /// True if the record shares at least one interest with `wanted`
    pub fn shares_interest(&self, wanted: &HashSet<String>) -> bool {
        self.interests.iter().any(|interest| wanted.contains(interest))
    }

    /// Reduce the record to the fields the batch endpoint returns
    pub fn to_essential(&self) -> EssentialProjection {
        EssentialProjection {
            user_id: self.user_id.clone(),
            name: self.name.clone().unwrap_or_default(),
            age: self.age,
            photos: self.photos.clone(),
            bio: self.bio.clone().unwrap_or_default(),
            interests: self.interests.clone(),
            location: self.location,
            last_login: self.last_login,
        }
    }
}

/// Compact projection returned by the batch user-data endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssentialProjection {
    pub user_id: String,
    pub name: String,
    pub age: Option<u32>,
    pub photos: Vec<String>,
    pub bio: String,
    pub interests: Vec<String>,
    pub location: Option<Location>,
    #[serde(rename = "lastLogin")]
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
}

/// Candidate accepted by discovery, with its distance from the viewer when known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredUser {
    #[serde(flatten)]
    pub user: UserRecord,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance: Option<f64>,
}

/// Validated discovery filters
///
/// Age and education are pushed down into the store query; the rest is
/// evaluated in-process by the filter engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub interests: HashSet<String>,
    pub max_distance_km: f64,
    pub education: Option<String>,
    pub limit: usize,
    pub exclude_ids: HashSet<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            age_min: None,
            age_max: None,
            interests: HashSet::new(),
            max_distance_km: 50.0,
            education: None,
            limit: 50,
            exclude_ids: HashSet::new(),
        }
    }
}

/// Store-level predicates for a discovery or candidate-pool query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserQuery {
    pub profile_complete: bool,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub education: Option<String>,
    pub limit: usize,
}

/// Merged outcome of a partitioned membership fetch
#[derive(Debug, Clone, Default)]
pub struct BatchFetch {
    pub found: HashMap<String, UserRecord>,
    /// Requested ids that were not returned, in request order
    pub missing: Vec<String>,
    pub total_requested: usize,
    pub failed_partitions: usize,
}

impl BatchFetch {
    pub fn total_found(&self) -> usize {
        self.found.len()
    }
}

/// Active mutual match between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub user1_id: String,
    pub user2_id: String,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl MatchRecord {
    /// The participant that is not `user_id`
    pub fn counterpart(&self, user_id: &str) -> &str {
        if self.user1_id == user_id {
            &self.user2_id
        } else {
            &self.user1_id
        }
    }
}

fn default_true() -> bool { true }

/// Match as returned to the caller, with the other participant resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: String,
    pub other_user: UserRecord,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Recommended profile with its compatibility score (0-100)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub user: UserRecord,
    pub compatibility_score: f64,
}

/// Compatibility scoring weights, expressed as points out of 100
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub age: f64,
    pub interests: f64,
    pub location: f64,
    pub education: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            age: 30.0,
            interests: 40.0,
            location: 20.0,
            education: 10.0,
        }
    }
}
