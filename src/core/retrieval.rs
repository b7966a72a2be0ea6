use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::RetrievalSettings;
use crate::core::batch::BatchFetcher;
use crate::core::filters::{FilterEngine, FilterOutcome};
use crate::core::scoring::calculate_compatibility_score;
use crate::models::{
    EssentialProjection, FilterCriteria, MatchSummary, Recommendation, ScoringWeights,
    UserQuery, UserRecord,
};
use crate::services::{CacheError, CacheKey, CacheManager, StoreError, UserStore};

/// Errors surfaced by the retrieval operations
///
/// Per-partition store failures never show up here; they are absorbed by
/// the batch fetcher.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("User not found: {0}")]
    CallerNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Full records for a by-id request
#[derive(Debug)]
pub struct UsersByIds {
    pub users: Vec<UserRecord>,
    pub total_requested: usize,
    pub total_found: usize,
}

/// Compact projections for a batch request
#[derive(Debug)]
pub struct BatchUserData {
    pub users: HashMap<String, EssentialProjection>,
    pub total_requested: usize,
    pub total_found: usize,
    pub missing_ids: Vec<String>,
}

/// Answers the user-retrieval endpoints
///
/// Holds only shared, read-only handles; every call is request-scoped.
#[derive(Clone)]
pub struct RetrievalService {
    store: Arc<dyn UserStore>,
    fetcher: BatchFetcher,
    cache: Option<Arc<CacheManager>>,
    settings: RetrievalSettings,
    weights: ScoringWeights,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn UserStore>, settings: RetrievalSettings) -> Self {
        let mut fetcher = BatchFetcher::new(store.clone())
            .with_concurrency(settings.fetch_concurrency)
            .with_partition_timeout(settings.partition_timeout_ms.map(Duration::from_millis));
        if let Some(limit) = settings.membership_limit {
            fetcher = fetcher.with_membership_limit(limit);
        }

        Self {
            store,
            fetcher,
            cache: None,
            settings,
            weights: ScoringWeights::default(),
        }
    }

    /// Cache viewer profiles between requests
    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Fetch full records by id
    ///
    /// Records come back once per distinct found id, in first-request order.
    /// `total_requested` counts the input as given, duplicates included.
    pub async fn get_by_ids(&self, ids: &[String]) -> UsersByIds {
        if ids.is_empty() {
            return UsersByIds {
                users: Vec::new(),
                total_requested: 0,
                total_found: 0,
            };
        }

        let mut batch = self.fetcher.fetch(ids).await;

        let mut users = Vec::with_capacity(batch.found.len());
        for id in ids {
            if let Some(user) = batch.found.remove(id) {
                users.push(user);
            }
        }

        tracing::info!("Retrieved {} users from {} requested IDs", users.len(), ids.len());

        UsersByIds {
            total_found: users.len(),
            total_requested: ids.len(),
            users,
        }
    }

    /// Discover users around the caller
    ///
    /// Age and education go to the store; the rest runs through the filter
    /// engine over an over-fetched candidate list.
    pub async fn get_by_filters(
        &self,
        caller_id: &str,
        criteria: &FilterCriteria,
    ) -> Result<FilterOutcome, RetrievalError> {
        let viewer = self.viewer_profile(caller_id).await?;
        let viewer_location = viewer.as_ref().and_then(|v| v.location);

        let query = UserQuery {
            profile_complete: true,
            age_min: criteria.age_min,
            age_max: criteria.age_max,
            education: criteria.education.clone(),
            limit: criteria.limit * self.settings.over_fetch_multiplier.max(1),
        };

        let candidates = self.store.query_users(&query).await?;
        let fetched = candidates.len();

        let outcome = FilterEngine::new(criteria, caller_id, viewer_location).filter(candidates);

        tracing::info!(
            "Filtered {} users for {} (from {} candidates, examined {})",
            outcome.users.len(),
            caller_id,
            fetched,
            outcome.stats.examined
        );
        tracing::debug!("Filter stats for {}: {:?}", caller_id, outcome.stats);

        Ok(outcome)
    }

    /// Compact projections for a batch of ids
    ///
    /// `ids` is expected to be deduplicated and capped already
    /// (`BatchUserDataRequest::into_identifier_batch`).
    pub async fn batch_get_user_data(&self, ids: Vec<String>) -> BatchUserData {
        if ids.is_empty() {
            return BatchUserData {
                users: HashMap::new(),
                total_requested: 0,
                total_found: 0,
                missing_ids: Vec::new(),
            };
        }

        let batch = self.fetcher.fetch(&ids).await;

        let users: HashMap<String, EssentialProjection> = batch
            .found
            .iter()
            .map(|(id, record)| (id.clone(), record.to_essential()))
            .collect();

        tracing::info!("Batch user query: {}/{} users found", users.len(), ids.len());

        BatchUserData {
            total_found: users.len(),
            total_requested: ids.len(),
            users,
            missing_ids: batch.missing,
        }
    }

    /// Scored recommendations the caller has not swiped on yet
    pub async fn recommendations(&self, caller_id: &str) -> Result<Vec<Recommendation>, RetrievalError> {
        let viewer = self
            .viewer_profile(caller_id)
            .await?
            .ok_or_else(|| RetrievalError::CallerNotFound(caller_id.to_string()))?;

        let seen: HashSet<String> = self.store.swiped_target_ids(caller_id).await?.into_iter().collect();

        let pool = self
            .store
            .query_users(&UserQuery {
                profile_complete: true,
                limit: self.settings.recommendation_pool,
                ..Default::default()
            })
            .await?;

        let candidates: Vec<Recommendation> = pool
            .into_iter()
            .filter(|u| u.user_id != caller_id && !seen.contains(&u.user_id) && u.is_profile_complete)
            .map(|user| Recommendation {
                compatibility_score: calculate_compatibility_score(&viewer, &user, &self.weights),
                user,
            })
            .collect();

        let considered = candidates.len();
        let recommendations = rank_recommendations(
            candidates,
            self.settings.recommendation_batch,
            &mut rand::thread_rng(),
        );

        tracing::info!(
            "Returning {} recommendations for {} ({} considered, {} already seen)",
            recommendations.len(),
            caller_id,
            considered,
            seen.len()
        );

        Ok(recommendations)
    }

    /// Active matches with the other participant resolved, newest first
    pub async fn matches(&self, caller_id: &str) -> Result<Vec<MatchSummary>, RetrievalError> {
        let matches = self.store.active_matches(caller_id).await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let counterpart_ids: Vec<String> = matches
            .iter()
            .map(|m| m.counterpart(caller_id).to_string())
            .collect();
        let batch = self.fetcher.fetch(&counterpart_ids).await;

        let mut summaries: Vec<MatchSummary> = matches
            .into_iter()
            .filter_map(|m| {
                let other = batch.found.get(m.counterpart(caller_id))?.clone();
                Some(MatchSummary {
                    match_id: m.match_id,
                    other_user: other,
                    created_at: m.created_at,
                })
            })
            .collect();

        // Newest first, undated last
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::debug!(
            "Resolved {} matches for {} ({} counterparts missing)",
            summaries.len(),
            caller_id,
            batch.missing.len()
        );

        Ok(summaries)
    }

    async fn viewer_profile(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let key = CacheKey::profile(user_id);

        if let Some(cache) = &self.cache {
            match cache.get::<UserRecord>(&key).await {
                Ok(record) => return Ok(Some(record)),
                Err(CacheError::CacheMiss(_)) => {}
                Err(e) => tracing::warn!("Profile cache read failed for {}: {}", user_id, e),
            }
        }

        let record = self.store.get_user(user_id).await?;

        if let (Some(cache), Some(record)) = (&self.cache, &record) {
            if let Err(e) = cache.set(&key, record).await {
                tracing::warn!("Failed to cache profile for {}: {}", user_id, e);
            }
        }

        Ok(record)
    }
}

/// Order by score, keep the top `batch`, then shuffle the lower half
///
/// The upper half stays in score order; the shuffle only applies when more
/// than five recommendations remain.
pub fn rank_recommendations<R: Rng + ?Sized>(
    mut candidates: Vec<Recommendation>,
    batch: usize,
    rng: &mut R,
) -> Vec<Recommendation> {
    candidates.sort_by(|a, b| b.compatibility_score.total_cmp(&a.compatibility_score));
    candidates.truncate(batch);

    if candidates.len() > 5 {
        let split = candidates.len() / 2;
        candidates[split..].shuffle(rng);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn recommendation(id: &str, score: f64) -> Recommendation {
        Recommendation {
            user: UserRecord::new(id),
            compatibility_score: score,
        }
    }

    #[test]
    fn test_rank_keeps_top_half_ordered() {
        let candidates: Vec<Recommendation> = (0..20)
            .map(|i| recommendation(&format!("u{}", i), i as f64))
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        let ranked = rank_recommendations(candidates, 10, &mut rng);

        assert_eq!(ranked.len(), 10);
        let top: Vec<f64> = ranked[..5].iter().map(|r| r.compatibility_score).collect();
        assert_eq!(top, vec![19.0, 18.0, 17.0, 16.0, 15.0]);

        let mut bottom: Vec<f64> = ranked[5..].iter().map(|r| r.compatibility_score).collect();
        bottom.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(bottom, vec![14.0, 13.0, 12.0, 11.0, 10.0]);
    }

    #[test]
    fn test_rank_small_batch_not_shuffled() {
        let candidates = vec![
            recommendation("a", 10.0),
            recommendation("b", 50.0),
            recommendation("c", 30.0),
        ];

        let mut rng = StdRng::seed_from_u64(1);
        let ranked = rank_recommendations(candidates, 10, &mut rng);

        let ids: Vec<&str> = ranked.iter().map(|r| r.user.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
