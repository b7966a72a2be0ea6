use async_trait::async_trait;
use thiserror::Error;

use crate::models::{MatchRecord, UserQuery, UserRecord};

/// Errors that can occur when reading from the document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Store query timed out after {0}ms")]
    Timeout(u64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read contract the retrieval core needs from the document store
///
/// Implementations are shared across actix workers behind an `Arc`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Largest id list accepted by a single membership query
    fn membership_limit(&self) -> usize;

    /// Fetch one user by id; `Ok(None)` when it does not exist
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Membership query: every stored user whose id is in `ids`
    ///
    /// Callers never pass more than `membership_limit()` ids.
    async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, StoreError>;

    /// Equality/range query, returned in store iteration order, at most `query.limit` rows
    async fn query_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>, StoreError>;

    /// Ids the user has already swiped on, liked or not
    async fn swiped_target_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Active matches where the user is either participant
    async fn active_matches(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
