use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::models::{MatchRecord, UserQuery, UserRecord};
use crate::services::store::{StoreError, UserStore};

#[derive(Debug, Clone)]
struct Swipe {
    user_id: String,
    target_user_id: String,
}

/// In-process document store
///
/// Iteration order is insertion order. Used for local runs
/// (`store.backend = "memory"`) and as the substitute store in tests, where
/// membership queries can be made to fail or stall for chosen ids.
pub struct InMemoryStore {
    users: RwLock<Vec<UserRecord>>,
    swipes: RwLock<Vec<Swipe>>,
    matches: RwLock<Vec<MatchRecord>>,
    membership_limit: usize,
    failing_ids: RwLock<HashSet<String>>,
    stalled_ids: RwLock<Vec<(String, Duration)>>,
    failing_queries: AtomicBool,
    reads: AtomicUsize,
    membership_queries: AtomicUsize,
    last_query: RwLock<Option<UserQuery>>,
}

impl InMemoryStore {
    pub fn new(membership_limit: usize) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            swipes: RwLock::new(Vec::new()),
            matches: RwLock::new(Vec::new()),
            membership_limit: membership_limit.max(1),
            failing_ids: RwLock::new(HashSet::new()),
            stalled_ids: RwLock::new(Vec::new()),
            failing_queries: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            membership_queries: AtomicUsize::new(0),
            last_query: RwLock::new(None),
        }
    }

    pub fn with_users(membership_limit: usize, users: impl IntoIterator<Item = UserRecord>) -> Self {
        let store = Self::new(membership_limit);
        for user in users {
            store.insert_user(user);
        }
        store
    }

    /// Insert or replace a user, keeping its original position on replace
    pub fn insert_user(&self, user: UserRecord) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match users.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
    }

    pub fn insert_swipe(&self, user_id: &str, target_user_id: &str) {
        self.swipes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Swipe {
                user_id: user_id.to_string(),
                target_user_id: target_user_id.to_string(),
            });
    }

    pub fn insert_match(&self, record: MatchRecord) {
        self.matches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Membership queries that include `user_id` fail from now on
    pub fn fail_batches_containing(&self, user_id: &str) {
        self.failing_ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string());
    }

    /// Membership queries that include `user_id` sleep for `delay` first
    pub fn stall_batches_containing(&self, user_id: &str, delay: Duration) {
        self.stalled_ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((user_id.to_string(), delay));
    }

    /// Predicate queries (`query_users`) fail from now on
    pub fn fail_queries(&self) {
        self.failing_queries.store(true, Ordering::SeqCst);
    }

    /// Total number of store calls served
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn membership_query_count(&self) -> usize {
        self.membership_queries.load(Ordering::SeqCst)
    }

    /// Most recent `query_users` predicate set
    pub fn last_query(&self) -> Option<UserQuery> {
        self.last_query
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn stall_for(&self, ids: &[String]) -> Option<Duration> {
        self.stalled_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(_, delay)| *delay)
            .max()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    fn membership_limit(&self) -> usize {
        self.membership_limit
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.record_read();
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, StoreError> {
        self.record_read();
        self.membership_queries.fetch_add(1, Ordering::SeqCst);

        if ids.len() > self.membership_limit {
            return Err(StoreError::ApiError(format!(
                "membership list of {} exceeds limit {}",
                ids.len(),
                self.membership_limit
            )));
        }

        if let Some(delay) = self.stall_for(ids) {
            tokio::time::sleep(delay).await;
        }

        {
            let failing = self.failing_ids.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(id) = ids.iter().find(|id| failing.contains(*id)) {
                return Err(StoreError::Unavailable(format!("injected failure for {}", id)));
            }
        }

        let wanted: HashSet<&String> = ids.iter().collect();
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .iter()
            .filter(|u| wanted.contains(&u.user_id))
            .cloned()
            .collect())
    }

    async fn query_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>, StoreError> {
        self.record_read();
        *self.last_query.write().unwrap_or_else(PoisonError::into_inner) = Some(query.clone());

        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected query failure".to_string()));
        }

        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .iter()
            .filter(|u| !query.profile_complete || u.is_profile_complete)
            .filter(|u| match query.age_min {
                Some(min) => u.age.is_some_and(|age| age >= min),
                None => true,
            })
            .filter(|u| match query.age_max {
                Some(max) => u.age.is_some_and(|age| age <= max),
                None => true,
            })
            .filter(|u| match &query.education {
                Some(education) => u.education.as_deref() == Some(education.as_str()),
                None => true,
            })
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn swiped_target_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.record_read();
        let swipes = self.swipes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(swipes
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.target_user_id.clone())
            .collect())
    }

    async fn active_matches(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        self.record_read();
        let matches = self.matches.read().unwrap_or_else(PoisonError::into_inner);
        Ok(matches
            .iter()
            .filter(|m| m.is_active && (m.user1_id == user_id || m.user2_id == user_id))
            .cloned()
            .collect())
    }
}
