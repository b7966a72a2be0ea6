use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::core::partition::partition;
use crate::models::{BatchFetch, UserRecord};
use crate::services::{StoreError, UserStore};

/// Result of one membership query
#[derive(Debug)]
pub enum PartitionOutcome {
    Fetched(Vec<UserRecord>),
    Failed { ids: Vec<String>, reason: String },
}

/// Fetches arbitrarily many users through size-limited membership queries
///
/// Partitions run concurrently (bounded by `concurrency`) and are merged
/// after they have all finished. A partition that errors or times out only
/// turns its own ids into misses.
#[derive(Clone)]
pub struct BatchFetcher {
    store: Arc<dyn UserStore>,
    membership_limit: usize,
    concurrency: usize,
    partition_timeout: Option<Duration>,
}

impl BatchFetcher {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        let membership_limit = store.membership_limit().max(1);
        Self {
            store,
            membership_limit,
            concurrency: 4,
            partition_timeout: None,
        }
    }

    /// Partition with a tighter limit than the store advertises
    pub fn with_membership_limit(mut self, limit: usize) -> Self {
        self.membership_limit = limit.clamp(1, self.store.membership_limit().max(1));
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_partition_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.partition_timeout = timeout;
        self
    }

    pub fn membership_limit(&self) -> usize {
        self.membership_limit
    }

    /// Fetch every id in `ids`
    ///
    /// Duplicates are collapsed before querying. `missing` lists the
    /// requested ids not found (first-occurrence order), including every id
    /// of a failed partition.
    pub async fn fetch(&self, ids: &[String]) -> BatchFetch {
        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let partitions = partition(&unique, self.membership_limit);
        let partition_count = partitions.len();

        let outcomes: Vec<PartitionOutcome> = stream::iter(partitions)
            .map(|chunk| self.fetch_partition(chunk))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut found: HashMap<String, UserRecord> = HashMap::with_capacity(unique.len());
        let mut failed_partitions = 0;

        for outcome in outcomes {
            match outcome {
                PartitionOutcome::Fetched(records) => {
                    for record in records {
                        found.insert(record.user_id.clone(), record);
                    }
                }
                PartitionOutcome::Failed { ids, reason } => {
                    failed_partitions += 1;
                    tracing::warn!(
                        "Partition of {} ids failed, treating as missing: {}",
                        ids.len(),
                        reason
                    );
                }
            }
        }

        let missing: Vec<String> = unique
            .iter()
            .filter(|id| !found.contains_key(*id))
            .cloned()
            .collect();

        tracing::debug!(
            "Batch fetch: {}/{} found across {} partitions ({} failed)",
            found.len(),
            unique.len(),
            partition_count,
            failed_partitions
        );

        BatchFetch {
            found,
            missing,
            total_requested: unique.len(),
            failed_partitions,
        }
    }

    async fn fetch_partition(&self, ids: Vec<String>) -> PartitionOutcome {
        let query = self.store.get_users_by_ids(&ids);
        let result = match self.partition_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, query).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
            },
            None => query.await,
        };

        match result {
            Ok(records) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let (kept, stray): (Vec<_>, Vec<_>) = records
                    .into_iter()
                    .partition(|r| wanted.contains(r.user_id.as_str()));
                if !stray.is_empty() {
                    tracing::warn!("Dropped {} records the store returned outside the requested ids", stray.len());
                }
                PartitionOutcome::Fetched(kept)
            }
            Err(e) => PartitionOutcome::Failed {
                ids,
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryStore;

    fn seeded_store(n: usize) -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_users(
            30,
            (0..n).map(|i| UserRecord::new(format!("u{}", i))),
        ))
    }

    fn ids(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("u{}", i)).collect()
    }

    #[tokio::test]
    async fn test_fetch_partitions_by_limit() {
        let store = seeded_store(95);
        let fetcher = BatchFetcher::new(store.clone());

        let result = fetcher.fetch(&ids(0..95)).await;

        assert_eq!(result.total_found(), 95);
        assert!(result.missing.is_empty());
        assert_eq!(store.membership_query_count(), 4);
    }

    #[tokio::test]
    async fn test_found_and_missing_partition_request() {
        let store = seeded_store(40);
        let fetcher = BatchFetcher::new(store);

        let requested = ids(20..70);
        let result = fetcher.fetch(&requested).await;

        assert_eq!(result.total_found(), 20);
        assert_eq!(result.missing.len(), 30);
        assert_eq!(result.total_found() + result.missing.len(), result.total_requested);
        for id in &result.missing {
            assert!(!result.found.contains_key(id));
        }
        assert_eq!(result.missing[0], "u40");
    }

    #[tokio::test]
    async fn test_failed_partition_is_isolated() {
        let store = seeded_store(60);
        store.fail_batches_containing("u45");
        let fetcher = BatchFetcher::new(store);

        let result = fetcher.fetch(&ids(0..60)).await;

        assert_eq!(result.failed_partitions, 1);
        assert_eq!(result.total_found(), 30);
        assert_eq!(result.missing, ids(30..60));
        assert!(ids(0..30).iter().all(|id| result.found.contains_key(id)));
    }

    #[tokio::test]
    async fn test_timed_out_partition_is_missing() {
        let store = seeded_store(60);
        store.stall_batches_containing("u5", Duration::from_millis(500));
        let fetcher = BatchFetcher::new(store)
            .with_partition_timeout(Some(Duration::from_millis(50)));

        let result = fetcher.fetch(&ids(0..60)).await;

        assert_eq!(result.failed_partitions, 1);
        assert_eq!(result.missing, ids(0..30));
        assert_eq!(result.total_found(), 30);
    }

    #[tokio::test]
    async fn test_duplicates_collapsed() {
        let store = seeded_store(5);
        let fetcher = BatchFetcher::new(store.clone());

        let requested: Vec<String> = vec!["u1", "u1", "u2", "nope", "u2"]
            .into_iter()
            .map(String::from)
            .collect();
        let result = fetcher.fetch(&requested).await;

        assert_eq!(result.total_requested, 3);
        assert_eq!(result.total_found(), 2);
        assert_eq!(result.missing, vec!["nope".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_request_skips_store() {
        let store = seeded_store(5);
        let fetcher = BatchFetcher::new(store.clone());

        let result = fetcher.fetch(&[]).await;

        assert_eq!(result.total_requested, 0);
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_tighter_membership_limit() {
        let store = seeded_store(20);
        let fetcher = BatchFetcher::new(store.clone()).with_membership_limit(5);

        let result = fetcher.fetch(&ids(0..20)).await;

        assert_eq!(result.total_found(), 20);
        assert_eq!(store.membership_query_count(), 4);
    }
}
