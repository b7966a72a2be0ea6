//! Dating retrieval - user lookup and discovery service for the dating app backend
//!
//! Batched multi-user retrieval against a document store with a bounded
//! membership-query size, proximity and attribute filtering for discovery,
//! and per-partition failure isolation.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{BatchFetcher, FilterEngine, RetrievalService, haversine_distance, partition};
pub use error::ApiError;
pub use models::{FilterCriteria, Location, UserRecord};
pub use services::{InMemoryStore, UserStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let parts = partition(&["a", "b", "c"], 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(haversine_distance(1.0, 1.0, 1.0, 1.0), 0.0);
    }
}
