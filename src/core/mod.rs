// Core retrieval exports
pub mod batch;
pub mod distance;
pub mod filters;
pub mod partition;
pub mod retrieval;
pub mod scoring;

pub use batch::{BatchFetcher, PartitionOutcome};
pub use distance::{distance_between, haversine_distance, round_to_tenth};
pub use filters::{FilterEngine, FilterOutcome, FilterStats, Rejection, Verdict};
pub use partition::partition;
pub use retrieval::{rank_recommendations, BatchUserData, RetrievalError, RetrievalService, UsersByIds};
pub use scoring::calculate_compatibility_score;
