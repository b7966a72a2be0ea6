// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BatchFetch, DiscoveredUser, EssentialProjection, FilterCriteria, Location, MatchRecord,
    MatchSummary, Recommendation, ScoringWeights, UserQuery, UserRecord,
};
pub use requests::{BatchUserDataRequest, GetByFiltersRequest, GetByIdsRequest};
pub use responses::{
    BatchUserDataResponse, ErrorResponse, FilteredUsersResponse, HealthResponse,
    MatchesResponse, RecommendationsResponse, UsersByIdsResponse,
};
