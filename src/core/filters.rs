use crate::core::distance::{distance_between, round_to_tenth};
use crate::models::{DiscoveredUser, FilterCriteria, Location, UserRecord};

/// Why a candidate was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Excluded,
    NoSharedInterest,
    TooFar,
}

/// Per-candidate decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accept { distance_km: Option<f64> },
    Reject(Rejection),
}

/// Counters for one filtering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub examined: usize,
    pub accepted: usize,
    pub excluded: usize,
    pub no_shared_interest: usize,
    pub too_far: usize,
}

impl FilterStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Excluded => self.excluded += 1,
            Rejection::NoSharedInterest => self.no_shared_interest += 1,
            Rejection::TooFar => self.too_far += 1,
        }
    }
}

#[derive(Debug)]
pub struct FilterOutcome {
    pub users: Vec<DiscoveredUser>,
    pub stats: FilterStats,
}

/// In-process discovery filter
///
/// Age and education are expected to have been applied by the store query.
/// Per candidate, checks run cheapest first and stop at the first failure:
/// 1. identity exclusion (self and `exclude_ids`)
/// 2. interest overlap (any shared tag) when interests were requested
/// 3. distance, only when both viewer and candidate have a location
pub struct FilterEngine<'a> {
    criteria: &'a FilterCriteria,
    self_id: &'a str,
    viewer_location: Option<Location>,
}

impl<'a> FilterEngine<'a> {
    pub fn new(
        criteria: &'a FilterCriteria,
        self_id: &'a str,
        viewer_location: Option<Location>,
    ) -> Self {
        Self {
            criteria,
            self_id,
            viewer_location,
        }
    }

    /// Decide a single candidate
    #[inline]
    pub fn evaluate(&self, candidate: &UserRecord) -> Verdict {
        if candidate.user_id == self.self_id
            || self.criteria.exclude_ids.contains(&candidate.user_id)
        {
            return Verdict::Reject(Rejection::Excluded);
        }

        if !self.criteria.interests.is_empty() && !candidate.shares_interest(&self.criteria.interests) {
            return Verdict::Reject(Rejection::NoSharedInterest);
        }

        let distance_km = match (&self.viewer_location, &candidate.location) {
            (Some(viewer), Some(location)) => {
                let distance = distance_between(viewer, location);
                if distance > self.criteria.max_distance_km {
                    return Verdict::Reject(Rejection::TooFar);
                }
                Some(round_to_tenth(distance))
            }
            _ => None,
        };

        Verdict::Accept { distance_km }
    }

    /// Consume candidates until `criteria.limit` have been accepted
    ///
    /// The result is the first matches in iteration order, not a ranking.
    /// Candidates past the last accepted one are never pulled.
    pub fn filter<I>(&self, candidates: I) -> FilterOutcome
    where
        I: IntoIterator<Item = UserRecord>,
    {
        let limit = self.criteria.limit;
        let mut users = Vec::with_capacity(limit.min(128));
        let mut stats = FilterStats::default();

        if limit == 0 {
            return FilterOutcome { users, stats };
        }

        for candidate in candidates {
            stats.examined += 1;

            match self.evaluate(&candidate) {
                Verdict::Accept { distance_km } => {
                    users.push(DiscoveredUser {
                        user: candidate,
                        distance: distance_km,
                    });
                    if users.len() >= limit {
                        break;
                    }
                }
                Verdict::Reject(rejection) => stats.record(rejection),
            }
        }

        stats.accepted = users.len();
        FilterOutcome { users, stats }
    }
}
