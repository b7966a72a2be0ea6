use std::collections::HashSet;

use crate::core::distance::distance_between;
use crate::models::{ScoringWeights, UserRecord};

/// Age assumed for profiles that have not filled it in
const FALLBACK_AGE: u32 = 25;

/// Calculate a compatibility score (0-100) between the viewer and a candidate
///
/// Scoring formula (default weights):
/// score = (
///     age_score * 30 +         # 2 points lost per year of age gap
///     interest_score * 40 +    # Jaccard overlap of interest sets
///     location_score * 20 +    # 0.4 points lost per km
///     education_score * 10     # Same declared education
/// )
pub fn calculate_compatibility_score(
    viewer: &UserRecord,
    candidate: &UserRecord,
    weights: &ScoringWeights,
) -> f64 {
    let age_score = calculate_age_score(
        viewer.age.unwrap_or(FALLBACK_AGE),
        candidate.age.unwrap_or(FALLBACK_AGE),
        weights.age,
    );

    let interest_score = calculate_interest_score(&viewer.interests, &candidate.interests) * weights.interests;

    let location_score = match (&viewer.location, &candidate.location) {
        (Some(a), Some(b)) => calculate_location_score(distance_between(a, b), weights.location),
        _ => 0.0,
    };

    let education_score = match (&viewer.education, &candidate.education) {
        (Some(a), Some(b)) if a == b => weights.education,
        _ => 0.0,
    };

    (age_score + interest_score + location_score + education_score).clamp(0.0, 100.0)
}

/// Age points: full weight for the same age, 2 points lost per year apart
#[inline]
fn calculate_age_score(age1: u32, age2: u32, weight: f64) -> f64 {
    let gap = age1.abs_diff(age2) as f64;
    (weight - gap * 2.0).max(0.0)
}

/// Interest overlap (0-1): shared tags over all distinct tags
#[inline]
fn calculate_interest_score(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let common = a.intersection(&b).count() as f64;
    let total = a.union(&b).count() as f64;

    if total > 0.0 { common / total } else { 0.0 }
}

/// Location points: full weight when co-located, 0.4 points lost per km
#[inline]
fn calculate_location_score(distance_km: f64, weight: f64) -> f64 {
    (weight - distance_km * 0.4).max(0.0)
}
