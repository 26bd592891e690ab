use std::cmp::Ordering;
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::TasteStore,
    error::AppResult,
    models::{
        is_cold_start, BeverageMatch, BeverageTag, CandidateBeverage, RankedBeverage, TagWeights,
        TasteProfile,
    },
    observability::{Observer, RecommendationEvent},
};

/// Reasons kept per recommendation
pub const MAX_REASONS: usize = 3;

/// Candidates fetched per requested result, so scoring can reorder them
pub const CANDIDATE_OVERFETCH: u32 = 3;

/// A tag must move the score by more than this to be worth explaining
const REASON_THRESHOLD: f64 = 0.3;

/// Score of a beverage nothing is known about
const NEUTRAL_SCORE: f64 = 50.0;

const POPULAR_CHOICE: &str = "Popular choice";
const HIGHLY_RATED: &str = "Highly rated";
const POPULAR_IN_CATEGORY: &str = "Popular choice in this category";

/// Explanation attached to a score, ranked by the magnitude of `score`
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationReason {
    pub reason: String,
    pub score: f64,
}

impl RecommendationReason {
    fn new(reason: impl Into<String>, score: f64) -> Self {
        Self {
            reason: reason.into(),
            score,
        }
    }
}

struct ScoredCandidate {
    candidate: CandidateBeverage,
    score: f64,
    reasons: Vec<RecommendationReason>,
}

impl ScoredCandidate {
    fn into_ranked(self) -> RankedBeverage {
        RankedBeverage {
            beverage_id: self.candidate.id,
            name: self.candidate.name,
            brand: self.candidate.brand,
            category: self.candidate.category,
            match_score: to_match_score(self.score),
            reasons: top_reasons(self.reasons, MAX_REASONS),
            avg_rating: self.candidate.avg_rating,
            review_count: self.candidate.review_count,
        }
    }
}

/// Scores and ranks beverages against a user's taste profile.
///
/// Reads profiles but never writes them. Users without a profile, or whose
/// profile rests on fewer than three reviews, get popularity ranking.
pub struct Ranker {
    store: Arc<dyn TasteStore>,
    observer: Arc<dyn Observer>,
}

impl Ranker {
    pub fn new(store: Arc<dyn TasteStore>, observer: Arc<dyn Observer>) -> Self {
        Self { store, observer }
    }

    /// Returns at most `limit` beverages from `category`, best match first
    pub async fn rank_recommendations(
        &self,
        user_id: Uuid,
        category: &str,
        limit: u32,
    ) -> AppResult<Vec<RankedBeverage>> {
        let profile = self.store.get_taste_profile(user_id, category).await?;
        let cold_start = self.detect_cold_start(user_id, category, profile.as_ref());

        let no_weights = TagWeights::new();
        let (liked, disliked) = match &profile {
            Some(profile) if !cold_start => (&profile.liked_tags, &profile.disliked_tags),
            _ => (&no_weights, &no_weights),
        };

        let candidates = self
            .store
            .get_recommendation_candidates(
                category,
                user_id,
                limit.saturating_mul(CANDIDATE_OVERFETCH),
            )
            .await?;

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // One tag lookup per candidate, in order
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let (score, reasons) = self
                .score_beverage(&candidate, liked, disliked, cold_start)
                .await;
            scored.push(ScoredCandidate {
                candidate,
                score,
                reasons,
            });
        }

        scored.sort_by(compare_scored);

        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(ScoredCandidate::into_ranked)
            .collect())
    }

    /// Match score for one beverage, outside the ranked-list flow.
    ///
    /// The profile consulted is the one for the beverage's own category.
    pub async fn score_beverage_for_match(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
    ) -> AppResult<BeverageMatch> {
        let beverage = self.store.get_beverage_with_tags(beverage_id).await?;
        let profile = self
            .store
            .get_taste_profile(user_id, &beverage.category)
            .await?;
        let cold_start = self.detect_cold_start(user_id, &beverage.category, profile.as_ref());

        let (score, reasons) = match &profile {
            Some(profile) if !cold_start => match_score(
                &beverage.tags,
                &profile.liked_tags,
                &profile.disliked_tags,
            ),
            _ => (NEUTRAL_SCORE, Vec::new()),
        };

        let mut reasons = top_reasons(reasons, MAX_REASONS);
        if cold_start || reasons.is_empty() {
            reasons = vec![POPULAR_IN_CATEGORY.to_string()];
        }

        Ok(BeverageMatch {
            match_score: to_match_score(score),
            reasons,
        })
    }

    fn detect_cold_start(
        &self,
        user_id: Uuid,
        category: &str,
        profile: Option<&TasteProfile>,
    ) -> bool {
        let cold_start = is_cold_start(profile);
        if cold_start {
            self.observer.record_event(&RecommendationEvent::ColdStart {
                user_id,
                category: category.to_string(),
                post_count: profile.map(|p| p.post_count),
            });
        }
        cold_start
    }

    /// Scores one candidate. A failed tag lookup degrades this candidate to
    /// popularity-only scoring instead of failing the ranking.
    async fn score_beverage(
        &self,
        candidate: &CandidateBeverage,
        liked: &TagWeights,
        disliked: &TagWeights,
        cold_start: bool,
    ) -> (f64, Vec<RecommendationReason>) {
        let beverage = match self.store.get_beverage_with_tags(candidate.id).await {
            Ok(beverage) => beverage,
            Err(e) => {
                self.observer
                    .record_event(&RecommendationEvent::ScoringDegraded {
                        beverage_id: candidate.id,
                        error: e.to_string(),
                    });
                return popularity_fallback(candidate);
            }
        };

        if cold_start {
            return cold_start_score(candidate);
        }

        personalized_score(candidate, &beverage.tags, liked, disliked)
    }
}

/// Score used when a candidate's tags could not be loaded
fn popularity_fallback(candidate: &CandidateBeverage) -> (f64, Vec<RecommendationReason>) {
    (
        candidate.avg_rating * 10.0,
        vec![RecommendationReason::new(POPULAR_CHOICE, candidate.avg_rating)],
    )
}

/// Global popularity; strictly increasing in both rating and review count
fn cold_start_score(candidate: &CandidateBeverage) -> (f64, Vec<RecommendationReason>) {
    let score = candidate.avg_rating * 10.0 + review_volume(candidate) * 5.0;
    (
        score,
        vec![RecommendationReason::new(HIGHLY_RATED, candidate.avg_rating)],
    )
}

fn personalized_score(
    candidate: &CandidateBeverage,
    tags: &[BeverageTag],
    liked: &TagWeights,
    disliked: &TagWeights,
) -> (f64, Vec<RecommendationReason>) {
    let mut base_score = 0.0;
    let mut reasons = Vec::new();

    for tag in tags {
        let contribution = tag_contribution(&tag.tag, liked, disliked);
        base_score += contribution;
        if let Some(reason) = tag_reason(&tag.tag, contribution) {
            reasons.push(reason);
        }
    }

    let popularity_bonus = candidate.avg_rating / 10.0 + review_volume(candidate) / 10.0;
    let score = base_score * 50.0 + popularity_bonus * 10.0 + NEUTRAL_SCORE;

    (score, reasons)
}

/// Single-item score: the neutral baseline, shifted by the summed
/// contribution of every tag divided by the number of tags strong enough
/// to explain
fn match_score(
    tags: &[BeverageTag],
    liked: &TagWeights,
    disliked: &TagWeights,
) -> (f64, Vec<RecommendationReason>) {
    let mut reasons = Vec::new();
    let mut tag_score = 0.0;

    for tag in tags {
        let contribution = tag_contribution(&tag.tag, liked, disliked);
        tag_score += contribution;
        if let Some(reason) = tag_reason(&tag.tag, contribution) {
            reasons.push(reason);
        }
    }

    if reasons.is_empty() {
        return (NEUTRAL_SCORE, reasons);
    }

    let score = NEUTRAL_SCORE + (tag_score / reasons.len() as f64) * 50.0;
    (score, reasons)
}

fn tag_contribution(tag: &str, liked: &TagWeights, disliked: &TagWeights) -> f64 {
    liked.get(tag) - disliked.get(tag)
}

fn tag_reason(tag: &str, contribution: f64) -> Option<RecommendationReason> {
    if contribution > REASON_THRESHOLD {
        Some(RecommendationReason::new(
            format!("You rate '{}' higher", tag),
            contribution,
        ))
    } else if contribution < -REASON_THRESHOLD {
        Some(RecommendationReason::new(
            format!("You rate '{}' lower", tag),
            contribution,
        ))
    } else {
        None
    }
}

fn review_volume(candidate: &CandidateBeverage) -> f64 {
    (candidate.review_count.max(0) as f64 + 1.0).ln()
}

/// Score descending, then review count descending, then ID ascending
fn compare_scored(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.candidate.review_count.cmp(&a.candidate.review_count))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

/// Reason texts ordered by absolute reason score, at most `limit`
pub fn top_reasons(mut reasons: Vec<RecommendationReason>, limit: usize) -> Vec<String> {
    reasons.sort_by(|a, b| b.score.abs().total_cmp(&a.score.abs()));
    reasons
        .into_iter()
        .take(limit)
        .map(|reason| reason.reason)
        .collect()
}

fn to_match_score(score: f64) -> u8 {
    score.clamp(0.0, 100.0).round() as u8
}
