//! Event reporting for the recommendation engine.
//!
//! The profile computer and ranker report what happened through an injected
//! [`Observer`] instead of logging directly, so they can be exercised in tests
//! without a subscriber and so deployments can route events elsewhere.

use uuid::Uuid;

use crate::models::FeedbackType;

#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationEvent {
    ProfileComputed {
        user_id: Uuid,
        category: String,
        post_count: u32,
        liked_tags: usize,
        disliked_tags: usize,
    },
    /// Feedback arrived before any profile existed, so one was computed first
    ProfileMaterialized { user_id: Uuid, category: String },
    FeedbackApplied {
        user_id: Uuid,
        beverage_id: Uuid,
        feedback: FeedbackType,
        tag_count: usize,
    },
    /// The beverage carries no tags, so there was nothing to learn
    FeedbackSkipped { user_id: Uuid, beverage_id: Uuid },
    ColdStart {
        user_id: Uuid,
        category: String,
        post_count: Option<u32>,
    },
    /// Tag lookup failed for one candidate; it was scored on popularity alone
    ScoringDegraded { beverage_id: Uuid, error: String },
}

impl RecommendationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendationEvent::ProfileComputed { .. } => "profile_computed",
            RecommendationEvent::ProfileMaterialized { .. } => "profile_materialized",
            RecommendationEvent::FeedbackApplied { .. } => "feedback_applied",
            RecommendationEvent::FeedbackSkipped { .. } => "feedback_skipped",
            RecommendationEvent::ColdStart { .. } => "cold_start",
            RecommendationEvent::ScoringDegraded { .. } => "scoring_degraded",
        }
    }
}

pub trait Observer: Send + Sync {
    fn record_event(&self, event: &RecommendationEvent);

    fn name(&self) -> &'static str;
}

/// Discards every event
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record_event(&self, _event: &RecommendationEvent) {}

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Emits events as structured `tracing` records
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record_event(&self, event: &RecommendationEvent) {
        match event {
            RecommendationEvent::ProfileComputed {
                user_id,
                category,
                post_count,
                liked_tags,
                disliked_tags,
            } => tracing::info!(
                user_id = %user_id,
                category = %category,
                post_count,
                liked_tags,
                disliked_tags,
                "Taste profile computed"
            ),
            RecommendationEvent::ProfileMaterialized { user_id, category } => tracing::info!(
                user_id = %user_id,
                category = %category,
                "No taste profile yet, computed one before applying feedback"
            ),
            RecommendationEvent::FeedbackApplied {
                user_id,
                beverage_id,
                feedback,
                tag_count,
            } => tracing::info!(
                user_id = %user_id,
                beverage_id = %beverage_id,
                feedback = %feedback,
                tag_count,
                "Feedback applied to taste profile"
            ),
            RecommendationEvent::FeedbackSkipped {
                user_id,
                beverage_id,
            } => tracing::debug!(
                user_id = %user_id,
                beverage_id = %beverage_id,
                "No tags for beverage, skipping taste profile update"
            ),
            RecommendationEvent::ColdStart {
                user_id,
                category,
                post_count,
            } => tracing::debug!(
                user_id = %user_id,
                category = %category,
                post_count = ?post_count,
                "Using cold-start recommendations"
            ),
            RecommendationEvent::ScoringDegraded { beverage_id, error } => tracing::warn!(
                beverage_id = %beverage_id,
                error = %error,
                "Failed to get tags for beverage, falling back to popularity score"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}
