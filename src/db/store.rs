use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{BeverageWithTags, CandidateBeverage, FeedbackType, TaggedReview, TasteProfile},
};

/// Persistence boundary of the recommendation engine
///
/// Profiles are soft state: `upsert_taste_profile` fully replaces the stored
/// row with no concurrency token, so two concurrent writers for the same
/// (user, category) resolve as last-writer-wins. A lost update only leaves a
/// slightly stale profile until the next recompute or feedback event.
///
/// Every call is a plain future; dropping it (request timeout, client
/// disconnect) abandons the call.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TasteStore: Send + Sync {
    /// Stored profile, `None` when the user has none for the category
    async fn get_taste_profile(
        &self,
        user_id: Uuid,
        category: &str,
    ) -> AppResult<Option<TasteProfile>>;

    /// Replaces the whole profile row
    async fn upsert_taste_profile(&self, profile: &TasteProfile) -> AppResult<()>;

    /// One record per (review, tag) pair; untagged reviews yield one record
    /// with no tag
    async fn get_user_posts_for_category(
        &self,
        user_id: Uuid,
        category: &str,
    ) -> AppResult<Vec<TaggedReview>>;

    /// Beverages in `category` the user has neither reviewed nor hidden
    async fn get_recommendation_candidates(
        &self,
        category: &str,
        user_id: Uuid,
        limit: u32,
    ) -> AppResult<Vec<CandidateBeverage>>;

    /// Fails with `NotFound` when the beverage does not exist
    async fn get_beverage_with_tags(&self, beverage_id: Uuid) -> AppResult<BeverageWithTags>;

    /// Persists a feedback event; `hide` events drive candidate exclusion
    async fn record_feedback(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        feedback: FeedbackType,
    ) -> AppResult<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
