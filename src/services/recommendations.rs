use std::sync::Arc;

use uuid::Uuid;

use crate::{
    cached,
    db::{Cache, CacheKey, TasteStore},
    error::AppResult,
    models::{BeverageMatch, FeedbackType, RankedBeverage},
    observability::Observer,
    services::{ranker::Ranker, taste_profile::TasteProfileComputer},
};

/// Request-facing entry point tying the engine to the optional ranking cache
pub struct RecommendationService {
    store: Arc<dyn TasteStore>,
    ranker: Ranker,
    computer: TasteProfileComputer,
    cache: Option<Cache>,
    cache_ttl: u64,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn TasteStore>,
        observer: Arc<dyn Observer>,
        cache: Option<Cache>,
        cache_ttl: u64,
    ) -> Self {
        Self {
            ranker: Ranker::new(store.clone(), observer.clone()),
            computer: TasteProfileComputer::new(store.clone(), observer),
            store,
            cache,
            cache_ttl,
        }
    }

    /// Ranked recommendations, served from the cache when possible
    pub async fn recommendations(
        &self,
        user_id: Uuid,
        category: &str,
        limit: u32,
    ) -> AppResult<Vec<RankedBeverage>> {
        let Some(cache) = &self.cache else {
            return self
                .ranker
                .rank_recommendations(user_id, category, limit)
                .await;
        };

        let key = CacheKey::Recommendations {
            user_id,
            category: category.to_string(),
            limit,
        };
        cached!(
            cache,
            key,
            self.cache_ttl,
            self.ranker.rank_recommendations(user_id, category, limit)
        )
    }

    pub async fn match_beverage(&self, user_id: Uuid, beverage_id: Uuid) -> AppResult<BeverageMatch> {
        self.ranker
            .score_beverage_for_match(user_id, beverage_id)
            .await
    }

    pub async fn recompute_profile(&self, user_id: Uuid, category: &str) -> AppResult<()> {
        self.computer.compute_profile(user_id, category).await?;
        self.invalidate(user_id, category).await;
        Ok(())
    }

    /// Records the feedback event and folds it into the taste profile.
    ///
    /// The beverage is looked up first so unknown IDs are rejected before
    /// anything is written.
    pub async fn submit_feedback(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        feedback: FeedbackType,
    ) -> AppResult<()> {
        let beverage = self.store.get_beverage_with_tags(beverage_id).await?;

        self.store
            .record_feedback(user_id, beverage_id, feedback)
            .await?;
        self.computer
            .update_profile_with_feedback(user_id, beverage_id, feedback)
            .await?;

        self.invalidate(user_id, &beverage.category).await;
        Ok(())
    }

    async fn invalidate(&self, user_id: Uuid, category: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache.invalidate_recommendations(user_id, category).await {
            tracing::warn!(
                error = %e,
                user_id = %user_id,
                category = %category,
                "Failed to invalidate cached recommendations"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::MemoryStore, error::AppError, observability::NoopObserver};

    fn service(store: &MemoryStore) -> RecommendationService {
        RecommendationService::new(Arc::new(store.clone()), Arc::new(NoopObserver), None, 60)
    }

    #[tokio::test]
    async fn test_hidden_beverage_leaves_candidates() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let kept = store.add_beverage("Kept", None, "gin").await;
        let hidden = store.add_beverage("Hidden", None, "gin").await;
        store
            .add_scored_post(Uuid::new_v4(), hidden, Some(9.0), &[("juniper", 1.0)])
            .await;
        let service = service(&store);

        service
            .submit_feedback(user, hidden, FeedbackType::Hide)
            .await
            .unwrap();

        let ranked = service.recommendations(user, "gin", 10).await.unwrap();
        let ids: Vec<Uuid> = ranked.iter().map(|r| r.beverage_id).collect();
        assert_eq!(ids, vec![kept]);
        assert_eq!(store.feedback_for(user).await, vec![(hidden, FeedbackType::Hide)]);
    }

    #[tokio::test]
    async fn test_feedback_on_unknown_beverage_records_nothing() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let service = service(&store);

        let err = service
            .submit_feedback(user, Uuid::new_v4(), FeedbackType::MoreLikeThis)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.feedback_for(user).await.is_empty());
    }

    #[tokio::test]
    async fn test_recompute_profile_writes_profile() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let bev = store.add_beverage("Plantation", None, "rum").await;
        store
            .add_starred_post(user, bev, 5, &[("molasses", 1.0)])
            .await;

        service(&store).recompute_profile(user, "rum").await.unwrap();

        let profile = store.get_taste_profile(user, "rum").await.unwrap().unwrap();
        assert_eq!(profile.mean_rating, Some(10.0));
        assert_eq!(profile.liked_tags.get("molasses"), 1.0);
    }
}
