use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::TasteStore,
    error::{AppError, AppResult},
    models::{BeverageTag, FeedbackType, TagWeights, TaggedReview, TasteProfile},
    observability::{Observer, RecommendationEvent},
    services::stats,
};

/// Weight one explicit feedback event adds to (or removes from) a tag
pub const FEEDBACK_WEIGHT: f64 = 0.5;

/// Ratings further than this many standard deviations from the mean mark a
/// tag as liked or disliked
const THRESHOLD_STD_FACTOR: f64 = 0.5;

/// Builds and maintains per-(user, category) taste profiles.
///
/// This is the only writer of profile state. A full recompute replaces the
/// stored profile; feedback patches the two weight maps and carries the
/// rating statistics through untouched.
pub struct TasteProfileComputer {
    store: Arc<dyn TasteStore>,
    observer: Arc<dyn Observer>,
}

impl TasteProfileComputer {
    pub fn new(store: Arc<dyn TasteStore>, observer: Arc<dyn Observer>) -> Self {
        Self { store, observer }
    }

    /// Recomputes the profile from the user's tagged reviews in `category`
    /// and stores it, replacing whatever was there.
    pub async fn compute_profile(&self, user_id: Uuid, category: &str) -> AppResult<()> {
        let records = self
            .store
            .get_user_posts_for_category(user_id, category)
            .await?;

        let profile = build_profile(user_id, category, &records);
        self.store.upsert_taste_profile(&profile).await?;

        self.observer
            .record_event(&RecommendationEvent::ProfileComputed {
                user_id,
                category: category.to_string(),
                post_count: profile.post_count,
                liked_tags: profile.liked_tags.len(),
                disliked_tags: profile.disliked_tags.len(),
            });

        Ok(())
    }

    /// Shifts the profile toward (or away from) the tags of `beverage_id`.
    ///
    /// Not idempotent: every call moves the weights again. Untagged
    /// beverages and `hide` leave the weights alone.
    pub async fn update_profile_with_feedback(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        feedback: FeedbackType,
    ) -> AppResult<()> {
        let beverage = self.store.get_beverage_with_tags(beverage_id).await?;

        if beverage.tags.is_empty() {
            self.observer
                .record_event(&RecommendationEvent::FeedbackSkipped {
                    user_id,
                    beverage_id,
                });
            return Ok(());
        }

        let mut profile = self.load_or_compute(user_id, &beverage.category).await?;

        apply_feedback(
            &mut profile.liked_tags,
            &mut profile.disliked_tags,
            &beverage.tags,
            feedback,
        );
        profile.liked_tags.normalize();
        profile.disliked_tags.normalize();

        self.store.upsert_taste_profile(&profile).await?;

        self.observer
            .record_event(&RecommendationEvent::FeedbackApplied {
                user_id,
                beverage_id,
                feedback,
                tag_count: beverage.tags.len(),
            });

        Ok(())
    }

    async fn load_or_compute(&self, user_id: Uuid, category: &str) -> AppResult<TasteProfile> {
        if let Some(profile) = self.store.get_taste_profile(user_id, category).await? {
            return Ok(profile);
        }

        self.compute_profile(user_id, category).await?;
        self.observer
            .record_event(&RecommendationEvent::ProfileMaterialized {
                user_id,
                category: category.to_string(),
            });

        self.store
            .get_taste_profile(user_id, category)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "taste profile for {} in '{}' missing after recompute",
                    user_id, category
                ))
            })
    }
}

/// Derives a profile from tagged review records.
///
/// Ratings at least half a standard deviation above the mean credit the
/// record's tag as liked, those at least half a deviation below as disliked.
/// When the deviation is zero both bounds meet at the mean and the liked
/// branch wins.
pub fn build_profile(user_id: Uuid, category: &str, records: &[TaggedReview]) -> TasteProfile {
    let mut profile = TasteProfile::empty(user_id, category);
    if records.is_empty() {
        return profile;
    }

    let ratings: Vec<f64> = records.iter().filter_map(usable_rating).collect();
    profile.post_count = u32::try_from(records.len()).unwrap_or(u32::MAX);

    let Some(mean) = stats::mean(&ratings) else {
        return profile;
    };
    let std = stats::std_dev(&ratings, mean);
    profile.mean_rating = Some(mean);
    profile.std_rating = Some(std);

    let high_threshold = mean + THRESHOLD_STD_FACTOR * std;
    let low_threshold = mean - THRESHOLD_STD_FACTOR * std;

    for record in records {
        let (Some(rating), Some(tag)) = (usable_rating(record), record.tag.as_deref()) else {
            continue;
        };

        if rating >= high_threshold {
            profile.liked_tags.add(tag, record.confidence);
        } else if rating <= low_threshold {
            profile.disliked_tags.add(tag, record.confidence);
        }
    }

    profile.liked_tags.normalize();
    profile.disliked_tags.normalize();
    profile
}

fn usable_rating(record: &TaggedReview) -> Option<f64> {
    record.rating.filter(|rating| *rating > 0.0)
}

/// Applies one feedback event to the raw weights, without normalizing
pub fn apply_feedback(
    liked: &mut TagWeights,
    disliked: &mut TagWeights,
    tags: &[BeverageTag],
    feedback: FeedbackType,
) {
    let (boost, decay) = match feedback {
        FeedbackType::MoreLikeThis => (liked, disliked),
        FeedbackType::LessLikeThis => (disliked, liked),
        // hidden beverages are excluded by the candidate query instead
        FeedbackType::Hide => return,
    };

    for tag in tags {
        boost.add(&tag.tag, FEEDBACK_WEIGHT);
        decay.decay(&tag.tag, FEEDBACK_WEIGHT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{MemoryStore, MockTasteStore},
        models::BeverageWithTags,
        observability::{testing::RecordingObserver, NoopObserver},
    };

    fn weights(entries: &[(&str, f64)]) -> TagWeights {
        entries.iter().map(|(t, w)| (*t, *w)).collect()
    }

    fn tag(name: &str) -> BeverageTag {
        BeverageTag {
            tag: name.to_string(),
            tag_type: "descriptor".to_string(),
            count: 1,
        }
    }

    fn review(rating: f64, tag: &str) -> TaggedReview {
        TaggedReview::new(Some(rating), Some(tag))
    }

    fn computer(store: &MemoryStore) -> (TasteProfileComputer, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let computer = TasteProfileComputer::new(Arc::new(store.clone()), observer.clone());
        (computer, observer)
    }

    #[test]
    fn test_build_profile_empty_input() {
        let profile = build_profile(Uuid::new_v4(), "whiskey", &[]);
        assert_eq!(profile.post_count, 0);
        assert!(profile.liked_tags.is_empty());
        assert!(profile.disliked_tags.is_empty());
        assert_eq!(profile.mean_rating, None);
        assert_eq!(profile.std_rating, None);
    }

    #[test]
    fn test_build_profile_single_record_is_liked() {
        let profile = build_profile(Uuid::new_v4(), "whiskey", &[review(9.0, "oaky")]);
        assert_eq!(profile.mean_rating, Some(9.0));
        assert_eq!(profile.std_rating, Some(0.0));
        assert_eq!(profile.liked_tags, weights(&[("oaky", 1.0)]));
        assert!(profile.disliked_tags.is_empty());
        assert_eq!(profile.post_count, 1);
    }

    #[test]
    fn test_build_profile_splits_on_thresholds() {
        // mean 7, std 2 -> liked at >= 8, disliked at <= 6
        let records = [review(9.0, "oaky"), review(5.0, "sweet"), review(7.0, "fruity")];
        let profile = build_profile(Uuid::new_v4(), "wine", &records);

        assert_eq!(profile.mean_rating, Some(7.0));
        assert_eq!(profile.std_rating, Some(2.0));
        assert_eq!(profile.liked_tags, weights(&[("oaky", 1.0)]));
        assert_eq!(profile.disliked_tags, weights(&[("sweet", 1.0)]));
        assert_eq!(profile.post_count, 3);
    }

    #[test]
    fn test_build_profile_accumulates_confidence() {
        let records = [
            review(9.0, "oaky"),
            review(9.0, "vanilla").with_confidence(0.5),
            review(9.0, "oaky").with_confidence(1.0),
            review(3.0, "sweet").with_confidence(0.8),
        ];
        let profile = build_profile(Uuid::new_v4(), "whiskey", &records);

        assert_eq!(profile.liked_tags, weights(&[("oaky", 1.0), ("vanilla", 0.25)]));
        assert_eq!(profile.disliked_tags, weights(&[("sweet", 1.0)]));
    }

    #[test]
    fn test_build_profile_counts_unusable_records() {
        let records = [
            review(9.0, "oaky"),
            TaggedReview::new(None, Some("smoky")),
            TaggedReview::new(Some(8.0), None),
            review(0.0, "sweet"),
        ];
        let profile = build_profile(Uuid::new_v4(), "whiskey", &records);

        assert_eq!(profile.post_count, 4);
        assert_eq!(profile.mean_rating, Some(8.5));
        assert!(!profile.liked_tags.contains("smoky"));
        assert!(!profile.liked_tags.contains("sweet"));
        assert!(!profile.disliked_tags.contains("sweet"));
    }

    #[test]
    fn test_build_profile_without_ratings_has_no_statistics() {
        let records = [TaggedReview::new(None, Some("hoppy"))];
        let profile = build_profile(Uuid::new_v4(), "beer", &records);

        assert_eq!(profile.post_count, 1);
        assert_eq!(profile.mean_rating, None);
        assert!(profile.liked_tags.is_empty());
    }

    #[test]
    fn test_more_like_this_boosts_and_decays() {
        let mut liked = weights(&[("oaky", 1.0)]);
        let mut disliked = weights(&[("smoky", 0.3), ("fruity", 1.0)]);

        apply_feedback(
            &mut liked,
            &mut disliked,
            &[tag("oaky"), tag("smoky")],
            FeedbackType::MoreLikeThis,
        );

        assert_eq!(liked.get("oaky"), 1.5);
        assert_eq!(liked.get("smoky"), 0.5);
        assert_eq!(disliked.get("smoky"), 0.0);
        assert_eq!(disliked.get("fruity"), 1.0);
        assert!(!disliked.contains("oaky"));
    }

    #[test]
    fn test_less_like_this_is_symmetric() {
        let mut liked = weights(&[("sweet", 1.0)]);
        let mut disliked = TagWeights::new();

        apply_feedback(&mut liked, &mut disliked, &[tag("sweet")], FeedbackType::LessLikeThis);

        assert_eq!(disliked.get("sweet"), 0.5);
        assert_eq!(liked.get("sweet"), 0.5);
    }

    #[test]
    fn test_hide_leaves_weights_alone() {
        let mut liked = weights(&[("oaky", 1.0)]);
        let mut disliked = weights(&[("sweet", 0.4)]);

        apply_feedback(&mut liked, &mut disliked, &[tag("oaky"), tag("sweet")], FeedbackType::Hide);

        assert_eq!(liked, weights(&[("oaky", 1.0)]));
        assert_eq!(disliked, weights(&[("sweet", 0.4)]));
    }

    #[tokio::test]
    async fn test_compute_profile_persists_empty_profile() {
        let store = MemoryStore::new();
        let (computer, observer) = computer(&store);
        let user = Uuid::new_v4();

        computer.compute_profile(user, "rum").await.unwrap();

        let profile = store.get_taste_profile(user, "rum").await.unwrap().unwrap();
        assert_eq!(profile, TasteProfile::empty(user, "rum"));
        assert_eq!(observer.kinds(), vec!["profile_computed"]);
    }

    #[tokio::test]
    async fn test_compute_profile_is_repeatable() {
        let store = MemoryStore::new();
        let (computer, _) = computer(&store);
        let user = Uuid::new_v4();
        for (name, score, tags) in [
            ("Ardbeg 10", 9.5, vec![("peaty", 1.0), ("smoky", 0.8)]),
            ("Glenlivet 12", 6.0, vec![("fruity", 0.9)]),
            ("Jameson", 4.0, vec![("sweet", 1.0)]),
        ] {
            let bev = store.add_beverage(name, None, "whiskey").await;
            store.add_scored_post(user, bev, Some(score), &tags).await;
        }

        computer.compute_profile(user, "whiskey").await.unwrap();
        let first = store.get_taste_profile(user, "whiskey").await.unwrap();
        computer.compute_profile(user, "whiskey").await.unwrap();
        let second = store.get_taste_profile(user, "whiskey").await.unwrap();

        assert_eq!(first, second);
        let profile = first.unwrap();
        assert_eq!(profile.post_count, 4);
        assert_eq!(profile.liked_tags.get("peaty"), 1.0);
        assert_eq!(profile.disliked_tags.get("sweet"), 1.0);
    }

    #[tokio::test]
    async fn test_feedback_on_untagged_beverage_is_noop() {
        let store = MemoryStore::new();
        let (computer, observer) = computer(&store);
        let user = Uuid::new_v4();
        let bev = store.add_beverage("Mystery Bottle", None, "wine").await;

        computer
            .update_profile_with_feedback(user, bev, FeedbackType::MoreLikeThis)
            .await
            .unwrap();

        assert!(store.get_taste_profile(user, "wine").await.unwrap().is_none());
        assert_eq!(observer.kinds(), vec!["feedback_skipped"]);
    }

    #[tokio::test]
    async fn test_feedback_materializes_missing_profile() {
        let store = MemoryStore::new();
        let (computer, observer) = computer(&store);
        let user = Uuid::new_v4();
        let bev = store.add_beverage("Barolo", None, "wine").await;
        store
            .add_scored_post(Uuid::new_v4(), bev, Some(8.0), &[("tannic", 1.0)])
            .await;

        computer
            .update_profile_with_feedback(user, bev, FeedbackType::MoreLikeThis)
            .await
            .unwrap();

        let profile = store.get_taste_profile(user, "wine").await.unwrap().unwrap();
        assert_eq!(profile.liked_tags, weights(&[("tannic", 1.0)]));
        assert_eq!(profile.post_count, 0);
        assert_eq!(
            observer.kinds(),
            vec!["profile_computed", "profile_materialized", "feedback_applied"]
        );
    }

    #[tokio::test]
    async fn test_feedback_keeps_rating_statistics() {
        let store = MemoryStore::new();
        let (computer, _) = computer(&store);
        let user = Uuid::new_v4();
        let bev = store.add_beverage("Chablis", None, "wine").await;
        store
            .add_scored_post(Uuid::new_v4(), bev, Some(8.0), &[("mineral", 1.0)])
            .await;

        let mut existing = TasteProfile::empty(user, "wine");
        existing.liked_tags = weights(&[("buttery", 1.0)]);
        existing.disliked_tags = weights(&[("mineral", 1.0)]);
        existing.mean_rating = Some(7.2);
        existing.std_rating = Some(1.1);
        existing.post_count = 6;
        store.upsert_taste_profile(&existing).await.unwrap();

        computer
            .update_profile_with_feedback(user, bev, FeedbackType::MoreLikeThis)
            .await
            .unwrap();

        let profile = store.get_taste_profile(user, "wine").await.unwrap().unwrap();
        assert_eq!(profile.mean_rating, Some(7.2));
        assert_eq!(profile.std_rating, Some(1.1));
        assert_eq!(profile.post_count, 6);
        assert_eq!(profile.liked_tags, weights(&[("buttery", 1.0), ("mineral", 0.5)]));
        assert_eq!(profile.disliked_tags, weights(&[("mineral", 1.0)]));
    }

    #[tokio::test]
    async fn test_hide_feedback_keeps_profile() {
        let store = MemoryStore::new();
        let (computer, _) = computer(&store);
        let user = Uuid::new_v4();
        let bev = store.add_beverage("Merlot", None, "wine").await;
        store
            .add_scored_post(Uuid::new_v4(), bev, Some(5.0), &[("jammy", 1.0)])
            .await;

        let mut existing = TasteProfile::empty(user, "wine");
        existing.liked_tags = weights(&[("jammy", 1.0), ("earthy", 0.4)]);
        existing.disliked_tags = weights(&[("oaky", 1.0)]);
        existing.post_count = 5;
        store.upsert_taste_profile(&existing).await.unwrap();

        computer
            .update_profile_with_feedback(user, bev, FeedbackType::Hide)
            .await
            .unwrap();

        let profile = store.get_taste_profile(user, "wine").await.unwrap().unwrap();
        assert_eq!(profile, existing);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockTasteStore::new();
        store
            .expect_get_user_posts_for_category()
            .returning(|_, _| Err(AppError::Database(sqlx::Error::PoolTimedOut)));
        store.expect_upsert_taste_profile().never();

        let computer = TasteProfileComputer::new(Arc::new(store), Arc::new(NoopObserver));
        let err = computer
            .compute_profile(Uuid::new_v4(), "whiskey")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_feedback_upsert_failure_propagates() {
        let mut store = MockTasteStore::new();
        store.expect_get_beverage_with_tags().returning(|id| {
            Ok(BeverageWithTags {
                id,
                category: "beer".to_string(),
                tags: vec![tag("hoppy")],
            })
        });
        store.expect_get_taste_profile().returning(|user, category| {
            Ok(Some(TasteProfile::empty(user, category)))
        });
        store
            .expect_upsert_taste_profile()
            .times(1)
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolClosed)));

        let computer = TasteProfileComputer::new(Arc::new(store), Arc::new(NoopObserver));
        let err = computer
            .update_profile_with_feedback(Uuid::new_v4(), Uuid::new_v4(), FeedbackType::LessLikeThis)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
    }
}
