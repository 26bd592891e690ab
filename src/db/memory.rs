use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::TasteStore,
    error::{AppError, AppResult},
    models::{
        normalize_rating, BeverageTag, BeverageWithTags, CandidateBeverage, FeedbackType,
        TagWeights, TaggedReview, TasteProfile,
    },
};

const DEFAULT_TAG_TYPE: &str = "descriptor";

struct BeverageRecord {
    id: Uuid,
    name: String,
    brand: Option<String>,
    category: String,
}

struct PostTagRecord {
    tag: String,
    tag_type: String,
    confidence: f64,
}

struct PostRecord {
    user_id: Uuid,
    beverage_id: Uuid,
    score: Option<f64>,
    stars: Option<i32>,
    tags: Vec<PostTagRecord>,
}

/// Profile row in its persisted shape, weights kept as JSON text
struct ProfileRow {
    liked_tags_json: String,
    disliked_tags_json: String,
    mean_rating: Option<f64>,
    std_rating: Option<f64>,
    post_count: u32,
}

#[derive(Default)]
struct MemoryStoreInner {
    beverages: HashMap<Uuid, BeverageRecord>,
    posts: Vec<PostRecord>,
    profiles: HashMap<(Uuid, String), ProfileRow>,
    feedback: Vec<(Uuid, Uuid, FeedbackType)>,
}

/// In-process store used for local runs and tests
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a beverage and returns its ID
    pub async fn add_beverage(&self, name: &str, brand: Option<&str>, category: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.beverages.insert(
            id,
            BeverageRecord {
                id,
                name: name.to_string(),
                brand: brand.map(str::to_string),
                category: category.to_string(),
            },
        );
        id
    }

    /// Adds a review with a continuous score and `(tag, confidence)` pairs
    pub async fn add_scored_post(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        score: Option<f64>,
        tags: &[(&str, f64)],
    ) {
        self.add_post(user_id, beverage_id, score, None, tags).await;
    }

    /// Adds a review with a star count and `(tag, confidence)` pairs
    pub async fn add_starred_post(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        stars: i32,
        tags: &[(&str, f64)],
    ) {
        self.add_post(user_id, beverage_id, None, Some(stars), tags).await;
    }

    async fn add_post(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        score: Option<f64>,
        stars: Option<i32>,
        tags: &[(&str, f64)],
    ) {
        let tags = tags
            .iter()
            .map(|(tag, confidence)| PostTagRecord {
                tag: tag.to_string(),
                tag_type: DEFAULT_TAG_TYPE.to_string(),
                confidence: *confidence,
            })
            .collect();

        self.inner.write().await.posts.push(PostRecord {
            user_id,
            beverage_id,
            score,
            stars,
            tags,
        });
    }

    /// Overwrites the stored weight blobs verbatim
    pub async fn put_raw_profile(
        &self,
        user_id: Uuid,
        category: &str,
        liked_tags_json: &str,
        disliked_tags_json: &str,
        post_count: u32,
    ) {
        self.inner.write().await.profiles.insert(
            (user_id, category.to_string()),
            ProfileRow {
                liked_tags_json: liked_tags_json.to_string(),
                disliked_tags_json: disliked_tags_json.to_string(),
                mean_rating: None,
                std_rating: None,
                post_count,
            },
        );
    }

    /// Feedback events recorded for a user
    pub async fn feedback_for(&self, user_id: Uuid) -> Vec<(Uuid, FeedbackType)> {
        self.inner
            .read()
            .await
            .feedback
            .iter()
            .filter(|(user, _, _)| *user == user_id)
            .map(|(_, beverage, feedback)| (*beverage, *feedback))
            .collect()
    }
}

impl MemoryStoreInner {
    fn post_rating(post: &PostRecord) -> Option<f64> {
        normalize_rating(post.score, post.stars)
    }

    fn is_excluded(&self, beverage_id: Uuid, user_id: Uuid) -> bool {
        let reviewed = self
            .posts
            .iter()
            .any(|p| p.beverage_id == beverage_id && p.user_id == user_id);
        let hidden = self.feedback.iter().any(|(user, beverage, feedback)| {
            *user == user_id && *beverage == beverage_id && *feedback == FeedbackType::Hide
        });
        reviewed || hidden
    }

    fn candidate(&self, beverage: &BeverageRecord) -> CandidateBeverage {
        let posts: Vec<&PostRecord> = self
            .posts
            .iter()
            .filter(|p| p.beverage_id == beverage.id)
            .collect();
        let ratings: Vec<f64> = posts.iter().filter_map(|p| Self::post_rating(p)).collect();
        let avg_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<f64>() / ratings.len() as f64
        };

        CandidateBeverage {
            id: beverage.id,
            name: beverage.name.clone(),
            brand: beverage.brand.clone(),
            category: beverage.category.clone(),
            avg_rating,
            review_count: posts.len() as i64,
        }
    }
}

#[async_trait::async_trait]
impl TasteStore for MemoryStore {
    async fn get_taste_profile(
        &self,
        user_id: Uuid,
        category: &str,
    ) -> AppResult<Option<TasteProfile>> {
        let inner = self.inner.read().await;
        let Some(row) = inner.profiles.get(&(user_id, category.to_string())) else {
            return Ok(None);
        };

        Ok(Some(TasteProfile {
            user_id,
            category: category.to_string(),
            liked_tags: TagWeights::from_json(&row.liked_tags_json)?,
            disliked_tags: TagWeights::from_json(&row.disliked_tags_json)?,
            mean_rating: row.mean_rating,
            std_rating: row.std_rating,
            post_count: row.post_count,
        }))
    }

    async fn upsert_taste_profile(&self, profile: &TasteProfile) -> AppResult<()> {
        let row = ProfileRow {
            liked_tags_json: profile.liked_tags.to_json()?,
            disliked_tags_json: profile.disliked_tags.to_json()?,
            mean_rating: profile.mean_rating,
            std_rating: profile.std_rating,
            post_count: profile.post_count,
        };
        self.inner
            .write()
            .await
            .profiles
            .insert((profile.user_id, profile.category.clone()), row);
        Ok(())
    }

    async fn get_user_posts_for_category(
        &self,
        user_id: Uuid,
        category: &str,
    ) -> AppResult<Vec<TaggedReview>> {
        let inner = self.inner.read().await;
        let mut records = Vec::new();

        for post in inner.posts.iter().filter(|p| p.user_id == user_id) {
            let in_category = inner
                .beverages
                .get(&post.beverage_id)
                .is_some_and(|b| b.category == category);
            if !in_category {
                continue;
            }

            let rating = MemoryStoreInner::post_rating(post);
            if post.tags.is_empty() {
                records.push(TaggedReview::new(rating, None));
            }
            for tag in &post.tags {
                records.push(
                    TaggedReview::new(rating, Some(&tag.tag)).with_confidence(tag.confidence),
                );
            }
        }

        Ok(records)
    }

    async fn get_recommendation_candidates(
        &self,
        category: &str,
        user_id: Uuid,
        limit: u32,
    ) -> AppResult<Vec<CandidateBeverage>> {
        let inner = self.inner.read().await;
        let mut candidates: Vec<CandidateBeverage> = inner
            .beverages
            .values()
            .filter(|b| b.category == category && !inner.is_excluded(b.id, user_id))
            .map(|b| inner.candidate(b))
            .collect();

        candidates.sort_by(|a, b| {
            b.avg_rating
                .partial_cmp(&a.avg_rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.review_count.cmp(&a.review_count))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(limit as usize);

        Ok(candidates)
    }

    async fn get_beverage_with_tags(&self, beverage_id: Uuid) -> AppResult<BeverageWithTags> {
        let inner = self.inner.read().await;
        let beverage = inner
            .beverages
            .get(&beverage_id)
            .ok_or_else(|| AppError::NotFound(format!("beverage {}", beverage_id)))?;

        let mut counts: BTreeMap<(String, String), i64> = BTreeMap::new();
        for post in inner.posts.iter().filter(|p| p.beverage_id == beverage_id) {
            for tag in &post.tags {
                *counts
                    .entry((tag.tag.clone(), tag.tag_type.clone()))
                    .or_insert(0) += 1;
            }
        }

        let mut tags: Vec<BeverageTag> = counts
            .into_iter()
            .map(|((tag, tag_type), count)| BeverageTag {
                tag,
                tag_type,
                count,
            })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));

        Ok(BeverageWithTags {
            id: beverage.id,
            category: beverage.category.clone(),
            tags,
        })
    }

    async fn record_feedback(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        feedback: FeedbackType,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let exists = inner
            .feedback
            .iter()
            .any(|entry| *entry == (user_id, beverage_id, feedback));
        if !exists {
            inner.feedback.push((user_id, beverage_id, feedback));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
