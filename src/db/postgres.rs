use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{
    db::TasteStore,
    error::{AppError, AppResult},
    models::{
        normalize_rating, BeverageTag, BeverageWithTags, CandidateBeverage, FeedbackType,
        TagWeights, TaggedReview, TasteProfile,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    liked_tags_json: String,
    disliked_tags_json: String,
    mean_rating: Option<f64>,
    std_rating: Option<f64>,
    post_count: i32,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    score: Option<f64>,
    stars: Option<i32>,
    tag: Option<String>,
    confidence: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    name: String,
    brand: Option<String>,
    category: String,
    avg_rating: f64,
    review_count: i64,
}

#[derive(sqlx::FromRow)]
struct BeverageRow {
    id: Uuid,
    category: String,
}

#[derive(sqlx::FromRow)]
struct TagRow {
    tag: String,
    tag_type: String,
    count: i64,
}

/// `TasteStore` backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TasteStore for PgStore {
    async fn get_taste_profile(
        &self,
        user_id: Uuid,
        category: &str,
    ) -> AppResult<Option<TasteProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT liked_tags_json::text AS liked_tags_json,
                   disliked_tags_json::text AS disliked_tags_json,
                   mean_rating, std_rating, post_count
            FROM user_taste_profiles
            WHERE user_id = $1 AND category = $2
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(TasteProfile {
            user_id,
            category: category.to_string(),
            liked_tags: TagWeights::from_json(&row.liked_tags_json)?,
            disliked_tags: TagWeights::from_json(&row.disliked_tags_json)?,
            mean_rating: row.mean_rating,
            std_rating: row.std_rating,
            post_count: u32::try_from(row.post_count).unwrap_or(0),
        }))
    }

    async fn upsert_taste_profile(&self, profile: &TasteProfile) -> AppResult<()> {
        let post_count = i32::try_from(profile.post_count)
            .map_err(|_| AppError::InvalidInput("post count out of range".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO user_taste_profiles
                (user_id, category, liked_tags_json, disliked_tags_json,
                 mean_rating, std_rating, post_count, updated_at)
            VALUES ($1, $2, $3::jsonb, $4::jsonb, $5, $6, $7, NOW())
            ON CONFLICT (user_id, category) DO UPDATE SET
                liked_tags_json = EXCLUDED.liked_tags_json,
                disliked_tags_json = EXCLUDED.disliked_tags_json,
                mean_rating = EXCLUDED.mean_rating,
                std_rating = EXCLUDED.std_rating,
                post_count = EXCLUDED.post_count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.category)
        .bind(profile.liked_tags.to_json()?)
        .bind(profile.disliked_tags.to_json()?)
        .bind(profile.mean_rating)
        .bind(profile.std_rating)
        .bind(post_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user_posts_for_category(
        &self,
        user_id: Uuid,
        category: &str,
    ) -> AppResult<Vec<TaggedReview>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.score::float8 AS score, p.stars, pt.tag, pt.confidence
            FROM posts p
            JOIN beverages b ON b.id = p.beverage_id
            LEFT JOIN post_tags pt ON pt.post_id = p.id
            WHERE p.user_id = $1 AND b.category = $2
            ORDER BY p.created_at, p.id, pt.tag
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TaggedReview {
                rating: normalize_rating(row.score, row.stars),
                tag: row.tag,
                confidence: row.confidence.unwrap_or(1.0),
            })
            .collect())
    }

    async fn get_recommendation_candidates(
        &self,
        category: &str,
        user_id: Uuid,
        limit: u32,
    ) -> AppResult<Vec<CandidateBeverage>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT b.id, b.name, b.brand, b.category,
                   COALESCE(AVG(
                       CASE
                           WHEN p.score > 0 AND p.score <= 10 THEN p.score::float8
                           WHEN p.stars BETWEEN 1 AND 5 THEN p.stars * 2.0::float8
                       END
                   ), 0)::float8 AS avg_rating,
                   COUNT(p.id) AS review_count
            FROM beverages b
            LEFT JOIN posts p ON p.beverage_id = b.id
            WHERE b.category = $1
              AND NOT EXISTS (
                  SELECT 1 FROM posts own
                  WHERE own.beverage_id = b.id AND own.user_id = $2
              )
              AND NOT EXISTS (
                  SELECT 1 FROM recommendation_feedback f
                  WHERE f.beverage_id = b.id AND f.user_id = $2 AND f.feedback_type = 'hide'
              )
            GROUP BY b.id
            ORDER BY avg_rating DESC, review_count DESC, b.id
            LIMIT $3
            "#,
        )
        .bind(category)
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CandidateBeverage {
                id: row.id,
                name: row.name,
                brand: row.brand,
                category: row.category,
                avg_rating: row.avg_rating,
                review_count: row.review_count,
            })
            .collect())
    }

    async fn get_beverage_with_tags(&self, beverage_id: Uuid) -> AppResult<BeverageWithTags> {
        let beverage = sqlx::query_as::<_, BeverageRow>(
            "SELECT id, category FROM beverages WHERE id = $1",
        )
        .bind(beverage_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("beverage {}", beverage_id)))?;

        let tags = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT pt.tag, pt.tag_type, COUNT(*) AS count
            FROM post_tags pt
            JOIN posts p ON p.id = pt.post_id
            WHERE p.beverage_id = $1
            GROUP BY pt.tag, pt.tag_type
            ORDER BY count DESC, pt.tag
            "#,
        )
        .bind(beverage_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(BeverageWithTags {
            id: beverage.id,
            category: beverage.category,
            tags: tags
                .into_iter()
                .map(|row| BeverageTag {
                    tag: row.tag,
                    tag_type: row.tag_type,
                    count: row.count,
                })
                .collect(),
        })
    }

    async fn record_feedback(
        &self,
        user_id: Uuid,
        beverage_id: Uuid,
        feedback: FeedbackType,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_feedback (user_id, beverage_id, feedback_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, beverage_id, feedback_type) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(beverage_id)
        .bind(feedback.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
