use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

/// A beverage eligible for recommendation, with its aggregate review stats
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBeverage {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    /// Average rating on the 0-10 scale, zero when unreviewed
    pub avg_rating: f64,
    pub review_count: i64,
}

/// A descriptor attached to a beverage through its reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeverageTag {
    pub tag: String,
    pub tag_type: String,
    pub count: i64,
}

/// A beverage's category and aggregated tag list
#[derive(Debug, Clone, PartialEq)]
pub struct BeverageWithTags {
    pub id: Uuid,
    pub category: String,
    pub tags: Vec<BeverageTag>,
}

/// A recommended beverage as returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBeverage {
    pub beverage_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub category: String,
    /// 0-100
    pub match_score: u8,
    pub reasons: Vec<String>,
    pub avg_rating: f64,
    pub review_count: i64,
}

/// Fit between a user and one specific beverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeverageMatch {
    pub match_score: u8,
    pub reasons: Vec<String>,
}

/// Explicit feedback a user gives on a recommended beverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    MoreLikeThis,
    LessLikeThis,
    Hide,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::MoreLikeThis => "more_like_this",
            FeedbackType::LessLikeThis => "less_like_this",
            FeedbackType::Hide => "hide",
        }
    }
}

impl Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "more_like_this" => Ok(FeedbackType::MoreLikeThis),
            "less_like_this" => Ok(FeedbackType::LessLikeThis),
            "hide" => Ok(FeedbackType::Hide),
            other => Err(format!("unknown feedback type '{}'", other)),
        }
    }
}
