pub mod beverage;
pub mod rating;
pub mod taste;

pub use beverage::{
    BeverageMatch, BeverageTag, BeverageWithTags, CandidateBeverage, FeedbackType, RankedBeverage,
};
pub use rating::{normalize_rating, RawRating};
pub use taste::{is_cold_start, TagWeights, TaggedReview, TasteProfile, COLD_START_POST_THRESHOLD};
