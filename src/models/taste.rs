use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Profiles built from fewer source reviews than this are bypassed in favour
/// of popularity ranking.
pub const COLD_START_POST_THRESHOLD: u32 = 3;

/// Tag name to non-negative preference weight.
///
/// Backed by an ordered map so that the persisted JSON text is identical
/// across repeated computations of the same profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagWeights(BTreeMap<String, f64>);

impl TagWeights {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Weight for `tag`, zero when absent
    pub fn get(&self, tag: &str) -> f64 {
        self.0.get(tag).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains_key(tag)
    }

    /// Adds `amount` to the weight of `tag`, inserting it if needed
    pub fn add(&mut self, tag: &str, amount: f64) {
        *self.0.entry(tag.to_string()).or_insert(0.0) += amount;
    }

    /// Lowers a positive weight by `amount`, floored at zero.
    /// Absent or zero weights are left alone.
    pub fn decay(&mut self, tag: &str, amount: f64) {
        if let Some(weight) = self.0.get_mut(tag) {
            if *weight > 0.0 {
                *weight = (*weight - amount).max(0.0);
            }
        }
    }

    /// Rescales every weight so the largest becomes 1.0.
    ///
    /// Empty maps and maps whose maximum is zero are left untouched, which
    /// also makes the operation idempotent.
    pub fn normalize(&mut self) {
        let max_weight = self.0.values().copied().fold(0.0_f64, f64::max);
        if max_weight == 0.0 {
            return;
        }
        for weight in self.0.values_mut() {
            *weight /= max_weight;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(tag, weight)| (tag.as_str(), *weight))
    }

    /// Serializes to the persisted JSON object form (`{}` when empty)
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(&self.0)
            .map_err(|e| AppError::Internal(format!("Tag weight serialization error: {}", e)))
    }

    /// Parses the persisted JSON object form
    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| AppError::CorruptData(format!("Invalid tag weights: {}", e)))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for TagWeights {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(tag, w)| (tag.into(), w)).collect())
    }
}

/// Per-(user, category) summary of liked/disliked tags and rating statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub user_id: Uuid,
    pub category: String,
    pub liked_tags: TagWeights,
    pub disliked_tags: TagWeights,
    pub mean_rating: Option<f64>,
    pub std_rating: Option<f64>,
    /// Number of tagged review records the profile was built from
    pub post_count: u32,
}

impl TasteProfile {
    /// Profile for a user with no history in the category
    pub fn empty(user_id: Uuid, category: &str) -> Self {
        Self {
            user_id,
            category: category.to_string(),
            liked_tags: TagWeights::new(),
            disliked_tags: TagWeights::new(),
            mean_rating: None,
            std_rating: None,
            post_count: 0,
        }
    }

    pub fn is_cold_start(&self) -> bool {
        self.post_count < COLD_START_POST_THRESHOLD
    }
}

/// Cold start holds when there is no profile or it rests on too few reviews
pub fn is_cold_start(profile: Option<&TasteProfile>) -> bool {
    profile.map_or(true, TasteProfile::is_cold_start)
}

/// One tagged review from a user's history, already on the 0-10 scale
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedReview {
    pub rating: Option<f64>,
    pub tag: Option<String>,
    pub confidence: f64,
}

impl TaggedReview {
    pub fn new(rating: Option<f64>, tag: Option<&str>) -> Self {
        Self {
            rating,
            tag: tag.map(str::to_string),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, f64)]) -> TagWeights {
        entries.iter().map(|(t, w)| (*t, *w)).collect()
    }

    #[test]
    fn test_normalize_scales_max_to_one() {
        let mut w = weights(&[("oaky", 4.0), ("fruity", 2.0), ("smoky", 1.0)]);
        w.normalize();
        assert_eq!(w.get("oaky"), 1.0);
        assert_eq!(w.get("fruity"), 0.5);
        assert_eq!(w.get("smoky"), 0.25);
        assert!(w.iter().all(|(_, v)| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut w = weights(&[("oaky", 3.0), ("fruity", 1.7), ("peaty", 0.2)]);
        w.normalize();
        let once = w.clone();
        w.normalize();
        assert_eq!(w, once);
    }

    #[test]
    fn test_normalize_empty_and_zero_are_noops() {
        let mut empty = TagWeights::new();
        empty.normalize();
        assert!(empty.is_empty());

        let mut zeros = weights(&[("oaky", 0.0), ("fruity", 0.0)]);
        zeros.normalize();
        assert_eq!(zeros, weights(&[("oaky", 0.0), ("fruity", 0.0)]));
    }

    #[test]
    fn test_decay_floors_at_zero_and_skips_absent() {
        let mut w = weights(&[("oaky", 0.3)]);
        w.decay("oaky", 0.5);
        assert_eq!(w.get("oaky"), 0.0);

        w.decay("smoky", 0.5);
        assert!(!w.contains("smoky"));
    }

    #[test]
    fn test_get_missing_is_zero() {
        assert_eq!(TagWeights::new().get("anything"), 0.0);
    }

    #[test]
    fn test_json_object_form() {
        let w = weights(&[("oaky", 1.0), ("fruity", 0.6)]);
        let json = w.to_json().unwrap();
        assert_eq!(json, r#"{"fruity":0.6,"oaky":1.0}"#);
    }

    #[test]
    fn test_json_round_trip_is_bit_exact() {
        // xorshift64, so the weights are arbitrary but reproducible
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next_weight = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };

        for batch in 0..200 {
            let w: TagWeights = (0..100)
                .map(|i| (format!("tag-{batch}-{i}"), next_weight()))
                .collect();
            let restored = TagWeights::from_json(&w.to_json().unwrap()).unwrap();

            assert_eq!(restored.len(), w.len());
            for (tag, weight) in w.iter() {
                assert_eq!(
                    restored.get(tag).to_bits(),
                    weight.to_bits(),
                    "weight for {tag} drifted: {weight} -> {}",
                    restored.get(tag)
                );
            }
        }
    }

    #[test]
    fn test_empty_serializes_to_empty_object() {
        let json = TagWeights::new().to_json().unwrap();
        assert_eq!(json, "{}");
        assert!(TagWeights::from_json(&json).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_is_corrupt_data() {
        let err = TagWeights::from_json("[1, 2").unwrap_err();
        assert!(matches!(err, AppError::CorruptData(_)));
    }

    #[test]
    fn test_cold_start_detection() {
        let user = Uuid::new_v4();
        assert!(is_cold_start(None));

        let mut profile = TasteProfile::empty(user, "whiskey");
        profile.post_count = 2;
        assert!(is_cold_start(Some(&profile)));

        profile.post_count = 3;
        assert!(!is_cold_start(Some(&profile)));
    }
}
