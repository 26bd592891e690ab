/// Upper bound of the continuous review score
pub const MAX_SCORE: f64 = 10.0;

/// Range of the discrete star count
pub const MIN_STARS: i32 = 1;
pub const MAX_STARS: i32 = 5;

/// Factor placing a star count on the 0-10 score scale
pub const STARS_TO_SCORE: f64 = 2.0;

/// A review rating as captured by the client
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawRating {
    /// Continuous score, valid in (0, 10]
    Score(f64),
    /// Whole stars, valid in 1..=5
    Stars(i32),
}

impl RawRating {
    /// Picks the rating a review carries. Score wins over stars.
    pub fn from_columns(score: Option<f64>, stars: Option<i32>) -> Option<Self> {
        score.map(RawRating::Score).or(stars.map(RawRating::Stars))
    }

    /// Maps the rating onto the 0-10 scale.
    ///
    /// Values outside their scale's domain, zero included, count as absent.
    pub fn normalized(self) -> Option<f64> {
        match self {
            RawRating::Score(score) if score > 0.0 && score <= MAX_SCORE => Some(score),
            RawRating::Stars(stars) if (MIN_STARS..=MAX_STARS).contains(&stars) => {
                Some(f64::from(stars) * STARS_TO_SCORE)
            }
            _ => None,
        }
    }
}

/// Normalized rating for a review row holding a score, a star count, or neither
pub fn normalize_rating(score: Option<f64>, stars: Option<i32>) -> Option<f64> {
    RawRating::from_columns(score, stars).and_then(RawRating::normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_passes_through() {
        assert_eq!(normalize_rating(Some(7.5), None), Some(7.5));
        assert_eq!(normalize_rating(Some(10.0), None), Some(10.0));
    }

    #[test]
    fn test_stars_scale_to_ten() {
        assert_eq!(normalize_rating(None, Some(1)), Some(2.0));
        assert_eq!(normalize_rating(None, Some(5)), Some(10.0));
    }

    #[test]
    fn test_score_takes_precedence() {
        assert_eq!(normalize_rating(Some(6.0), Some(5)), Some(6.0));
    }

    #[test]
    fn test_out_of_domain_is_absent() {
        assert_eq!(normalize_rating(Some(0.0), None), None);
        assert_eq!(normalize_rating(Some(11.0), None), None);
        assert_eq!(normalize_rating(None, Some(0)), None);
        assert_eq!(normalize_rating(None, Some(6)), None);
        assert_eq!(normalize_rating(None, None), None);
    }
}
