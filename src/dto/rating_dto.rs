use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateCoursePayload {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StarShare {
    pub stars: i16,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatingStats {
    pub average: f64,
    pub count: usize,
    /// Five entries, 5 stars first.
    pub distribution: Vec<StarShare>,
}
