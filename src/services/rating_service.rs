use crate::dto::rating_dto::{RateCoursePayload, RatingStats, StarShare};
use crate::error::{Error, Result};
use crate::models::rating::Rating;
use crate::services::progress_service::ensure_enrolled;
use sqlx::PgPool;
use uuid::Uuid;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

/// Average to one decimal and the share of each star value, 5 stars first.
pub fn summarize_ratings(ratings: &[i16]) -> RatingStats {
    let count = ratings.len();
    let average = if count == 0 {
        0.0
    } else {
        round_to(ratings.iter().map(|&r| r as f64).sum::<f64>() / count as f64, 1)
    };
    let distribution = (1..=5)
        .rev()
        .map(|stars| {
            let n = ratings.iter().filter(|&&r| r == stars).count();
            StarShare {
                stars,
                count: n,
                percentage: if count == 0 { 0.0 } else { round_to(n as f64 / count as f64 * 100.0, 1) },
            }
        })
        .collect();
    RatingStats {
        average,
        count,
        distribution,
    }
}

#[derive(Clone)]
pub struct RatingService {
    pool: PgPool,
}

impl RatingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One rating per learner and course; rating again replaces it.
    pub async fn rate_course(&self, user_id: Uuid, course_id: Uuid, payload: RateCoursePayload) -> Result<Rating> {
        let mut conn = self.pool.acquire().await?;
        ensure_enrolled(&mut conn, user_id, course_id).await?;

        let review = payload.review.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let rating = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (user_id, course_id, rating, review)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, course_id)
            DO UPDATE SET rating = EXCLUDED.rating, review = EXCLUDED.review, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(payload.rating)
        .bind(review)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(%user_id, %course_id, rating = rating.rating, "course rated");
        Ok(rating)
    }

    pub async fn rating_stats(&self, course_id: Uuid) -> Result<RatingStats> {
        let exists: bool = sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)"#)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(Error::NotFound(format!("Course {} not found", course_id)));
        }

        let ratings: Vec<i16> = sqlx::query_scalar(
            r#"SELECT rating FROM ratings WHERE course_id = $1 AND is_visible"#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(summarize_ratings(&ratings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_course_has_zero_average() {
        let stats = summarize_ratings(&[]);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.distribution.len(), 5);
        assert!(stats.distribution.iter().all(|s| s.count == 0 && s.percentage == 0.0));
    }

    #[test]
    fn average_and_distribution() {
        let stats = summarize_ratings(&[5, 4, 4, 1]);
        assert_eq!(stats.average, 3.5);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.distribution[0], StarShare { stars: 5, count: 1, percentage: 25.0 });
        assert_eq!(stats.distribution[1], StarShare { stars: 4, count: 2, percentage: 50.0 });
        assert_eq!(stats.distribution[4], StarShare { stars: 1, count: 1, percentage: 25.0 });
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(summarize_ratings(&[5, 4, 4]).average, 4.3);
    }
}
