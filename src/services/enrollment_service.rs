use crate::error::{is_unique_violation, Error, Result};
use crate::models::course::Course;
use crate::models::enrollment::Enrollment;
use crate::services::outbox_service::{stage_events, DomainEvent, Outcome};
use crate::services::progress_rules::entry_chapter;
use crate::services::progress_service::{load_chapter_rows, settle, unlock_chapter, ChapterRow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EnrolledCourse {
    pub enrollment_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EnrollmentService {
    pool: PgPool,
}

impl EnrollmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enrolls the learner and unlocks the first chapter in one transaction.
    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<Outcome<Enrollment>> {
        let mut tx = self.pool.begin().await?;

        let user_exists: bool = sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND is_active)"#)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if !user_exists {
            return Err(Error::NotFound(format!("User {} not found", user_id)));
        }

        let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))?;
        if !course.is_enrollable() {
            return Err(Error::BadRequest("Course is not open for enrollment".to_string()));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2) RETURNING *"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("Already enrolled in this course".to_string())
            } else {
                Error::from(e)
            }
        })?;

        let mut events = vec![DomainEvent::EnrollmentCreated {
            enrollment_id: enrollment.id,
            user_id,
            course_id,
        }];

        let rows = load_chapter_rows(&mut tx, user_id, course_id).await?;
        let facts: Vec<_> = rows.iter().map(ChapterRow::facts).collect();
        if let Some(first) = entry_chapter(&facts) {
            unlock_chapter(&mut tx, user_id, course_id, first.chapter_id).await?;
            events.push(DomainEvent::ChapterUnlocked {
                user_id,
                course_id,
                chapter_id: first.chapter_id,
            });
            // An empty first chapter is already satisfied.
            events.extend(settle(&mut tx, user_id, course_id).await?.events);
        }

        let staged = stage_events(&mut tx, events).await?;
        tx.commit().await?;

        tracing::info!(%user_id, %course_id, enrollment_id = %enrollment.id, "learner enrolled");
        Ok(Outcome::new(enrollment, staged))
    }

    pub async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<EnrolledCourse>> {
        let rows = sqlx::query_as::<_, EnrolledCourse>(
            r#"
            SELECT e.id AS enrollment_id, e.course_id, c.title, e.enrolled_at
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
