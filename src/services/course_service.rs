use crate::dto::course_dto::{
    ChapterOutline, CourseDetail, CourseSummary, CreateCoursePayload, PaginatedCourses,
    UpdateCoursePayload,
};
use crate::error::{Error, Result};
use crate::models::chapter::Chapter;
use crate::models::course::{Course, CourseStatus, PriceType};
use crate::models::lesson::Lesson;
use crate::models::user::ROLE_ADMIN;
use crate::utils::token::Claims;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const SUMMARY_COLUMNS: &str = r#"
    c.id, c.title, c.description, c.status, c.price, c.price_type,
    (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = c.id) AS total_chapters,
    (SELECT COUNT(*) FROM lessons l JOIN chapters ch ON ch.id = l.chapter_id WHERE ch.course_id = c.id) AS total_lessons,
    (SELECT COUNT(DISTINCT m.chapter_id) FROM mcqs m WHERE m.course_id = c.id AND m.is_active) AS chapters_with_mcqs,
    (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrollment_count,
    (SELECT AVG(r.rating)::float8 FROM ratings r WHERE r.course_id = c.id AND r.is_visible) AS average_rating,
    (SELECT COUNT(*) FROM ratings r WHERE r.course_id = c.id AND r.is_visible) AS rating_count,
    c.created_at
"#;

/// Paid courses need a positive price; free courses are stored at zero.
fn normalize_price(price: Option<Decimal>, price_type: PriceType) -> Result<Decimal> {
    match price_type {
        PriceType::Free => Ok(Decimal::ZERO),
        PriceType::Paid => match price {
            Some(p) if p > Decimal::ZERO => Ok(p),
            _ => Err(Error::BadRequest("Paid courses need a positive price".to_string())),
        },
    }
}

/// Admins may edit anything; instructors only their own courses.
pub fn ensure_can_edit(course: &Course, actor: &Claims) -> Result<()> {
    if actor.has_role(&[ROLE_ADMIN]) || course.created_by == actor.user_id() {
        Ok(())
    } else {
        Err(Error::Forbidden("You can only edit your own courses".to_string()))
    }
}

/// Locks the course row for the rest of the transaction so sibling order
/// changes are serialised.
pub(crate) async fn lock_course(tx: &mut Transaction<'_, Postgres>, course_id: Uuid) -> Result<Course> {
    sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1 FOR UPDATE"#)
        .bind(course_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))
}

#[derive(Clone)]
pub struct CourseService {
    pool: PgPool,
}

impl CourseService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_course(&self, payload: CreateCoursePayload, created_by: Uuid) -> Result<Course> {
        let price_type = payload.price_type.unwrap_or(PriceType::Free);
        let price = normalize_price(payload.price, price_type)?;

        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, description, status, is_active, price, price_type, created_by)
            VALUES ($1, $2, 'draft', FALSE, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(payload.title.trim())
        .bind(payload.description)
        .bind(price)
        .bind(price_type)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(course_id = %course.id, %created_by, "course created");
        Ok(course)
    }

    pub async fn get_course(&self, course_id: Uuid) -> Result<Course> {
        sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))
    }

    pub async fn update_course(&self, course_id: Uuid, payload: UpdateCoursePayload, actor: &Claims) -> Result<Course> {
        let existing = self.get_course(course_id).await?;
        ensure_can_edit(&existing, actor)?;

        let price_type = payload.price_type.unwrap_or(existing.price_type);
        let price = normalize_price(payload.price.or(Some(existing.price)), price_type)?;

        let course = sqlx::query_as::<_, Course>(
            r#"
            UPDATE courses
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = $4,
                price_type = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(course_id)
        .bind(payload.title.map(|t| t.trim().to_string()))
        .bind(payload.description)
        .bind(price)
        .bind(price_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    /// draft/inactive -> active, only once the course has a chapter.
    pub async fn publish_course(&self, course_id: Uuid, actor: &Claims) -> Result<Course> {
        let mut tx = self.pool.begin().await?;
        let course = lock_course(&mut tx, course_id).await?;
        ensure_can_edit(&course, actor)?;

        let chapters: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM chapters WHERE course_id = $1"#)
            .bind(course_id)
            .fetch_one(&mut *tx)
            .await?;
        if chapters == 0 {
            return Err(Error::BadRequest(
                "A course needs at least one chapter before it can be published".to_string(),
            ));
        }

        let course = sqlx::query_as::<_, Course>(
            r#"UPDATE courses SET status = $2, is_active = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(course_id)
        .bind(CourseStatus::Active)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(course_id = %course.id, "course published");
        Ok(course)
    }

    /// Soft deactivation; enrollments and progress are kept.
    pub async fn deactivate_course(&self, course_id: Uuid, actor: &Claims) -> Result<Course> {
        let existing = self.get_course(course_id).await?;
        ensure_can_edit(&existing, actor)?;

        let course = sqlx::query_as::<_, Course>(
            r#"UPDATE courses SET status = $2, is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(course_id)
        .bind(CourseStatus::Inactive)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(course_id = %course.id, "course deactivated");
        Ok(course)
    }

    pub async fn list_courses(&self, page: i64, per_page: i64, search: Option<String>) -> Result<PaginatedCourses> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let search = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM courses c
            WHERE c.is_active AND c.status = 'active'
              AND ($1::text IS NULL OR c.title ILIKE '%' || $1 || '%')
            "#,
        )
        .bind(&search)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
            SELECT {SUMMARY_COLUMNS}
            FROM courses c
            WHERE c.is_active AND c.status = 'active'
              AND ($1::text IS NULL OR c.title ILIKE '%' || $1 || '%')
            ORDER BY c.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, CourseSummary>(&sql)
            .bind(&search)
            .bind(per_page)
            .bind((page - 1) * per_page)
            .fetch_all(&self.pool)
            .await?;

        Ok(PaginatedCourses {
            items,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }

    /// Active course with its chapters in order, their lessons, and counters.
    pub async fn get_course_detail(&self, course_id: Uuid) -> Result<CourseDetail> {
        let sql = format!(
            r#"SELECT {SUMMARY_COLUMNS} FROM courses c WHERE c.id = $1 AND c.is_active AND c.status = 'active'"#
        );
        let summary = sqlx::query_as::<_, CourseSummary>(&sql)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))?;

        let chapters = sqlx::query_as::<_, Chapter>(
            r#"SELECT * FROM chapters WHERE course_id = $1 ORDER BY "order""#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let lessons = sqlx::query_as::<_, Lesson>(
            r#"
            SELECT l.* FROM lessons l
            JOIN chapters ch ON ch.id = l.chapter_id
            WHERE ch.course_id = $1
            ORDER BY l."order"
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let mcq_counts: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            r#"SELECT chapter_id, COUNT(*) FROM mcqs WHERE course_id = $1 AND is_active GROUP BY chapter_id"#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let coding_counts: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            r#"SELECT chapter_id, COUNT(*) FROM coding_questions WHERE course_id = $1 AND is_active GROUP BY chapter_id"#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let mut lessons_by_chapter: HashMap<Uuid, Vec<Lesson>> = HashMap::new();
        for lesson in lessons {
            lessons_by_chapter.entry(lesson.chapter_id).or_default().push(lesson);
        }

        let chapters = chapters
            .into_iter()
            .map(|ch| ChapterOutline {
                lessons: lessons_by_chapter.remove(&ch.id).unwrap_or_default(),
                active_mcqs: mcq_counts.get(&ch.id).copied().unwrap_or(0),
                coding_questions: coding_counts.get(&ch.id).copied().unwrap_or(0),
                id: ch.id,
                title: ch.title,
                order: ch.order,
                content: ch.content,
                media_url: ch.media_url,
            })
            .collect();

        Ok(CourseDetail { summary, chapters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn course(created_by: Uuid) -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "Rust".into(),
            description: None,
            status: CourseStatus::Draft,
            is_active: false,
            price: Decimal::ZERO,
            price_type: PriceType::Free,
            created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn claims(sub: Uuid, role: &str) -> Claims {
        Claims {
            sub,
            role: role.into(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn free_courses_are_priced_at_zero() {
        assert_eq!(normalize_price(Some(Decimal::new(999, 2)), PriceType::Free).unwrap(), Decimal::ZERO);
        assert_eq!(
            normalize_price(Some(Decimal::new(999, 2)), PriceType::Paid).unwrap(),
            Decimal::new(999, 2)
        );
        assert!(normalize_price(None, PriceType::Paid).is_err());
        assert!(normalize_price(Some(Decimal::ZERO), PriceType::Paid).is_err());
    }

    #[test]
    fn only_owner_or_admin_can_edit() {
        let owner = Uuid::new_v4();
        let c = course(owner);
        assert!(ensure_can_edit(&c, &claims(owner, "instructor")).is_ok());
        assert!(ensure_can_edit(&c, &claims(Uuid::new_v4(), "admin")).is_ok());
        assert!(matches!(
            ensure_can_edit(&c, &claims(Uuid::new_v4(), "instructor")),
            Err(Error::Forbidden(_))
        ));
    }
}
