use crate::dto::course_dto::CreateLessonPayload;
use crate::error::{Error, Result};
use crate::models::chapter::Chapter;
use crate::models::course::Course;
use crate::models::lesson::Lesson;
use crate::services::chapter_service::ordering_error;
use crate::services::course_service::ensure_can_edit;
use crate::services::progress_rules::next_sibling_order;
use crate::utils::token::Claims;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const DEFAULT_LESSON_TYPE: &str = "text";

/// Locks the chapter row so lesson order changes within it are serialised,
/// and checks the actor may edit its course.
async fn lock_chapter_for_edit(conn: &mut PgConnection, chapter_id: Uuid, actor: &Claims) -> Result<Chapter> {
    let chapter = sqlx::query_as::<_, Chapter>(r#"SELECT * FROM chapters WHERE id = $1 FOR UPDATE"#)
        .bind(chapter_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Chapter {} not found", chapter_id)))?;
    let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
        .bind(chapter.course_id)
        .fetch_one(&mut *conn)
        .await?;
    ensure_can_edit(&course, actor)?;
    Ok(chapter)
}

#[derive(Clone)]
pub struct LessonService {
    pool: PgPool,
}

impl LessonService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_lesson(&self, chapter_id: Uuid, payload: CreateLessonPayload, actor: &Claims) -> Result<Lesson> {
        let mut tx = self.pool.begin().await?;
        let chapter = lock_chapter_for_edit(&mut tx, chapter_id, actor).await?;

        let orders: Vec<i32> = sqlx::query_scalar(r#"SELECT "order" FROM lessons WHERE chapter_id = $1"#)
            .bind(chapter.id)
            .fetch_all(&mut *tx)
            .await?;
        let order = next_sibling_order(&orders).map_err(ordering_error)?;

        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons (chapter_id, title, content, lesson_type, is_free, "order")
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(chapter.id)
        .bind(payload.title.trim())
        .bind(payload.content)
        .bind(payload.lesson_type.as_deref().unwrap_or(DEFAULT_LESSON_TYPE))
        .bind(payload.is_free.unwrap_or(false))
        .bind(order)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(chapter_id = %chapter.id, lesson_id = %lesson.id, order, "lesson created");
        Ok(lesson)
    }

    pub async fn list_lessons(&self, chapter_id: Uuid) -> Result<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>(
            r#"SELECT * FROM lessons WHERE chapter_id = $1 ORDER BY "order""#,
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lessons)
    }

    /// Deletes a lesson and shifts later siblings down by one.
    pub async fn delete_lesson(&self, lesson_id: Uuid, actor: &Claims) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let chapter_id: Uuid = sqlx::query_scalar(r#"SELECT chapter_id FROM lessons WHERE id = $1"#)
            .bind(lesson_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lesson {} not found", lesson_id)))?;
        lock_chapter_for_edit(&mut tx, chapter_id, actor).await?;

        let order: i32 = sqlx::query_scalar(r#"DELETE FROM lessons WHERE id = $1 RETURNING "order""#)
            .bind(lesson_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lesson {} not found", lesson_id)))?;

        sqlx::query(
            r#"
            UPDATE lessons
            SET "order" = "order" - 1, updated_at = NOW()
            WHERE chapter_id = $1 AND "order" > $2
            "#,
        )
        .bind(chapter_id)
        .bind(order)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(%chapter_id, %lesson_id, order, "lesson deleted");
        Ok(())
    }
}
