use crate::dto::course_dto::CreateChapterPayload;
use crate::error::{Error, Result};
use crate::models::chapter::Chapter;
use crate::services::course_service::{ensure_can_edit, lock_course};
use crate::services::progress_rules::{next_sibling_order, plan_reorder, OrderingError};
use crate::services::progress_service::repair_unlocks;
use crate::utils::token::Claims;
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) fn ordering_error(err: OrderingError) -> Error {
    match err {
        OrderingError::Gaps(_) | OrderingError::Duplicate(_) => {
            Error::Conflict(format!("Sibling order is inconsistent: {}", err))
        }
        OrderingError::NotAPermutation => Error::BadRequest(err.to_string()),
    }
}

#[derive(Clone)]
pub struct ChapterService {
    pool: PgPool,
}

impl ChapterService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a chapter at `max(order) + 1`.
    pub async fn create_chapter(&self, course_id: Uuid, payload: CreateChapterPayload, actor: &Claims) -> Result<Chapter> {
        let mut tx = self.pool.begin().await?;
        let course = lock_course(&mut tx, course_id).await?;
        ensure_can_edit(&course, actor)?;

        let orders: Vec<i32> = sqlx::query_scalar(r#"SELECT "order" FROM chapters WHERE course_id = $1"#)
            .bind(course_id)
            .fetch_all(&mut *tx)
            .await?;
        let order = next_sibling_order(&orders).map_err(ordering_error)?;

        let chapter = sqlx::query_as::<_, Chapter>(
            r#"
            INSERT INTO chapters (course_id, title, content, media_url, "order")
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(course_id)
        .bind(payload.title.trim())
        .bind(payload.content)
        .bind(payload.media_url)
        .bind(order)
        .fetch_one(&mut *tx)
        .await?;

        // Learners who finished the previous last chapter move on.
        repair_unlocks(&mut tx, course_id).await?;
        tx.commit().await?;

        tracing::info!(course_id = %course_id, chapter_id = %chapter.id, order, "chapter created");
        Ok(chapter)
    }

    pub async fn list_chapters(&self, course_id: Uuid) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            r#"SELECT * FROM chapters WHERE course_id = $1 ORDER BY "order""#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chapters)
    }

    /// Deletes a chapter and closes the gap it leaves.
    pub async fn delete_chapter(&self, chapter_id: Uuid, actor: &Claims) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let course_id: Uuid = sqlx::query_scalar(r#"SELECT course_id FROM chapters WHERE id = $1"#)
            .bind(chapter_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Chapter {} not found", chapter_id)))?;
        let course = lock_course(&mut tx, course_id).await?;
        ensure_can_edit(&course, actor)?;

        // Re-read under the course lock; a concurrent delete may have won.
        let order: i32 = sqlx::query_scalar(r#"DELETE FROM chapters WHERE id = $1 RETURNING "order""#)
            .bind(chapter_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Chapter {} not found", chapter_id)))?;

        sqlx::query(
            r#"
            UPDATE chapters
            SET "order" = "order" - 1, updated_at = NOW()
            WHERE course_id = $1 AND "order" > $2
            "#,
        )
        .bind(course_id)
        .bind(order)
        .execute(&mut *tx)
        .await?;

        repair_unlocks(&mut tx, course_id).await?;
        tx.commit().await?;

        tracing::info!(%course_id, %chapter_id, order, "chapter deleted");
        Ok(())
    }

    /// Applies a full new ordering. `chapter_ids` must list every chapter of
    /// the course exactly once.
    pub async fn reorder_chapters(&self, course_id: Uuid, chapter_ids: &[Uuid], actor: &Claims) -> Result<Vec<Chapter>> {
        let mut tx = self.pool.begin().await?;
        let course = lock_course(&mut tx, course_id).await?;
        ensure_can_edit(&course, actor)?;

        let current: Vec<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM chapters WHERE course_id = $1 ORDER BY "order""#,
        )
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await?;
        let plan = plan_reorder(&current, chapter_ids).map_err(ordering_error)?;

        for (id, order) in &plan {
            sqlx::query(r#"UPDATE chapters SET "order" = $2, updated_at = NOW() WHERE id = $1"#)
                .bind(id)
                .bind(order)
                .execute(&mut *tx)
                .await?;
        }

        repair_unlocks(&mut tx, course_id).await?;
        let chapters = sqlx::query_as::<_, Chapter>(
            r#"SELECT * FROM chapters WHERE course_id = $1 ORDER BY "order""#,
        )
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(%course_id, chapters = plan.len(), "chapters reordered");
        Ok(chapters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_errors_map_to_client_errors() {
        assert!(matches!(ordering_error(OrderingError::Gaps(vec![2])), Error::Conflict(_)));
        assert!(matches!(ordering_error(OrderingError::Duplicate(1)), Error::Conflict(_)));
        assert!(matches!(ordering_error(OrderingError::NotAPermutation), Error::BadRequest(_)));
    }
}
