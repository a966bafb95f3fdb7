use crate::dto::course_dto::{CreateCodingQuestionPayload, CreateMcqPayload};
use crate::error::{Error, Result};
use crate::models::chapter::Chapter;
use crate::models::coding_question::{CodingQuestion, CodingQuestionView};
use crate::models::course::Course;
use crate::models::mcq::{Mcq, McqView};
use crate::services::course_service::ensure_can_edit;
use crate::services::judge_service::language_id;
use crate::services::progress_service::{ensure_enrolled, find_chapter, lock_unlocked_chapter};
use crate::utils::token::Claims;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Authoring of chapter quizzes and coding exercises, plus the learner-facing
/// listings of both.
#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn editable_chapter(&self, chapter_id: Uuid, actor: &Claims) -> Result<Chapter> {
        let mut conn = self.pool.acquire().await?;
        let chapter = find_chapter(&mut conn, chapter_id).await?;
        let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(chapter.course_id)
            .fetch_one(&mut *conn)
            .await?;
        ensure_can_edit(&course, actor)?;
        Ok(chapter)
    }

    pub async fn create_mcq(&self, chapter_id: Uuid, payload: CreateMcqPayload, actor: &Claims) -> Result<Mcq> {
        let chapter = self.editable_chapter(chapter_id, actor).await?;
        let options: Vec<String> = payload.options.into_iter().map(|o| o.trim().to_string()).collect();

        let mcq = sqlx::query_as::<_, Mcq>(
            r#"
            INSERT INTO mcqs (course_id, chapter_id, question, options, correct_answer, explanation)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(chapter.course_id)
        .bind(chapter.id)
        .bind(payload.question.trim())
        .bind(Json(options))
        .bind(payload.correct_answer)
        .bind(payload.explanation)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(chapter_id = %chapter.id, mcq_id = %mcq.id, "mcq created");
        Ok(mcq)
    }

    /// Deactivated questions drop out of grading and of the quiz gate.
    pub async fn set_mcq_active(&self, mcq_id: Uuid, is_active: bool, actor: &Claims) -> Result<Mcq> {
        let existing = sqlx::query_as::<_, Mcq>(r#"SELECT * FROM mcqs WHERE id = $1"#)
            .bind(mcq_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("MCQ {} not found", mcq_id)))?;
        self.editable_chapter(existing.chapter_id, actor).await?;

        let mcq = sqlx::query_as::<_, Mcq>(
            r#"UPDATE mcqs SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(mcq_id)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(mcq)
    }

    /// Active questions of an unlocked chapter, without answers.
    pub async fn list_chapter_mcqs(&self, user_id: Uuid, chapter_id: Uuid) -> Result<Vec<McqView>> {
        let mut tx = self.pool.begin().await?;
        let chapter = find_chapter(&mut tx, chapter_id).await?;
        ensure_enrolled(&mut tx, user_id, chapter.course_id).await?;
        lock_unlocked_chapter(&mut tx, user_id, chapter.id).await?;

        let questions = sqlx::query_as::<_, Mcq>(
            r#"SELECT * FROM mcqs WHERE chapter_id = $1 AND is_active ORDER BY created_at, id"#,
        )
        .bind(chapter.id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(questions.into_iter().map(McqView::from).collect())
    }

    pub async fn create_coding_question(
        &self,
        chapter_id: Uuid,
        payload: CreateCodingQuestionPayload,
        actor: &Claims,
    ) -> Result<CodingQuestion> {
        let language = payload.language.trim().to_ascii_lowercase();
        if language_id(&language).is_none() {
            return Err(Error::BadRequest(format!("Unsupported language '{}'", language)));
        }
        let chapter = self.editable_chapter(chapter_id, actor).await?;

        let question = sqlx::query_as::<_, CodingQuestion>(
            r#"
            INSERT INTO coding_questions (course_id, chapter_id, title, prompt, language, starter_code, test_cases)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(chapter.course_id)
        .bind(chapter.id)
        .bind(payload.title.trim())
        .bind(payload.prompt)
        .bind(&language)
        .bind(payload.starter_code)
        .bind(Json(payload.test_cases))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(chapter_id = %chapter.id, question_id = %question.id, %language, "coding question created");
        Ok(question)
    }

    pub async fn list_coding_questions(&self, user_id: Uuid, chapter_id: Uuid) -> Result<Vec<CodingQuestionView>> {
        let mut tx = self.pool.begin().await?;
        let chapter = find_chapter(&mut tx, chapter_id).await?;
        ensure_enrolled(&mut tx, user_id, chapter.course_id).await?;
        lock_unlocked_chapter(&mut tx, user_id, chapter.id).await?;

        let questions = sqlx::query_as::<_, CodingQuestion>(
            r#"SELECT * FROM coding_questions WHERE chapter_id = $1 AND is_active ORDER BY created_at, id"#,
        )
        .bind(chapter.id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(questions.into_iter().map(CodingQuestionView::from).collect())
    }
}
