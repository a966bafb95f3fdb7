use crate::dto::progress_dto::{
    ChapterProgressView, CourseProgress, CourseProgressSummary, LessonCompletionResult,
    McqSubmissionResult,
};
use crate::error::{Error, Result};
use crate::models::chapter::Chapter;
use crate::models::lesson::Lesson;
use crate::models::mcq::Mcq;
use crate::models::submission::McqSubmission;
use crate::models::user_progress::UserProgress;
use crate::services::certificate_service::CertificateService;
use crate::services::grading_service::{GradingService, McqAnswer};
use crate::services::outbox_service::{stage_events, DomainEvent, Outcome};
use crate::services::progress_rules::{overall_progress, plan_advance, ChapterFacts};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-chapter facts for one learner, with the chapter title for views.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ChapterRow {
    pub chapter_id: Uuid,
    pub title: String,
    pub order: i32,
    pub locked: bool,
    pub completed: bool,
    pub mcq_passed: bool,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub active_mcqs: i64,
}

impl ChapterRow {
    pub fn facts(&self) -> ChapterFacts {
        ChapterFacts {
            chapter_id: self.chapter_id,
            order: self.order,
            locked: self.locked,
            completed: self.completed,
            mcq_passed: self.mcq_passed,
            total_lessons: self.total_lessons.max(0) as usize,
            completed_lessons: self.completed_lessons.max(0) as usize,
            active_mcqs: self.active_mcqs.max(0) as usize,
        }
    }
}

/// State changes applied while settling a learner's progress.
#[derive(Debug, Default)]
pub(crate) struct Settled {
    pub completed: Vec<Uuid>,
    pub unlocked: Vec<Uuid>,
    pub events: Vec<DomainEvent>,
}

impl Settled {
    fn absorb(&mut self, other: Settled) {
        self.completed.extend(other.completed);
        self.unlocked.extend(other.unlocked);
        self.events.extend(other.events);
    }
}

pub(crate) async fn load_chapter_rows(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Vec<ChapterRow>> {
    let rows = sqlx::query_as::<_, ChapterRow>(
        r#"
        SELECT ch.id AS chapter_id,
               ch.title,
               ch."order" AS "order",
               COALESCE(up.locked, TRUE) AS locked,
               COALESCE(up.completed, FALSE) AS completed,
               COALESCE(up.mcq_passed, FALSE) AS mcq_passed,
               (SELECT COUNT(*) FROM lessons l WHERE l.chapter_id = ch.id) AS total_lessons,
               (SELECT COUNT(*) FROM lesson_completions lc
                 WHERE lc.chapter_id = ch.id AND lc.user_id = $1) AS completed_lessons,
               (SELECT COUNT(*) FROM mcqs m WHERE m.chapter_id = ch.id AND m.is_active) AS active_mcqs
        FROM chapters ch
        LEFT JOIN user_progress up ON up.chapter_id = ch.id AND up.user_id = $1
        WHERE ch.course_id = $2
        ORDER BY ch."order"
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn ensure_enrolled(conn: &mut PgConnection, user_id: Uuid, course_id: Uuid) -> Result<()> {
    let enrolled: bool = sqlx::query_scalar(
        r#"SELECT EXISTS(SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)"#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(conn)
    .await?;
    if enrolled {
        Ok(())
    } else {
        Err(Error::Forbidden("You are not enrolled in this course".to_string()))
    }
}

/// Locks the learner's progress row for the chapter and fails unless the
/// chapter is unlocked.
pub(crate) async fn lock_unlocked_chapter(
    conn: &mut PgConnection,
    user_id: Uuid,
    chapter_id: Uuid,
) -> Result<UserProgress> {
    let row = sqlx::query_as::<_, UserProgress>(
        r#"SELECT * FROM user_progress WHERE user_id = $1 AND chapter_id = $2 FOR UPDATE"#,
    )
    .bind(user_id)
    .bind(chapter_id)
    .fetch_optional(conn)
    .await?;
    match row {
        Some(progress) if !progress.locked => Ok(progress),
        _ => Err(Error::Forbidden("This chapter is locked".to_string())),
    }
}

pub(crate) async fn find_chapter(conn: &mut PgConnection, chapter_id: Uuid) -> Result<Chapter> {
    sqlx::query_as::<_, Chapter>(r#"SELECT * FROM chapters WHERE id = $1"#)
        .bind(chapter_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Chapter {} not found", chapter_id)))
}

/// Compare-and-set: only the first caller to complete a chapter wins.
async fn complete_chapter(conn: &mut PgConnection, user_id: Uuid, chapter_id: Uuid, via_quiz: bool) -> Result<bool> {
    let row: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE user_progress
        SET completed = TRUE,
            mcq_passed = mcq_passed OR $3,
            completed_at = NOW(),
            updated_at = NOW()
        WHERE user_id = $1 AND chapter_id = $2 AND NOT completed AND NOT locked
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(chapter_id)
    .bind(via_quiz)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}

/// Upserts an unlocked progress row. `true` when the chapter was locked or
/// had no row before.
pub(crate) async fn unlock_chapter(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
    chapter_id: Uuid,
) -> Result<bool> {
    let row: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO user_progress (user_id, course_id, chapter_id, locked)
        VALUES ($1, $2, $3, FALSE)
        ON CONFLICT (user_id, chapter_id)
        DO UPDATE SET locked = FALSE, updated_at = NOW()
        WHERE user_progress.locked
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(chapter_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}

/// Applies the unlocks of an advance whose trigger is already completed,
/// completing quiz-less chapters on the way. `rows` is updated in place to
/// match what was written.
async fn apply_cascade(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
    rows: &mut [ChapterRow],
    trigger: Uuid,
) -> Result<Settled> {
    let facts: Vec<ChapterFacts> = rows.iter().map(ChapterRow::facts).collect();
    let advance = plan_advance(&facts, trigger);
    let mut settled = Settled::default();

    for chapter_id in &advance.unlock {
        if unlock_chapter(&mut *conn, user_id, course_id, *chapter_id).await? {
            settled.unlocked.push(*chapter_id);
            settled.events.push(DomainEvent::ChapterUnlocked {
                user_id,
                course_id,
                chapter_id: *chapter_id,
            });
        }
        if advance.complete.contains(chapter_id)
            && complete_chapter(&mut *conn, user_id, *chapter_id, false).await?
        {
            settled.completed.push(*chapter_id);
        }
    }

    for row in rows.iter_mut() {
        if advance.complete.contains(&row.chapter_id) {
            row.completed = true;
        }
        if advance.unlock.contains(&row.chapter_id) {
            row.locked = false;
        }
    }
    Ok(settled)
}

/// Completes every unlocked chapter that has no quiz and whose lessons are
/// done, unlocking successors as it goes. Rows are loaded once and kept in
/// step with each cascade.
pub(crate) async fn settle(conn: &mut PgConnection, user_id: Uuid, course_id: Uuid) -> Result<Settled> {
    let mut settled = Settled::default();
    let mut rows = load_chapter_rows(&mut *conn, user_id, course_id).await?;

    loop {
        let Some(trigger) = rows
            .iter()
            .find(|r| r.facts().completes_without_quiz())
            .map(|r| r.chapter_id)
        else {
            break;
        };
        if complete_chapter(&mut *conn, user_id, trigger, false).await? {
            settled.completed.push(trigger);
        }
        let step = apply_cascade(&mut *conn, user_id, course_id, &mut rows, trigger).await?;
        settled.absorb(step);
    }

    if !settled.completed.is_empty() || !settled.unlocked.is_empty() {
        tracing::debug!(
            %user_id,
            %course_id,
            completed = settled.completed.len(),
            unlocked = settled.unlocked.len(),
            "progress settled"
        );
    }
    Ok(settled)
}

/// Restores unlock invariants for every learner of a course after its
/// chapters were renumbered: unfinished chapters whose predecessor is not
/// completed are locked again, then the first chapter and each successor of
/// a completed chapter are unlocked.
pub(crate) async fn repair_unlocks(conn: &mut PgConnection, course_id: Uuid) -> Result<u64> {
    let relocked = sqlx::query(
        r#"
        UPDATE user_progress up
        SET locked = TRUE, updated_at = NOW()
        FROM chapters cur
        WHERE cur.id = up.chapter_id
          AND up.course_id = $1
          AND NOT up.locked
          AND NOT up.completed
          AND cur."order" > 1
          AND NOT EXISTS (
              SELECT 1
              FROM chapters prev
              JOIN user_progress pp ON pp.chapter_id = prev.id AND pp.user_id = up.user_id
              WHERE prev.course_id = cur.course_id
                AND prev."order" = cur."order" - 1
                AND pp.completed
          )
        "#,
    )
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    let first = sqlx::query(
        r#"
        INSERT INTO user_progress (user_id, course_id, chapter_id, locked)
        SELECT e.user_id, e.course_id, ch.id, FALSE
        FROM enrollments e
        JOIN chapters ch ON ch.course_id = e.course_id AND ch."order" = 1
        WHERE e.course_id = $1
        ON CONFLICT (user_id, chapter_id)
        DO UPDATE SET locked = FALSE, updated_at = NOW()
        WHERE user_progress.locked
        "#,
    )
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    let successors = sqlx::query(
        r#"
        INSERT INTO user_progress (user_id, course_id, chapter_id, locked)
        SELECT up.user_id, up.course_id, nxt.id, FALSE
        FROM user_progress up
        JOIN chapters cur ON cur.id = up.chapter_id
        JOIN chapters nxt ON nxt.course_id = cur.course_id AND nxt."order" = cur."order" + 1
        WHERE up.course_id = $1 AND up.completed
        ON CONFLICT (user_id, chapter_id)
        DO UPDATE SET locked = FALSE, updated_at = NOW()
        WHERE user_progress.locked
        "#,
    )
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    Ok(relocked.rows_affected() + first.rows_affected() + successors.rows_affected())
}

#[derive(Clone)]
pub struct ProgressService {
    pool: PgPool,
    certificates: CertificateService,
    mcq_pass_threshold: f64,
}

impl ProgressService {
    pub fn new(pool: PgPool, certificates: CertificateService, mcq_pass_threshold: f64) -> Self {
        Self {
            pool,
            certificates,
            mcq_pass_threshold,
        }
    }

    pub async fn mark_lesson_completed(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Outcome<LessonCompletionResult>> {
        let mut tx = self.pool.begin().await?;

        let lesson = sqlx::query_as::<_, Lesson>(r#"SELECT * FROM lessons WHERE id = $1"#)
            .bind(lesson_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lesson {} not found", lesson_id)))?;
        let chapter = find_chapter(&mut tx, lesson.chapter_id).await?;
        ensure_enrolled(&mut tx, user_id, chapter.course_id).await?;
        lock_unlocked_chapter(&mut tx, user_id, chapter.id).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO lesson_completions (user_id, lesson_id, chapter_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, lesson_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(lesson.id)
        .bind(chapter.id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        let settled = settle(&mut tx, user_id, chapter.course_id).await?;
        let rows = load_chapter_rows(&mut tx, user_id, chapter.course_id).await?;
        let facts = rows
            .iter()
            .find(|r| r.chapter_id == chapter.id)
            .map(ChapterRow::facts)
            .ok_or_else(|| Error::NotFound(format!("Chapter {} not found", chapter.id)))?;

        let events = stage_events(&mut tx, settled.events).await?;
        tx.commit().await?;

        if inserted {
            tracing::info!(%user_id, %lesson_id, chapter_id = %chapter.id, "lesson completed");
        }

        Ok(Outcome::new(
            LessonCompletionResult {
                lesson_id: lesson.id,
                chapter_id: chapter.id,
                newly_completed: inserted,
                completed_lessons: facts.completed_lessons,
                total_lessons: facts.total_lessons,
                can_attempt_mcq: facts.can_attempt_mcq() && !facts.completed,
                chapter_completed: facts.completed,
                unlocked_chapters: settled.unlocked,
            },
            events,
        ))
    }

    pub async fn submit_mcq(
        &self,
        user_id: Uuid,
        chapter_id: Uuid,
        answers: Vec<McqAnswer>,
    ) -> Result<Outcome<McqSubmissionResult>> {
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
        if questions.is_empty() {
            return Err(Error::BadRequest("This chapter has no quiz".to_string()));
        }

        let mut rows = load_chapter_rows(&mut tx, user_id, chapter.course_id).await?;
        let this = rows
            .iter()
            .find(|r| r.chapter_id == chapter.id)
            .map(ChapterRow::facts)
            .ok_or_else(|| Error::NotFound(format!("Chapter {} not found", chapter.id)))?;
        if !this.lessons_complete() {
            return Err(Error::Forbidden(
                "Complete every lesson in this chapter before taking the quiz".to_string(),
            ));
        }

        let grade = GradingService::grade_mcq(&questions, &answers, self.mcq_pass_threshold);
        let score = Decimal::try_from(grade.percentage)
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);

        let submission_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO mcq_submissions
                (user_id, course_id, chapter_id, answers, correct_count, total_questions, score, passed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(chapter.course_id)
        .bind(chapter.id)
        .bind(serde_json::to_value(&answers)?)
        .bind(grade.correct_count as i32)
        .bind(grade.total as i32)
        .bind(score)
        .bind(grade.passed)
        .fetch_one(&mut *tx)
        .await?;

        let mut events = Vec::new();
        let mut unlocked = Vec::new();
        if grade.passed && complete_chapter(&mut tx, user_id, chapter.id, true).await? {
            events.push(DomainEvent::ChapterPassed {
                user_id,
                course_id: chapter.course_id,
                chapter_id: chapter.id,
                score: grade.percentage,
            });
            let step = apply_cascade(&mut tx, user_id, chapter.course_id, &mut rows, chapter.id).await?;
            let more = settle(&mut tx, user_id, chapter.course_id).await?;
            unlocked.extend(step.unlocked);
            unlocked.extend(more.unlocked);
            events.extend(step.events);
            events.extend(more.events);
        }

        let staged = stage_events(&mut tx, events).await?;
        tx.commit().await?;

        tracing::info!(
            %user_id,
            chapter_id = %chapter.id,
            %submission_id,
            score = grade.percentage,
            passed = grade.passed,
            "quiz submitted"
        );

        Ok(Outcome::new(
            McqSubmissionResult {
                submission_id,
                correct_count: grade.correct_count,
                total_questions: grade.total,
                percentage: grade.percentage,
                threshold: self.mcq_pass_threshold,
                passed: grade.passed,
                results: grade.results,
                unlocked_chapters: unlocked,
            },
            staged,
        ))
    }

    /// Per-chapter progress for an enrolled learner. Settles pending
    /// quiz-less completions and issues the certificate once every chapter
    /// is complete.
    pub async fn course_progress(&self, user_id: Uuid, course_id: Uuid) -> Result<Outcome<CourseProgress>> {
        let mut tx = self.pool.begin().await?;
        ensure_enrolled(&mut tx, user_id, course_id).await?;

        let mut settled = settle(&mut tx, user_id, course_id).await?;
        let rows = load_chapter_rows(&mut tx, user_id, course_id).await?;
        let total = rows.len();
        let completed = rows.iter().filter(|r| r.completed).count();
        let course_completed = total > 0 && completed == total;

        if course_completed {
            if let Some(cert) = self.certificates.issue_in_tx(&mut tx, user_id, course_id).await? {
                tracing::info!(%user_id, %course_id, certificate_id = %cert.id, "certificate issued");
                settled.events.push(DomainEvent::CertificateIssued {
                    certificate_id: cert.id,
                    user_id,
                    course_id,
                    verification_code: cert.verification_code,
                });
            }
        }

        let completions = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT lc.chapter_id, lc.lesson_id
            FROM lesson_completions lc
            JOIN chapters ch ON ch.id = lc.chapter_id
            WHERE lc.user_id = $1 AND ch.course_id = $2
            ORDER BY lc.completed_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await?;

        let events = stage_events(&mut tx, settled.events).await?;
        tx.commit().await?;

        let mut by_chapter: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (chapter_id, lesson_id) in completions {
            by_chapter.entry(chapter_id).or_default().push(lesson_id);
        }

        let certificate_code = self
            .certificates
            .find_for_course(user_id, course_id)
            .await?
            .map(|c| c.verification_code);

        let chapters = rows
            .into_iter()
            .map(|row| {
                let facts = row.facts();
                ChapterProgressView {
                    chapter_id: row.chapter_id,
                    state: facts.state(),
                    locked: facts.locked,
                    completed: facts.completed,
                    mcq_passed: facts.mcq_passed,
                    total_lessons: facts.total_lessons,
                    completed_lessons: by_chapter.remove(&row.chapter_id).unwrap_or_default(),
                    has_mcqs: facts.has_quiz(),
                    can_attempt_mcq: facts.can_attempt_mcq() && !facts.completed,
                    title: row.title,
                    order: row.order,
                }
            })
            .collect();

        Ok(Outcome::new(
            CourseProgress {
                course_id,
                total_chapters: total,
                completed_chapters: completed,
                overall_progress: overall_progress(completed, total),
                course_completed,
                certificate_code,
                chapters,
            },
            events,
        ))
    }

    /// The learner's quiz attempts for a chapter, newest first.
    pub async fn list_mcq_submissions(&self, user_id: Uuid, chapter_id: Uuid) -> Result<Vec<McqSubmission>> {
        let rows = sqlx::query_as::<_, McqSubmission>(
            r#"
            SELECT * FROM mcq_submissions
            WHERE user_id = $1 AND chapter_id = $2
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(user_id)
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Every enrolled course with its completion percentage.
    pub async fn dashboard(&self, user_id: Uuid) -> Result<Vec<CourseProgressSummary>> {
        let rows = sqlx::query_as::<_, (Uuid, String, chrono::DateTime<chrono::Utc>, i64, i64)>(
            r#"
            SELECT e.course_id, c.title, e.enrolled_at,
                   (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = e.course_id) AS total_chapters,
                   (SELECT COUNT(*) FROM user_progress up
                     WHERE up.user_id = e.user_id AND up.course_id = e.course_id AND up.completed) AS completed_chapters
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(course_id, title, enrolled_at, total, completed)| {
                let total = total.max(0) as usize;
                let completed = completed.max(0) as usize;
                CourseProgressSummary {
                    course_id,
                    title,
                    enrolled_at,
                    total_chapters: total,
                    completed_chapters: completed,
                    overall_progress: overall_progress(completed, total),
                }
            })
            .collect())
    }
}
