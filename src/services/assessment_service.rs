use crate::dto::assessment_dto::{CodingSubmissionResult, SubmitCodePayload};
use crate::error::{Error, Result};
use crate::models::coding_question::{CodingQuestion, TestCase};
use crate::models::submission::CodingSubmission;
use crate::services::grading_service::{CaseOutcome, GradingService};
use crate::services::judge_service::{language_id, CodeJudge};
use crate::services::progress_service::{ensure_enrolled, lock_unlocked_chapter};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Runs `source` against every case in order. Hidden cases report only
/// their verdict.
pub async fn run_test_cases(
    judge: &dyn CodeJudge,
    source: &str,
    language: &str,
    cases: &[TestCase],
) -> Result<Vec<CaseOutcome>> {
    let mut outcomes = Vec::with_capacity(cases.len());
    for (index, case) in cases.iter().enumerate() {
        let run = judge.run(source, language, &case.input).await?;
        let passed = run.accepted() && GradingService::output_matches(run.stdout.as_deref(), case);
        let (stdout, expected_output, stderr) = if case.is_hidden {
            (None, None, None)
        } else {
            (
                run.stdout,
                Some(case.expected_output.clone()),
                run.stderr.or(run.compile_output),
            )
        };
        outcomes.push(CaseOutcome {
            index,
            passed,
            status: run.status,
            stdout,
            expected_output,
            stderr,
            time: run.time,
            memory: run.memory,
        });
    }
    Ok(outcomes)
}

#[derive(Clone)]
pub struct AssessmentService {
    pool: PgPool,
    judge: Arc<dyn CodeJudge>,
    pass_threshold: f64,
}

impl AssessmentService {
    pub fn new(pool: PgPool, judge: Arc<dyn CodeJudge>, pass_threshold: f64) -> Self {
        Self {
            pool,
            judge,
            pass_threshold,
        }
    }

    async fn find_question(&self, question_id: Uuid) -> Result<CodingQuestion> {
        sqlx::query_as::<_, CodingQuestion>(
            r#"SELECT * FROM coding_questions WHERE id = $1 AND is_active"#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Coding question {} not found", question_id)))
    }

    /// Grades a submission against the judge and records it. Results are
    /// informational and do not gate chapter completion.
    pub async fn submit_code(
        &self,
        user_id: Uuid,
        question_id: Uuid,
        payload: SubmitCodePayload,
    ) -> Result<CodingSubmissionResult> {
        let question = self.find_question(question_id).await?;
        let language = payload
            .language
            .map(|l| l.trim().to_ascii_lowercase())
            .unwrap_or_else(|| question.language.clone());
        if language_id(&language).is_none() {
            return Err(Error::BadRequest(format!("Unsupported language '{}'", language)));
        }

        // Access check only; the row lock is released before the judge runs.
        {
            let mut tx = self.pool.begin().await?;
            ensure_enrolled(&mut tx, user_id, question.course_id).await?;
            lock_unlocked_chapter(&mut tx, user_id, question.chapter_id).await?;
            tx.commit().await?;
        }

        let outcomes = run_test_cases(
            self.judge.as_ref(),
            &payload.source_code,
            &language,
            &question.test_cases.0,
        )
        .await?;
        let grade = GradingService::grade_test_cases(outcomes, self.pass_threshold);
        let score = Decimal::try_from(grade.percentage)
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);

        let submission_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO coding_submissions
                (user_id, question_id, chapter_id, language, source_code, results, passed_count, total_count, score, passed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(question.id)
        .bind(question.chapter_id)
        .bind(&language)
        .bind(&payload.source_code)
        .bind(serde_json::to_value(&grade.results)?)
        .bind(grade.passed_count as i32)
        .bind(grade.total as i32)
        .bind(score)
        .bind(grade.passed)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            %user_id,
            %question_id,
            %submission_id,
            passed = grade.passed_count,
            total = grade.total,
            "code submission graded"
        );

        Ok(CodingSubmissionResult {
            submission_id,
            passed_count: grade.passed_count,
            total_count: grade.total,
            percentage: grade.percentage,
            passed: grade.passed,
            results: grade.results,
        })
    }

    pub async fn list_submissions(&self, user_id: Uuid, question_id: Uuid) -> Result<Vec<CodingSubmission>> {
        let rows = sqlx::query_as::<_, CodingSubmission>(
            r#"
            SELECT * FROM coding_submissions
            WHERE user_id = $1 AND question_id = $2
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::judge_service::{JudgeRun, MockCodeJudge};

    fn run(status_id: i32, stdout: &str) -> JudgeRun {
        JudgeRun {
            status_id,
            status: if status_id == 3 { "Accepted".into() } else { "Runtime Error".into() },
            stdout: Some(stdout.to_string()),
            stderr: None,
            compile_output: None,
            time: Some("0.01".into()),
            memory: Some(1024),
        }
    }

    fn case(input: &str, expected: &str, hidden: bool) -> TestCase {
        TestCase {
            input: input.into(),
            expected_output: expected.into(),
            is_hidden: hidden,
        }
    }

    #[tokio::test]
    async fn echoes_are_compared_per_case() {
        let mut judge = MockCodeJudge::new();
        judge
            .expect_run()
            .times(2)
            .returning(|_, _, stdin| Ok(run(3, &format!("{}\n", stdin))));

        let cases = vec![case("1", "1", false), case("2", "3", false)];
        let outcomes = run_test_cases(&judge, "print(input())", "python", &cases).await.unwrap();

        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert_eq!(outcomes[1].expected_output.as_deref(), Some("3"));
        assert_eq!(outcomes[1].index, 1);
    }

    #[tokio::test]
    async fn hidden_cases_reveal_only_the_verdict() {
        let mut judge = MockCodeJudge::new();
        judge.expect_run().returning(|_, _, _| Ok(run(3, "secret")));

        let outcomes = run_test_cases(&judge, "x", "python", &[case("", "secret", true)])
            .await
            .unwrap();

        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].stdout, None);
        assert_eq!(outcomes[0].expected_output, None);
    }

    #[tokio::test]
    async fn hidden_cases_withhold_stderr() {
        let mut judge = MockCodeJudge::new();
        judge.expect_run().times(2).returning(|_, _, stdin| {
            Ok(JudgeRun {
                stderr: Some(stdin.to_string()),
                ..run(3, "")
            })
        });

        let cases = vec![case("visible-input", "", false), case("hidden-input", "", true)];
        let outcomes = run_test_cases(&judge, "x", "python", &cases).await.unwrap();

        assert_eq!(outcomes[0].stderr.as_deref(), Some("visible-input"));
        assert_eq!(outcomes[1].stderr, None);
    }

    #[tokio::test]
    async fn runtime_errors_fail_even_with_matching_output() {
        let mut judge = MockCodeJudge::new();
        judge.expect_run().returning(|_, _, _| Ok(run(11, "42")));

        let outcomes = run_test_cases(&judge, "x", "python", &[case("", "42", false)])
            .await
            .unwrap();
        assert!(!outcomes[0].passed);
        assert_eq!(outcomes[0].status, "Runtime Error");
    }

    #[tokio::test]
    async fn judge_failure_aborts_the_run() {
        let mut judge = MockCodeJudge::new();
        judge
            .expect_run()
            .times(1)
            .returning(|_, _, _| Err(Error::Judge("timed out".into())));

        let cases = vec![case("1", "1", false), case("2", "2", false)];
        let err = run_test_cases(&judge, "x", "python", &cases).await.unwrap_err();
        assert!(matches!(err, Error::Judge(_)));
    }
}
