use crate::models::coding_question::TestCase;
use crate::models::mcq::Mcq;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McqAnswer {
    pub mcq_id: Uuid,
    /// Zero-based option index chosen by the learner.
    pub answer: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McqResult {
    pub mcq_id: Uuid,
    pub selected: Option<i32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McqGrade {
    pub correct_count: usize,
    pub total: usize,
    pub percentage: f64,
    pub passed: bool,
    pub results: Vec<McqResult>,
}

/// Outcome of one test case after the judge has run it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseOutcome {
    pub index: usize,
    pub passed: bool,
    pub status: String,
    /// Withheld for hidden test cases.
    pub stdout: Option<String>,
    pub expected_output: Option<String>,
    pub stderr: Option<String>,
    pub time: Option<String>,
    pub memory: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodingGrade {
    pub passed_count: usize,
    pub total: usize,
    pub percentage: f64,
    pub passed: bool,
    pub results: Vec<CaseOutcome>,
}

pub struct GradingService;

impl GradingService {
    /// Grades answers against every given question. Unanswered questions
    /// count as wrong; answers for unknown questions are ignored; if a
    /// question is answered twice the first answer counts.
    pub fn grade_mcq(questions: &[Mcq], answers: &[McqAnswer], threshold: f64) -> McqGrade {
        let mut results = Vec::with_capacity(questions.len());
        let mut correct_count = 0;

        for q in questions {
            let selected = answers.iter().find(|a| a.mcq_id == q.id).map(|a| a.answer);
            let is_correct = selected == Some(q.correct_answer);
            if is_correct {
                correct_count += 1;
            }
            results.push(McqResult {
                mcq_id: q.id,
                selected,
                is_correct,
            });
        }

        let percentage = percentage(correct_count, questions.len());
        McqGrade {
            correct_count,
            total: questions.len(),
            percentage,
            passed: !questions.is_empty() && percentage >= threshold,
            results,
        }
    }

    pub fn grade_test_cases(results: Vec<CaseOutcome>, threshold: f64) -> CodingGrade {
        let passed_count = results.iter().filter(|r| r.passed).count();
        let percentage = percentage(passed_count, results.len());
        CodingGrade {
            passed_count,
            total: results.len(),
            percentage,
            passed: !results.is_empty() && percentage >= threshold,
            results,
        }
    }

    pub fn output_matches(actual: Option<&str>, case: &TestCase) -> bool {
        actual.unwrap_or_default().trim() == case.expected_output.trim()
    }
}

/// `correct / total * 100`, rounded to two decimals; zero questions is 0.
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = correct as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn mcq(correct_answer: i32) -> Mcq {
        Mcq {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            chapter_id: Uuid::new_v4(),
            question: "Pick one".into(),
            options: Json(vec!["a".into(), "b".into(), "c".into()]),
            correct_answer,
            explanation: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn answer(q: &Mcq, answer: i32) -> McqAnswer {
        McqAnswer { mcq_id: q.id, answer }
    }

    #[test]
    fn all_correct_passes() {
        let qs = vec![mcq(0), mcq(2)];
        let grade = GradingService::grade_mcq(&qs, &[answer(&qs[0], 0), answer(&qs[1], 2)], 70.0);
        assert_eq!(grade.correct_count, 2);
        assert_eq!(grade.percentage, 100.0);
        assert!(grade.passed);
    }

    #[test]
    fn threshold_is_inclusive() {
        let qs = vec![mcq(0), mcq(0), mcq(0), mcq(0)];
        let answers: Vec<_> = qs
            .iter()
            .enumerate()
            .map(|(i, q)| answer(q, if i < 3 { 0 } else { 1 }))
            .collect();
        let grade = GradingService::grade_mcq(&qs, &answers, 75.0);
        assert_eq!(grade.percentage, 75.0);
        assert!(grade.passed);

        let grade = GradingService::grade_mcq(&qs, &answers, 75.01);
        assert!(!grade.passed);
    }

    #[test]
    fn unanswered_and_foreign_answers() {
        let qs = vec![mcq(1), mcq(1), mcq(1)];
        let stray = McqAnswer { mcq_id: Uuid::new_v4(), answer: 1 };
        let grade = GradingService::grade_mcq(&qs, &[answer(&qs[0], 1), stray], 70.0);
        assert_eq!(grade.correct_count, 1);
        assert_eq!(grade.total, 3);
        assert_eq!(grade.percentage, 33.33);
        assert!(!grade.passed);
        assert_eq!(grade.results[1].selected, None);
    }

    #[test]
    fn first_answer_wins_on_duplicates() {
        let qs = vec![mcq(0)];
        let grade = GradingService::grade_mcq(&qs, &[answer(&qs[0], 2), answer(&qs[0], 0)], 50.0);
        assert!(!grade.passed);
    }

    #[test]
    fn empty_quiz_never_passes() {
        let grade = GradingService::grade_mcq(&[], &[], 0.0);
        assert_eq!(grade.percentage, 0.0);
        assert!(!grade.passed);
    }

    #[test]
    fn output_comparison_trims() {
        let case = TestCase {
            input: String::new(),
            expected_output: "42\n".into(),
            is_hidden: false,
        };
        assert!(GradingService::output_matches(Some("  42  \n"), &case));
        assert!(!GradingService::output_matches(Some("4 2"), &case));
        assert!(!GradingService::output_matches(None, &case));
    }

    #[test]
    fn coding_grade_counts_passed_cases() {
        let outcome = |index, passed| CaseOutcome {
            index,
            passed,
            status: "Accepted".into(),
            stdout: None,
            expected_output: None,
            stderr: None,
            time: None,
            memory: None,
        };
        let grade = GradingService::grade_test_cases(vec![outcome(0, true), outcome(1, false)], 50.0);
        assert_eq!(grade.passed_count, 1);
        assert_eq!(grade.percentage, 50.0);
        assert!(grade.passed);
    }
}
