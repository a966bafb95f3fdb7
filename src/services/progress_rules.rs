//! Chapter sequencing and unlock rules, kept free of I/O so that the
//! progress service can load facts, plan a transition here, and apply it
//! inside a single transaction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    Locked,
    UnlockedInProgress,
    LessonsCompleteAwaitingMcq,
    Passed,
}

/// Everything the rules need to know about one chapter for one learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFacts {
    pub chapter_id: Uuid,
    pub order: i32,
    /// A missing progress row counts as locked.
    pub locked: bool,
    pub completed: bool,
    pub mcq_passed: bool,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    pub active_mcqs: usize,
}

impl ChapterFacts {
    pub fn lessons_complete(&self) -> bool {
        self.completed_lessons >= self.total_lessons
    }

    pub fn has_quiz(&self) -> bool {
        self.active_mcqs > 0
    }

    pub fn can_attempt_mcq(&self) -> bool {
        !self.locked && self.has_quiz() && self.lessons_complete()
    }

    /// Unlocked, unfinished chapter with no quiz whose lessons are all done.
    pub fn completes_without_quiz(&self) -> bool {
        !self.locked && !self.completed && !self.has_quiz() && self.lessons_complete()
    }

    pub fn state(&self) -> ChapterState {
        if self.completed {
            ChapterState::Passed
        } else if self.locked {
            ChapterState::Locked
        } else if self.can_attempt_mcq() {
            ChapterState::LessonsCompleteAwaitingMcq
        } else {
            ChapterState::UnlockedInProgress
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("missing orders {0:?} below the next position")]
    Gaps(Vec<i32>),
    #[error("duplicate order {0}")]
    Duplicate(i32),
    #[error("requested order must list every sibling exactly once")]
    NotAPermutation,
}

/// Next position for a new sibling: `max + 1`, refusing to extend a sequence
/// that already has holes in `1..next`.
pub fn next_sibling_order(existing: &[i32]) -> Result<i32, OrderingError> {
    let mut seen = BTreeSet::new();
    for &order in existing {
        if !seen.insert(order) {
            return Err(OrderingError::Duplicate(order));
        }
    }
    let next = seen.iter().next_back().copied().unwrap_or(0) + 1;
    let missing: Vec<i32> = (1..next).filter(|o| !seen.contains(o)).collect();
    if missing.is_empty() {
        Ok(next)
    } else {
        Err(OrderingError::Gaps(missing))
    }
}

/// Maps a requested id sequence onto dense 1-based orders. The request must
/// be a permutation of the current siblings.
pub fn plan_reorder(current: &[Uuid], requested: &[Uuid]) -> Result<Vec<(Uuid, i32)>, OrderingError> {
    if current.len() != requested.len() {
        return Err(OrderingError::NotAPermutation);
    }
    let current_set: BTreeSet<&Uuid> = current.iter().collect();
    let requested_set: BTreeSet<&Uuid> = requested.iter().collect();
    if requested_set.len() != requested.len() || current_set != requested_set {
        return Err(OrderingError::NotAPermutation);
    }
    Ok(requested
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx as i32 + 1))
        .collect())
}

/// Rounded completion percentage; an empty course is 0%.
pub fn overall_progress(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advance {
    /// Chapters to mark completed, in order. The first is the trigger.
    pub complete: Vec<Uuid>,
    /// Chapters whose progress row must exist with `locked = false`.
    pub unlock: Vec<Uuid>,
}

/// Plans the effect of `trigger` becoming complete: the chapter at
/// `order + 1` is unlocked, and any quiz-less chapter that is already
/// satisfied on unlock completes in turn.
///
/// `chapters` are one course's chapters for one learner, any order.
pub fn plan_advance(chapters: &[ChapterFacts], trigger: Uuid) -> Advance {
    let mut advance = Advance::default();
    let Some(mut current) = chapters.iter().find(|c| c.chapter_id == trigger) else {
        return advance;
    };
    advance.complete.push(current.chapter_id);

    while let Some(next) = chapters.iter().find(|c| c.order == current.order + 1) {
        if next.completed {
            break;
        }
        advance.unlock.push(next.chapter_id);
        let unlocked = ChapterFacts {
            locked: false,
            ..next.clone()
        };
        if !unlocked.completes_without_quiz() {
            break;
        }
        advance.complete.push(next.chapter_id);
        current = next;
    }
    advance
}

/// First chapter by order, which enrollment unlocks.
pub fn entry_chapter(chapters: &[ChapterFacts]) -> Option<&ChapterFacts> {
    chapters.iter().min_by_key(|c| c.order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(order: i32, lessons: usize, done: usize, mcqs: usize) -> ChapterFacts {
        ChapterFacts {
            chapter_id: Uuid::new_v4(),
            order,
            locked: order != 1,
            completed: false,
            mcq_passed: false,
            total_lessons: lessons,
            completed_lessons: done,
            active_mcqs: mcqs,
        }
    }

    #[test]
    fn next_order_starts_at_one() {
        assert_eq!(next_sibling_order(&[]), Ok(1));
        assert_eq!(next_sibling_order(&[2, 1, 3]), Ok(4));
    }

    #[test]
    fn next_order_rejects_gaps_and_duplicates() {
        assert_eq!(next_sibling_order(&[1, 3]), Err(OrderingError::Gaps(vec![2])));
        assert_eq!(next_sibling_order(&[2]), Err(OrderingError::Gaps(vec![1])));
        assert_eq!(next_sibling_order(&[1, 1]), Err(OrderingError::Duplicate(1)));
    }

    #[test]
    fn reorder_assigns_dense_positions() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let plan = plan_reorder(&[a, b, c], &[c, a, b]).unwrap();
        assert_eq!(plan, vec![(c, 1), (a, 2), (b, 3)]);
    }

    #[test]
    fn reorder_requires_permutation() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(plan_reorder(&[a, b], &[a, a]), Err(OrderingError::NotAPermutation));
        assert_eq!(plan_reorder(&[a, b], &[a]), Err(OrderingError::NotAPermutation));
        assert_eq!(
            plan_reorder(&[a, b], &[a, Uuid::new_v4()]),
            Err(OrderingError::NotAPermutation)
        );
    }

    #[test]
    fn progress_of_empty_course_is_zero() {
        assert_eq!(overall_progress(0, 0), 0);
        assert_eq!(overall_progress(1, 3), 33);
        assert_eq!(overall_progress(2, 3), 67);
        assert_eq!(overall_progress(3, 3), 100);
    }

    #[test]
    fn states_follow_lesson_and_quiz_progress() {
        let mut c = chapter(1, 2, 0, 1);
        assert_eq!(c.state(), ChapterState::UnlockedInProgress);
        assert!(!c.can_attempt_mcq());

        c.completed_lessons = 2;
        assert_eq!(c.state(), ChapterState::LessonsCompleteAwaitingMcq);
        assert!(c.can_attempt_mcq());
        // lesson completion never touches the lock flag
        assert!(!c.locked);

        c.completed = true;
        c.mcq_passed = true;
        assert_eq!(c.state(), ChapterState::Passed);

        let locked = chapter(2, 1, 1, 1);
        assert_eq!(locked.state(), ChapterState::Locked);
        assert!(!locked.can_attempt_mcq());
    }

    #[test]
    fn quizless_chapter_cannot_attempt_mcq() {
        let c = chapter(1, 1, 1, 0);
        assert!(!c.can_attempt_mcq());
        assert!(c.completes_without_quiz());
    }

    #[test]
    fn passing_unlocks_only_the_next_chapter() {
        let chapters = vec![chapter(1, 1, 1, 1), chapter(2, 1, 0, 1), chapter(3, 1, 0, 1)];
        let advance = plan_advance(&chapters, chapters[0].chapter_id);
        assert_eq!(advance.complete, vec![chapters[0].chapter_id]);
        assert_eq!(advance.unlock, vec![chapters[1].chapter_id]);
    }

    #[test]
    fn advance_cascades_through_satisfied_quizless_chapters() {
        // chapter 2 is empty, chapter 3 was read ahead but has no quiz, chapter 4 has a quiz
        let chapters = vec![
            chapter(1, 1, 1, 1),
            chapter(2, 0, 0, 0),
            chapter(3, 2, 2, 0),
            chapter(4, 1, 0, 2),
        ];
        let advance = plan_advance(&chapters, chapters[0].chapter_id);
        assert_eq!(
            advance.complete,
            vec![chapters[0].chapter_id, chapters[1].chapter_id, chapters[2].chapter_id]
        );
        assert_eq!(
            advance.unlock,
            vec![chapters[1].chapter_id, chapters[2].chapter_id, chapters[3].chapter_id]
        );
    }

    #[test]
    fn advance_on_last_chapter_unlocks_nothing() {
        let chapters = vec![chapter(1, 1, 1, 1)];
        let advance = plan_advance(&chapters, chapters[0].chapter_id);
        assert_eq!(advance.complete.len(), 1);
        assert!(advance.unlock.is_empty());
    }

    #[test]
    fn advance_stops_at_already_completed_chapter() {
        let mut chapters = vec![chapter(1, 1, 1, 1), chapter(2, 1, 1, 1)];
        chapters[1].completed = true;
        chapters[1].locked = false;
        let advance = plan_advance(&chapters, chapters[0].chapter_id);
        assert!(advance.unlock.is_empty());
    }

    #[test]
    fn unknown_trigger_plans_nothing() {
        let chapters = vec![chapter(1, 1, 1, 1)];
        assert_eq!(plan_advance(&chapters, Uuid::new_v4()), Advance::default());
    }

    #[test]
    fn entry_chapter_is_lowest_order() {
        let chapters = vec![chapter(2, 0, 0, 0), chapter(1, 0, 0, 0)];
        assert_eq!(entry_chapter(&chapters).map(|c| c.order), Some(1));
        assert!(entry_chapter(&[]).is_none());
    }
}
