use std::collections::HashSet;

use crate::model::{Lesson, LessonId};

/// Completion percentage in `[0, 100]`.
///
/// Returns `0.0` for a course without lessons. `completed_lessons` is capped
/// at `total_lessons` so stale completions can never push the value above 100.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_progress(total_lessons: usize, completed_lessons: usize) -> f64 {
    if total_lessons == 0 {
        return 0.0;
    }
    let completed = completed_lessons.min(total_lessons);
    (completed as f64 / total_lessons as f64) * 100.0
}

/// Derived progress of one learner through one course. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(total: usize, completed: usize) -> Self {
        let completed = completed.min(total);
        Self {
            completed,
            total,
            percentage: compute_progress(total, completed),
        }
    }

    /// Builds a snapshot counting only completions of lessons in the catalog.
    #[must_use]
    pub fn from_lessons(lessons: &[Lesson], completed: &HashSet<LessonId>) -> Self {
        let done = lessons
            .iter()
            .filter(|lesson| completed.contains(&lesson.id()))
            .count();
        Self::new(lessons.len(), done)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Percentage rounded for display. Never use this for comparisons.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded_percentage(&self) -> u8 {
        self.percentage.round().clamp(0.0, 100.0) as u8
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseId;
    use crate::time::fixed_now;

    fn lessons(n: i32) -> Vec<Lesson> {
        let course = CourseId::random();
        (1..=n)
            .map(|i| Lesson::new(LessonId::random(), course, format!("L{i}"), i, fixed_now()).unwrap())
            .collect()
    }

    #[test]
    fn empty_course_is_zero_percent() {
        assert_eq!(compute_progress(0, 0), 0.0);
        assert_eq!(compute_progress(0, 5), 0.0);
        assert_eq!(ProgressSnapshot::empty().rounded_percentage(), 0);
    }

    #[test]
    fn percentage_stays_in_bounds() {
        for total in 0..20 {
            for done in 0..=total {
                let p = compute_progress(total, done);
                assert!((0.0..=100.0).contains(&p), "{done}/{total} -> {p}");
            }
        }
        assert_eq!(compute_progress(3, 9), 100.0);
    }

    #[test]
    fn two_of_three_rounds_to_67() {
        let all = lessons(3);
        let done: HashSet<_> = all.iter().take(2).map(Lesson::id).collect();
        let snap = ProgressSnapshot::from_lessons(&all, &done);
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.total, 3);
        assert!((snap.percentage - 66.666_666).abs() < 0.001);
        assert_eq!(snap.rounded_percentage(), 67);
        assert_eq!(snap.remaining(), 1);
        assert!(!snap.is_complete());
    }

    #[test]
    fn completions_outside_the_catalog_are_ignored() {
        let all = lessons(2);
        let mut done: HashSet<_> = all.iter().map(Lesson::id).collect();
        done.insert(LessonId::random());
        let snap = ProgressSnapshot::from_lessons(&all, &done);
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.percentage, 100.0);
        assert!(snap.is_complete());
    }

    #[test]
    fn remaining_never_underflows() {
        let snap = ProgressSnapshot {
            completed: 4,
            total: 3,
            percentage: 100.0,
        };
        assert_eq!(snap.remaining(), 0);
        assert_eq!(ProgressSnapshot::new(3, 1).remaining(), 2);
    }
}
