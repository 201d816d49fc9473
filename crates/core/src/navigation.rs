//! Previous/next bounds over an ordered lesson sequence.

use crate::model::{Lesson, LessonId};

/// Position of the current lesson inside an ordered catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    index: usize,
    len: usize,
}

impl Position {
    /// Returns `None` when `index` is out of range (including an empty catalog).
    #[must_use]
    pub fn new(index: usize, len: usize) -> Option<Self> {
        (index < len).then_some(Self { index, len })
    }

    /// Finds `lesson_id` in `lessons`, which must already be in navigation order.
    #[must_use]
    pub fn locate(lessons: &[Lesson], lesson_id: LessonId) -> Option<Self> {
        lessons
            .iter()
            .position(|l| l.id() == lesson_id)
            .and_then(|index| Self::new(index, lessons.len()))
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One-based position for "Lesson n of m".
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.len
    }

    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        self.has_previous().then(|| Self {
            index: self.index - 1,
            len: self.len,
        })
    }

    #[must_use]
    pub fn next(&self) -> Option<Self> {
        self.has_next().then(|| Self {
            index: self.index + 1,
            len: self.len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseId;
    use crate::time::fixed_now;

    fn catalog(n: i32) -> Vec<Lesson> {
        let course = CourseId::random();
        (1..=n)
            .map(|i| Lesson::new(LessonId::random(), course, format!("L{i}"), i, fixed_now()).unwrap())
            .collect()
    }

    #[test]
    fn first_lesson_has_no_previous() {
        let lessons = catalog(3);
        let pos = Position::locate(&lessons, lessons[0].id()).unwrap();
        assert!(!pos.has_previous());
        assert!(pos.has_next());
        assert!(pos.previous().is_none());
    }

    #[test]
    fn middle_lesson_has_both_neighbours() {
        let lessons = catalog(3);
        let pos = Position::locate(&lessons, lessons[1].id()).unwrap();
        assert!(pos.has_previous());
        assert!(pos.has_next());
        assert_eq!(pos.ordinal(), 2);
        assert_eq!(pos.next().unwrap().index(), 2);
        assert_eq!(pos.previous().unwrap().index(), 0);
    }

    #[test]
    fn last_lesson_has_no_next() {
        let lessons = catalog(3);
        let pos = Position::locate(&lessons, lessons[2].id()).unwrap();
        assert!(!pos.has_next());
        assert!(pos.next().is_none());
    }

    #[test]
    fn single_lesson_has_no_neighbours() {
        let lessons = catalog(1);
        let pos = Position::locate(&lessons, lessons[0].id()).unwrap();
        assert!(!pos.has_previous());
        assert!(!pos.has_next());
    }

    #[test]
    fn unknown_lesson_is_not_found() {
        let lessons = catalog(2);
        assert!(Position::locate(&lessons, LessonId::random()).is_none());
        assert!(Position::locate(&[], LessonId::random()).is_none());
        assert!(Position::new(0, 0).is_none());
    }
}
