use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId, LessonId};

//
// ─── COMPLETION RECORD ────────────────────────────────────────────────────────
//

/// Persisted fact that a learner finished a lesson.
///
/// The natural key is `(learner_id, lesson_id, course_id)`; storage upserts on
/// it so redundant marking only refreshes `completed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            course_id,
            lesson_id,
            completed_at,
        }
    }

    /// Returns true if both records share the same natural key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.learner_id == other.learner_id
            && self.lesson_id == other.lesson_id
            && self.course_id == other.course_id
    }
}

//
// ─── DISPLAY STATE ────────────────────────────────────────────────────────────
//

/// Completion display state of one lesson for one learner.
///
/// ```text
/// Unknown ─load→ Incomplete ─mark→ Marking ─ok→ Completed
///                    ↑                │
///                    └──── failed ────┘
/// Completed ─unmark→ Incomplete
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompletionState {
    /// Completions have not been loaded yet.
    #[default]
    Unknown,
    Incomplete,
    /// A mark request is in flight; the trigger must stay disabled.
    Marking,
    Completed,
}

impl CompletionState {
    /// Derives the display state from the completion mirror.
    ///
    /// `marking` wins over the mirror: the pending response decides.
    #[must_use]
    pub fn derive(loaded: bool, completed: bool, marking: bool) -> Self {
        match (loaded, marking, completed) {
            (_, true, _) => Self::Marking,
            (false, false, _) => Self::Unknown,
            (true, false, true) => Self::Completed,
            (true, false, false) => Self::Incomplete,
        }
    }

    /// Attempt to enter `Marking`. Returns `None` when a mark is not allowed
    /// (already completed, already marking, or still unknown).
    #[must_use]
    pub fn begin_mark(self) -> Option<Self> {
        match self {
            Self::Incomplete => Some(Self::Marking),
            Self::Unknown | Self::Marking | Self::Completed => None,
        }
    }

    /// Whether the mark-complete trigger should be enabled.
    #[must_use]
    pub fn can_mark(self) -> bool {
        self.begin_mark().is_some()
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
