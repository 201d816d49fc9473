use std::sync::{Arc, Mutex};

use course_core::model::{CourseId, Lesson, LessonId};
use course_core::navigation::Position;
use storage::repository::LessonRepository;
use tracing::{debug, warn};

use crate::error::CourseError;
use crate::revision::{Revision, lock};

#[derive(Debug, Default)]
struct CatalogState {
    lessons: Vec<Lesson>,
    loaded: bool,
    issued: u64,
    applied: u64,
}

/// Ordered lessons of one course, fetched once per course context.
pub struct LessonCatalog {
    course_id: CourseId,
    repo: Arc<dyn LessonRepository>,
    state: Mutex<CatalogState>,
    revision: Arc<Revision>,
}

impl LessonCatalog {
    pub(crate) fn new(
        course_id: CourseId,
        repo: Arc<dyn LessonRepository>,
        revision: Arc<Revision>,
    ) -> Self {
        Self {
            course_id,
            repo,
            state: Mutex::new(CatalogState::default()),
            revision,
        }
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Fetch the course's lessons in navigation order and replace the local copy.
    ///
    /// A response that arrives after a newer load was already applied is dropped.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` on transport failure; the previously loaded
    /// lessons are kept.
    pub async fn load(&self) -> Result<Vec<Lesson>, CourseError> {
        let ticket = {
            let mut state = lock(&self.state);
            state.issued += 1;
            state.issued
        };

        let mut lessons = match self.repo.lessons_for_course(self.course_id).await {
            Ok(lessons) => lessons,
            Err(e) => {
                warn!(course_id = %self.course_id, error = %e, "lesson load failed, keeping previous catalog");
                return Err(CourseError::fetch("lessons")(e));
            }
        };
        lessons.retain(|l| l.course_id() == self.course_id);
        lessons.sort_by(Lesson::navigation_cmp);
        if lessons
            .windows(2)
            .any(|w| w[0].order_index() == w[1].order_index())
        {
            warn!(course_id = %self.course_id, "duplicate lesson order_index, falling back to id order");
        }

        let applied = {
            let mut state = lock(&self.state);
            if ticket > state.applied {
                state.lessons = lessons;
                state.loaded = true;
                state.applied = ticket;
                true
            } else {
                false
            }
        };

        if applied {
            debug!(course_id = %self.course_id, count = self.len(), "lessons loaded");
            self.revision.bump();
        } else {
            debug!(course_id = %self.course_id, ticket, "dropping out-of-order lesson load");
        }
        Ok(self.lessons())
    }

    /// Look up a lesson in the loaded catalog. Never fetches.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::LessonNotFound` if the lesson is not loaded.
    pub fn find_lesson(&self, lesson_id: LessonId) -> Result<Lesson, CourseError> {
        lock(&self.state)
            .lessons
            .iter()
            .find(|l| l.id() == lesson_id)
            .cloned()
            .ok_or_else(|| CourseError::LessonNotFound(lesson_id.to_string()))
    }

    #[must_use]
    pub fn position_of(&self, lesson_id: LessonId) -> Option<Position> {
        Position::locate(&lock(&self.state).lessons, lesson_id)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Lesson> {
        lock(&self.state).lessons.get(index).cloned()
    }

    #[must_use]
    pub fn lessons(&self) -> Vec<Lesson> {
        lock(&self.state).lessons.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False until the first successful load.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        lock(&self.state).loaded
    }
}
