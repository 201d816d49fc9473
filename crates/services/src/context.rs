use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use course_core::Clock;
use course_core::model::{Course, CourseId, LearnerId};
use course_core::progress::ProgressSnapshot;
use storage::repository::{CourseRepository, Storage};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::catalog::LessonCatalog;
use crate::completion_store::CompletionStore;
use crate::error::CourseError;
use crate::revision::{Revision, lock};

/// State of the course a learner is currently inside.
///
/// Created on course entry and closed on exit. Results of work started against
/// a closed context must not be applied to the view.
pub struct CourseContext {
    learner_id: LearnerId,
    course: Mutex<Course>,
    courses: Arc<dyn CourseRepository>,
    catalog: LessonCatalog,
    completions: CompletionStore,
    revision: Arc<Revision>,
    active: AtomicBool,
}

impl fmt::Debug for CourseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourseContext")
            .field("learner_id", &self.learner_id)
            .field("course_id", &self.course_id())
            .field("lessons", &self.catalog.len())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl CourseContext {
    pub(crate) fn new(learner_id: LearnerId, course: Course, clock: Clock, storage: &Storage) -> Self {
        let revision = Arc::new(Revision::new());
        let course_id = course.id();
        Self {
            learner_id,
            course: Mutex::new(course),
            courses: Arc::clone(&storage.courses),
            catalog: LessonCatalog::new(
                course_id,
                Arc::clone(&storage.lessons),
                Arc::clone(&revision),
            ),
            completions: CompletionStore::new(
                learner_id,
                course_id,
                clock,
                Arc::clone(&storage.completions),
                Arc::clone(&revision),
            ),
            revision,
            active: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.catalog.course_id()
    }

    #[must_use]
    pub fn course(&self) -> Course {
        lock(&self.course).clone()
    }

    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn completions(&self) -> &CompletionStore {
        &self.completions
    }

    /// Re-run the lesson load.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` if the lessons cannot be fetched.
    pub async fn load_lessons(&self) -> Result<(), CourseError> {
        self.catalog.load().await.map(|_| ())
    }

    /// Re-run the completion load.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` if the completions cannot be fetched.
    pub async fn load_completions(&self) -> Result<(), CourseError> {
        self.completions.load().await.map(|_| ())
    }

    /// Re-fetch the course header shown in the progress banner.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` on transport failure and
    /// `CourseError::CourseNotFound` if the course was deleted.
    pub async fn reload_course(&self) -> Result<(), CourseError> {
        let course_id = self.course_id();
        let course = self
            .courses
            .get_course(course_id)
            .await
            .map_err(CourseError::fetch("course"))?
            .ok_or_else(|| CourseError::CourseNotFound(course_id.to_string()))?;
        *lock(&self.course) = course;
        self.revision.bump();
        Ok(())
    }

    /// Load lessons and completions concurrently.
    ///
    /// Both loads always run; the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` if either load fails.
    pub async fn refresh(&self) -> Result<(), CourseError> {
        let (lessons, completions) = tokio::join!(self.load_lessons(), self.load_completions());
        debug!(course_id = %self.course_id(), "course context refreshed");
        lessons.and(completions)
    }

    /// Progress over the loaded catalog. Completions of lessons missing from the
    /// catalog are not counted.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot::from_lessons(&self.catalog.lessons(), &self.completions.completed_ids())
    }

    /// Receiver that changes whenever the catalog, the completion mirror, a
    /// pending mutation, or the course header changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.current()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            debug!(course_id = %self.course_id(), "course context closed");
            self.revision.bump();
        } else {
            warn!(course_id = %self.course_id(), "course context closed twice");
        }
    }
}
