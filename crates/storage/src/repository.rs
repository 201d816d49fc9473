use async_trait::async_trait;
use course_core::model::{
    CompletionRecord, Course, CourseId, LearnerId, Lesson, LessonId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to course headers.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// List courses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;

    /// Fetch a course header by ID.
    ///
    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Persist or update a course header.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Lessons of a course ordered by `order_index` ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried or a row is malformed.
    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;

    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another lesson of the same course
    /// already uses the order index, or other storage errors.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// All completion records of a learner for one course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn completions_for(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<CompletionRecord>, StorageError>;

    /// Insert or refresh a completion, keyed by `(learner, lesson, course)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError>;

    /// Delete a completion. Returns whether a record was removed; a missing
    /// record is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn delete_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<bool, StorageError>;
}

type CompletionKey = (LearnerId, LessonId, CourseId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    completions: Arc<Mutex<HashMap<CompletionKey, CompletionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored completion records across all learners.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn completion_count(&self) -> Result<usize, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut courses: Vec<Course> = guard.values().cloned().collect();
        courses.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(courses)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(course.id(), course.clone());
        Ok(())
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut lessons: Vec<Lesson> = guard
            .values()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        lessons.sort_by(Lesson::navigation_cmp);
        Ok(lessons)
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let clash = guard.values().any(|l| {
            l.course_id() == lesson.course_id()
                && l.order_index() == lesson.order_index()
                && l.id() != lesson.id()
        });
        if clash {
            return Err(StorageError::Conflict(format!(
                "order_index {} already used in course {}",
                lesson.order_index(),
                lesson.course_id()
            )));
        }
        guard.insert(lesson.id(), lesson.clone());
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn completions_for(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|r| r.learner_id == learner_id && r.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (record.learner_id, record.lesson_id, record.course_id),
            record.clone(),
        );
        Ok(())
    }

    async fn delete_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<bool, StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.remove(&(learner_id, lesson_id, course_id)).is_some())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub completions: Arc<dyn CompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// Share one backend value across all three repository handles.
    #[must_use]
    pub fn from_repo<R>(repo: R) -> Self
    where
        R: CourseRepository + LessonRepository + CompletionRepository + Clone + 'static,
    {
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CompletionRepository> = Arc::new(repo);
        Self {
            courses,
            lessons,
            completions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    fn lesson(course: CourseId, order: i32) -> Lesson {
        Lesson::new(LessonId::random(), course, format!("Lesson {order}"), order, fixed_now())
            .unwrap()
    }

    #[tokio::test]
    async fn lessons_come_back_in_order() {
        let repo = InMemoryRepository::new();
        let course = CourseId::random();
        for order in [3, 1, 2] {
            repo.upsert_lesson(&lesson(course, order)).await.unwrap();
        }
        repo.upsert_lesson(&lesson(CourseId::random(), 1)).await.unwrap();

        let fetched = repo.lessons_for_course(course).await.unwrap();
        let order: Vec<i32> = fetched.iter().map(Lesson::order_index).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_order_index_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let course = CourseId::random();
        let first = lesson(course, 1);
        repo.upsert_lesson(&first).await.unwrap();

        let err = repo.upsert_lesson(&lesson(course, 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        // re-saving the same lesson is fine
        repo.upsert_lesson(&first).await.unwrap();
    }

    #[tokio::test]
    async fn completion_upsert_keeps_one_record_per_key() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::random();
        let course = CourseId::random();
        let lesson = LessonId::random();

        let first = CompletionRecord::new(learner, course, lesson, fixed_now());
        let later = CompletionRecord::new(
            learner,
            course,
            lesson,
            fixed_now() + chrono::Duration::hours(1),
        );
        repo.upsert_completion(&first).await.unwrap();
        repo.upsert_completion(&later).await.unwrap();

        let records = repo.completions_for(learner, course).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].completed_at, later.completed_at);
        assert_eq!(repo.completion_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_a_missing_completion_is_not_an_error() {
        let repo = InMemoryRepository::new();
        let removed = repo
            .delete_completion(LearnerId::random(), CourseId::random(), LessonId::random())
            .await
            .unwrap();
        assert!(!removed);
    }
}
