//! Repository wrapper with failure injection and write/read gates.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use course_core::model::{
    CompletionRecord, Course, CourseId, Difficulty, LearnerId, Lesson, LessonId,
};
use course_core::time::fixed_now;
use storage::repository::{
    CompletionRepository, CourseRepository, InMemoryRepository, LessonRepository, StorageError,
};
use tokio::sync::Semaphore;

/// `fail_reads` covers lessons and completions; course headers have their own switch.
#[derive(Clone, Default)]
pub(crate) struct FlakyRepo {
    inner: InMemoryRepository,
    fail_reads: Arc<AtomicBool>,
    fail_course_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    lesson_reads: Arc<AtomicUsize>,
    completion_writes: Arc<AtomicUsize>,
    read_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
    write_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

async fn pass(gate: &Mutex<Option<Arc<Semaphore>>>) {
    let sem = gate.lock().unwrap().clone();
    if let Some(sem) = sem {
        sem.acquire().await.unwrap().forget();
    }
}

fn down() -> StorageError {
    StorageError::Connection("backend unavailable".into())
}

impl FlakyRepo {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail course header and listing reads only.
    pub(crate) fn fail_course_reads(&self, fail: bool) {
        self.fail_course_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn lesson_reads(&self) -> usize {
        self.lesson_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn completion_writes(&self) -> usize {
        self.completion_writes.load(Ordering::SeqCst)
    }

    /// Block reads until `add_permits` is called on the returned semaphore.
    pub(crate) fn hold_reads(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.read_gate.lock().unwrap() = Some(Arc::clone(&sem));
        sem
    }

    /// Block writes until `add_permits` is called on the returned semaphore.
    pub(crate) fn hold_writes(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.write_gate.lock().unwrap() = Some(Arc::clone(&sem));
        sem
    }

    pub(crate) async fn seed_course(&self, course: &Course) {
        self.inner.upsert_course(course).await.unwrap();
    }

    pub(crate) async fn seed_lesson(&self, lesson: Lesson) {
        self.inner.upsert_lesson(&lesson).await.unwrap();
    }

    pub(crate) async fn seed_completion(&self, record: CompletionRecord) {
        self.inner.upsert_completion(&record).await.unwrap();
    }

    pub(crate) async fn stored_completions(
        &self,
        learner: LearnerId,
        course: CourseId,
    ) -> Vec<CompletionRecord> {
        self.inner.completions_for(learner, course).await.unwrap()
    }
}

pub(crate) fn course(title: &str) -> Course {
    Course::new(
        CourseId::random(),
        title,
        None,
        Some(Difficulty::Beginner),
        fixed_now(),
    )
    .unwrap()
}

pub(crate) fn lesson(course: CourseId, order: i32) -> Lesson {
    Lesson::new(LessonId::random(), course, format!("Lesson {order}"), order, fixed_now())
        .unwrap()
        .with_content(Some(format!("Body of lesson {order}")))
}

#[async_trait]
impl CourseRepository for FlakyRepo {
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        pass(&self.read_gate).await;
        if self.fail_course_reads.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.list_courses().await
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        if self.fail_course_reads.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.get_course(id).await
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        self.inner.upsert_course(course).await
    }
}

#[async_trait]
impl LessonRepository for FlakyRepo {
    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        self.lesson_reads.fetch_add(1, Ordering::SeqCst);
        pass(&self.read_gate).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.lessons_for_course(course_id).await
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        self.inner.upsert_lesson(lesson).await
    }
}

#[async_trait]
impl CompletionRepository for FlakyRepo {
    async fn completions_for(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(down());
        }
        // snapshot before waiting so a held read returns pre-write data
        let snapshot = self.inner.completions_for(learner_id, course_id).await;
        pass(&self.read_gate).await;
        snapshot
    }

    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        self.completion_writes.fetch_add(1, Ordering::SeqCst);
        pass(&self.write_gate).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.upsert_completion(record).await
    }

    async fn delete_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<bool, StorageError> {
        self.completion_writes.fetch_add(1, Ordering::SeqCst);
        pass(&self.write_gate).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner
            .delete_completion(learner_id, course_id, lesson_id)
            .await
    }
}
