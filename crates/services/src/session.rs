use std::sync::{Arc, Mutex};

use course_core::Clock;
use course_core::model::{Course, CourseId, LearnerId};
use storage::repository::Storage;
use tracing::{info, warn};

use crate::context::CourseContext;
use crate::error::CourseError;
use crate::revision::lock;

/// A learner's view of the platform: the course directory plus the course
/// context that is currently entered, if any.
pub struct LearnerSession {
    learner_id: LearnerId,
    clock: Clock,
    storage: Storage,
    active: Mutex<Option<Arc<CourseContext>>>,
}

impl LearnerSession {
    #[must_use]
    pub fn new(learner_id: LearnerId, clock: Clock, storage: Storage) -> Self {
        Self {
            learner_id,
            clock,
            storage,
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// All courses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` if the directory cannot be loaded.
    pub async fn list_courses(&self) -> Result<Vec<Course>, CourseError> {
        self.storage
            .courses
            .list_courses()
            .await
            .map_err(CourseError::fetch("courses"))
    }

    /// Enter a course: fetch its header, replace any previous context and load
    /// lessons and completions.
    ///
    /// If the loads fail the new context stays active with whatever loaded, so
    /// callers can retry with `CourseContext::refresh`.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::CourseNotFound` for an unknown course and
    /// `CourseError::Fetch` on transport failure.
    pub async fn enter_course(&self, course_id: CourseId) -> Result<Arc<CourseContext>, CourseError> {
        let course = self
            .storage
            .courses
            .get_course(course_id)
            .await
            .map_err(CourseError::fetch("course"))?
            .ok_or_else(|| CourseError::CourseNotFound(course_id.to_string()))?;

        let ctx = Arc::new(CourseContext::new(
            self.learner_id,
            course,
            self.clock,
            &self.storage,
        ));
        let previous = lock(&self.active).replace(Arc::clone(&ctx));
        if let Some(previous) = previous {
            previous.close();
        }
        info!(%course_id, learner_id = %self.learner_id, "entered course");

        ctx.refresh().await?;
        Ok(ctx)
    }

    /// Enter a course from a route parameter. Strings that are not course
    /// identifiers resolve to `CourseNotFound`.
    ///
    /// # Errors
    ///
    /// See [`LearnerSession::enter_course`].
    pub async fn enter_course_route(&self, raw: &str) -> Result<Arc<CourseContext>, CourseError> {
        let course_id: CourseId = raw.parse().map_err(|e| {
            warn!(route = raw, error = %e, "unparseable course route");
            CourseError::CourseNotFound(raw.to_owned())
        })?;
        self.enter_course(course_id).await
    }

    /// Leave the active course. Returns false if no course was active.
    pub fn exit_course(&self) -> bool {
        match lock(&self.active).take() {
            Some(ctx) => {
                ctx.close();
                info!(course_id = %ctx.course_id(), "left course");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn active_course(&self) -> Option<Arc<CourseContext>> {
        lock(&self.active).clone()
    }

    /// The active context.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::NoActiveCourse` outside a course.
    pub fn require_active(&self) -> Result<Arc<CourseContext>, CourseError> {
        self.active_course().ok_or(CourseError::NoActiveCourse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FlakyRepo, course, lesson};
    use course_core::time::fixed_clock;

    fn session(repo: &FlakyRepo) -> LearnerSession {
        LearnerSession::new(LearnerId::random(), fixed_clock(), Storage::from_repo(repo.clone()))
    }

    #[tokio::test]
    async fn entering_a_course_loads_its_lessons() {
        let repo = FlakyRepo::new();
        let c = course("HTML");
        repo.seed_course(&c).await;
        repo.seed_lesson(lesson(c.id(), 1)).await;
        let session = session(&repo);

        let ctx = session.enter_course(c.id()).await.unwrap();
        assert_eq!(ctx.catalog().len(), 1);
        assert!(ctx.completions().is_loaded());
        assert!(Arc::ptr_eq(&ctx, &session.require_active().unwrap()));
    }

    #[tokio::test]
    async fn switching_courses_closes_the_previous_context() {
        let repo = FlakyRepo::new();
        let (a, b) = (course("A"), course("B"));
        repo.seed_course(&a).await;
        repo.seed_course(&b).await;
        let session = session(&repo);

        let first = session.enter_course(a.id()).await.unwrap();
        let second = session.enter_course(b.id()).await.unwrap();
        assert!(!first.is_active());
        assert!(second.is_active());

        assert!(session.exit_course());
        assert!(!second.is_active());
        assert!(!session.exit_course());
        assert!(matches!(session.require_active(), Err(CourseError::NoActiveCourse)));
    }

    #[tokio::test]
    async fn bad_routes_are_not_found() {
        let repo = FlakyRepo::new();
        let session = session(&repo);

        let err = session.enter_course_route("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, CourseError::CourseNotFound(ref raw) if raw == "not-a-uuid"));

        let err = session
            .enter_course_route(&CourseId::random().to_string())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(session.active_course().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_context_for_retry() {
        let repo = FlakyRepo::new();
        let c = course("Retry");
        repo.seed_course(&c).await;
        repo.seed_lesson(lesson(c.id(), 1)).await;
        let session = session(&repo);

        repo.fail_reads(true);
        let err = session.enter_course(c.id()).await.unwrap_err();
        assert!(matches!(err, CourseError::Fetch { .. }));
        let ctx = session.active_course().expect("context stays active");
        assert_eq!(ctx.course_id(), c.id());
        assert!(ctx.is_active());
        assert!(!ctx.catalog().is_loaded());

        repo.fail_reads(false);
        ctx.refresh().await.unwrap();
        assert_eq!(ctx.catalog().len(), 1);
        assert!(ctx.completions().is_loaded());
    }

    #[tokio::test]
    async fn unreachable_course_header_enters_nothing() {
        let repo = FlakyRepo::new();
        let c = course("Offline");
        repo.seed_course(&c).await;
        let session = session(&repo);

        repo.fail_course_reads(true);
        assert!(session.enter_course(c.id()).await.unwrap_err().is_retryable());
        assert!(session.active_course().is_none());
        assert!(session.list_courses().await.is_err());
    }

    #[tokio::test]
    async fn failed_reload_keeps_loaded_lessons() {
        let repo = FlakyRepo::new();
        let c = course("Stale");
        repo.seed_course(&c).await;
        repo.seed_lesson(lesson(c.id(), 1)).await;
        let ctx = session(&repo).enter_course(c.id()).await.unwrap();

        repo.fail_reads(true);
        assert!(ctx.refresh().await.unwrap_err().is_retryable());
        assert_eq!(ctx.catalog().len(), 1);
    }

    #[tokio::test]
    async fn course_list_is_newest_first() {
        let repo = FlakyRepo::new();
        let old = Course::new(CourseId::random(), "Old", None, None, course_core::time::fixed_now()).unwrap();
        let new = Course::new(
            CourseId::random(),
            "New",
            None,
            None,
            course_core::time::fixed_now() + chrono::Duration::days(1),
        )
        .unwrap();
        repo.seed_course(&old).await;
        repo.seed_course(&new).await;

        let titles: Vec<String> = session(&repo)
            .list_courses()
            .await
            .unwrap()
            .iter()
            .map(|c| c.title().to_owned())
            .collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }
}
