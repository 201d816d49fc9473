use std::sync::{Arc, Mutex};

use course_core::model::{CompletionState, Lesson, LessonId};
use course_core::navigation::Position;
use course_core::progress::ProgressSnapshot;
use serde::Serialize;
use tracing::{debug, warn};

use crate::completion_store::MutationOutcome;
use crate::context::CourseContext;
use crate::error::CourseError;
use crate::revision::lock;

/// What happened to a mark/unmark request issued from the lesson view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    Marked,
    Unmarked,
    AlreadyCompleted,
    NotCompleted,
    /// A mutation for this lesson is still in flight.
    AlreadyPending,
    /// No lesson is selected, it is not in the catalog, or completions are not loaded.
    NotReady,
    /// The learner moved to another lesson or left the course before the
    /// request settled; the view must not be updated from this result.
    Stale,
}

/// Everything the lesson page shows, in one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonView {
    pub course_title: String,
    /// `None` while loading or when the route does not name a catalog lesson.
    pub lesson: Option<LessonSummary>,
    pub position: Option<(usize, usize)>,
    pub has_previous: bool,
    pub has_next: bool,
    pub completion: CompletionLabel,
    pub progress_percent: u8,
    pub completed: usize,
    pub total: usize,
}

/// Lesson body with its optional video reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonSummary {
    pub id: LessonId,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub reading_minutes: usize,
}

impl From<&Lesson> for LessonSummary {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id(),
            title: lesson.title().to_owned(),
            content: lesson.content().map(str::to_owned),
            video_url: lesson.video_url().map(|u| u.as_str().to_owned()),
            reading_minutes: lesson.reading_minutes(),
        }
    }
}

/// Serializable mirror of `CompletionState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionLabel {
    Unknown,
    Incomplete,
    Marking,
    Completed,
}

impl From<CompletionState> for CompletionLabel {
    fn from(state: CompletionState) -> Self {
        match state {
            CompletionState::Unknown => Self::Unknown,
            CompletionState::Incomplete => Self::Incomplete,
            CompletionState::Marking => Self::Marking,
            CompletionState::Completed => Self::Completed,
        }
    }
}

impl LessonView {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.lesson.is_none()
    }

    /// "Lesson n of m", when the current lesson is in the catalog.
    #[must_use]
    pub fn position_label(&self) -> Option<String> {
        self.position.map(|(n, m)| format!("Lesson {n} of {m}"))
    }
}

/// One row of the course sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonListItem {
    pub id: LessonId,
    pub title: String,
    pub order_index: i32,
    pub completed: bool,
    pub current: bool,
}

#[derive(Debug, Default)]
struct Selection {
    route: Option<String>,
    lesson_id: Option<LessonId>,
}

/// Resolves the routed lesson against the catalog and issues completion
/// commands for it.
pub struct LessonNavigator {
    ctx: Arc<CourseContext>,
    selection: Mutex<Selection>,
}

impl LessonNavigator {
    #[must_use]
    pub fn new(ctx: Arc<CourseContext>) -> Self {
        Self {
            ctx,
            selection: Mutex::new(Selection::default()),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<CourseContext> {
        &self.ctx
    }

    /// Select the lesson named by a route parameter and return its view.
    ///
    /// Unparseable routes select nothing and render as not found.
    pub fn open(&self, route: &str) -> LessonView {
        let lesson_id = match route.parse::<LessonId>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(route, error = %e, "unparseable lesson route");
                None
            }
        };
        {
            let mut selection = lock(&self.selection);
            selection.route = Some(route.to_owned());
            selection.lesson_id = lesson_id;
        }
        self.view()
    }

    pub fn select(&self, lesson_id: LessonId) {
        let mut selection = lock(&self.selection);
        selection.route = Some(lesson_id.to_string());
        selection.lesson_id = Some(lesson_id);
    }

    #[must_use]
    pub fn current_lesson_id(&self) -> Option<LessonId> {
        lock(&self.selection).lesson_id
    }

    /// Raw route parameter of the current selection.
    #[must_use]
    pub fn current_route(&self) -> Option<String> {
        lock(&self.selection).route.clone()
    }

    #[must_use]
    pub fn current_lesson(&self) -> Option<Lesson> {
        self.current_lesson_id()
            .and_then(|id| self.ctx.catalog().find_lesson(id).ok())
    }

    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.current_lesson_id()
            .and_then(|id| self.ctx.catalog().position_of(id))
    }

    /// `None` while the catalog is loading or the lesson is not in it.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.position().map(|p| p.index())
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.position().is_some_and(|p| p.has_previous())
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.position().is_some_and(|p| p.has_next())
    }

    /// Move to the previous lesson. No-op at the first lesson.
    pub fn go_to_previous(&self) -> Option<Lesson> {
        let target = self.position()?.previous()?;
        self.move_to(target)
    }

    /// Move to the next lesson. No-op at the last lesson.
    pub fn go_to_next(&self) -> Option<Lesson> {
        let target = self.position()?.next()?;
        self.move_to(target)
    }

    fn move_to(&self, target: Position) -> Option<Lesson> {
        let lesson = self.ctx.catalog().get(target.index())?;
        self.select(lesson.id());
        debug!(lesson_id = %lesson.id(), index = target.index(), "navigated");
        Some(lesson)
    }

    fn is_stale(&self, lesson_id: LessonId) -> bool {
        !self.ctx.is_active() || self.current_lesson_id() != Some(lesson_id)
    }

    fn target(&self) -> Result<Option<LessonId>, CourseError> {
        if !self.ctx.is_active() {
            return Err(CourseError::NoActiveCourse);
        }
        Ok(self.current_lesson().map(|l| l.id()))
    }

    /// Mark the current lesson complete.
    ///
    /// Does nothing when the lesson is already complete or a mark is pending.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::NoActiveCourse` for a closed context and
    /// `CourseError::Persist` if the store rejects the write.
    pub async fn mark_current_as_read(&self) -> Result<MarkOutcome, CourseError> {
        let Some(lesson_id) = self.target()? else {
            return Ok(MarkOutcome::NotReady);
        };
        let completions = self.ctx.completions();
        // an unmark in flight still displays as completed
        if completions.is_pending(lesson_id) {
            return Ok(MarkOutcome::AlreadyPending);
        }
        let state = completions.completion_state(lesson_id);
        if state.begin_mark().is_none() {
            return Ok(match state {
                CompletionState::Completed => MarkOutcome::AlreadyCompleted,
                CompletionState::Marking => MarkOutcome::AlreadyPending,
                CompletionState::Unknown | CompletionState::Incomplete => MarkOutcome::NotReady,
            });
        }

        let result = completions.mark_complete(lesson_id).await;
        self.settle(lesson_id, result, MarkOutcome::Marked)
    }

    /// Remove the current lesson's completion.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::NoActiveCourse` for a closed context and
    /// `CourseError::Persist` if the store cannot be reached.
    pub async fn unmark_current(&self) -> Result<MarkOutcome, CourseError> {
        let Some(lesson_id) = self.target()? else {
            return Ok(MarkOutcome::NotReady);
        };
        let completions = self.ctx.completions();
        if completions.is_pending(lesson_id) {
            return Ok(MarkOutcome::AlreadyPending);
        }
        match completions.completion_state(lesson_id) {
            CompletionState::Completed => {}
            CompletionState::Incomplete => return Ok(MarkOutcome::NotCompleted),
            CompletionState::Marking => return Ok(MarkOutcome::AlreadyPending),
            CompletionState::Unknown => return Ok(MarkOutcome::NotReady),
        }

        let result = completions.unmark_complete(lesson_id).await;
        self.settle(lesson_id, result, MarkOutcome::Unmarked)
    }

    fn settle(
        &self,
        lesson_id: LessonId,
        result: Result<MutationOutcome, CourseError>,
        applied: MarkOutcome,
    ) -> Result<MarkOutcome, CourseError> {
        if self.is_stale(lesson_id) {
            if let Err(e) = &result {
                warn!(%lesson_id, error = %e, "completion write failed after navigating away");
            }
            debug!(%lesson_id, "dropping stale completion result");
            return Ok(MarkOutcome::Stale);
        }
        match result? {
            MutationOutcome::Applied => Ok(applied),
            MutationOutcome::AlreadyPending => Ok(MarkOutcome::AlreadyPending),
        }
    }

    /// Snapshot of the lesson page for the current selection.
    #[must_use]
    pub fn view(&self) -> LessonView {
        let lesson = self.current_lesson();
        let position = self.position();
        let completion = lesson
            .as_ref()
            .map_or(CompletionState::Unknown, |l| {
                self.ctx.completions().completion_state(l.id())
            });
        let progress: ProgressSnapshot = self.ctx.progress();

        LessonView {
            course_title: self.ctx.course().title().to_owned(),
            lesson: lesson.as_ref().map(LessonSummary::from),
            position: position.map(|p| (p.ordinal(), p.len())),
            has_previous: position.is_some_and(|p| p.has_previous()),
            has_next: position.is_some_and(|p| p.has_next()),
            completion: completion.into(),
            progress_percent: progress.rounded_percentage(),
            completed: progress.completed,
            total: progress.total,
        }
    }

    /// Lessons in navigation order with their completion flags.
    #[must_use]
    pub fn sidebar(&self) -> Vec<LessonListItem> {
        let current = self.current_lesson_id();
        let completed = self.ctx.completions().completed_ids();
        self.ctx
            .catalog()
            .lessons()
            .iter()
            .map(|lesson| LessonListItem {
                id: lesson.id(),
                title: lesson.title().to_owned(),
                order_index: lesson.order_index(),
                completed: completed.contains(&lesson.id()),
                current: current == Some(lesson.id()),
            })
            .collect()
    }
}
