//! Change notifications from the hosted store, turned into reloads.
//!
//! Payloads are never patched into local state; an event only decides which
//! load to re-run for the active course.

use std::sync::Arc;

use course_core::model::{CourseId, LearnerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::CourseContext;
use crate::session::LearnerSession;

/// Table names as published by the change feed.
pub const COURSES_TABLE: &str = "courses";
pub const LESSONS_TABLE: &str = "lessons";
pub const COMPLETIONS_TABLE: &str = "lesson_completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change. `new` is absent for deletes, `old` may be absent for inserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(table: impl Into<String>, kind: ChangeKind, new: Option<Value>, old: Option<Value>) -> Self {
        Self {
            table: table.into(),
            kind,
            new,
            old,
        }
    }

    /// Reads a string column from `new`, falling back to `old`.
    fn column(&self, name: &str) -> Option<&str> {
        [self.new.as_ref(), self.old.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|row| row.get(name).and_then(Value::as_str))
    }

    /// True if either row image references `course_id` in `column`. A lesson
    /// moved between courses touches both.
    fn references(&self, column: &str, course_id: CourseId) -> bool {
        [self.new.as_ref(), self.old.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(column).and_then(Value::as_str))
            .any(|raw| raw.parse::<CourseId>().is_ok_and(|id| id == course_id))
    }

    fn learner_id(&self) -> Option<LearnerId> {
        self.column("profile_id").and_then(|raw| raw.parse().ok())
    }
}

/// What an event caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    ReloadedLessons,
    ReloadedCompletions,
    ReloadedCourse,
    /// The reload ran and failed; the previous data is kept.
    ReloadFailed,
    Ignored,
}

/// Applies change events to the learner's active course.
pub struct RealtimeSync {
    session: Arc<LearnerSession>,
}

impl RealtimeSync {
    #[must_use]
    pub fn new(session: Arc<LearnerSession>) -> Self {
        Self { session }
    }

    /// Re-run the load an event affects, if it touches the active course.
    pub async fn handle(&self, event: &ChangeEvent) -> SyncAction {
        let Some(ctx) = self.session.active_course() else {
            debug!(table = %event.table, "no active course, ignoring change");
            return SyncAction::Ignored;
        };

        match event.table.as_str() {
            LESSONS_TABLE if touches(&ctx, event, "course_id") => {
                finish(ctx.load_lessons().await, SyncAction::ReloadedLessons)
            }
            COMPLETIONS_TABLE
                if touches(&ctx, event, "course_id")
                    && event.learner_id() == Some(ctx.learner_id()) =>
            {
                finish(ctx.load_completions().await, SyncAction::ReloadedCompletions)
            }
            COURSES_TABLE if touches(&ctx, event, "id") => {
                finish(ctx.reload_course().await, SyncAction::ReloadedCourse)
            }
            _ => {
                debug!(table = %event.table, kind = ?event.kind, "change does not affect active course");
                SyncAction::Ignored
            }
        }
    }

    /// Drain events until the sender side closes.
    pub async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) {
        info!("realtime sync started");
        while let Some(event) = events.recv().await {
            let action = self.handle(&event).await;
            debug!(table = %event.table, ?action, "change handled");
        }
        info!("realtime sync stopped");
    }
}

fn touches(ctx: &CourseContext, event: &ChangeEvent, column: &str) -> bool {
    event.references(column, ctx.course_id())
}

fn finish<E: std::fmt::Display>(result: Result<(), E>, action: SyncAction) -> SyncAction {
    match result {
        Ok(()) => action,
        Err(e) => {
            warn!(?action, error = %e, "reload after change failed");
            SyncAction::ReloadFailed
        }
    }
}
