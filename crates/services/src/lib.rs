#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod completion_store;
pub mod context;
pub mod error;
pub mod navigator;
pub mod realtime;
pub mod session;

mod revision;
#[cfg(test)]
mod test_support;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use catalog::LessonCatalog;
pub use completion_store::{CompletionStore, MutationOutcome};
pub use context::CourseContext;
pub use error::{AppServicesError, CourseError};
pub use navigator::{
    CompletionLabel, LessonListItem, LessonNavigator, LessonSummary, LessonView, MarkOutcome,
};
pub use realtime::{ChangeEvent, ChangeKind, RealtimeSync, SyncAction};
pub use session::LearnerSession;
