//! Shared error types for the services crate.
//!
//! Nothing here is fatal. `Fetch` keeps the last-known data, `Persist` leaves
//! local state untouched so the action can be retried, and the not-found
//! variants are rendered as empty states.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the catalog, completion store, and navigator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseError {
    /// A read failed; previously loaded data is retained.
    #[error("failed to load {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: StorageError,
    },
    /// A write failed; nothing was applied locally.
    #[error("failed to save {what}: {source}")]
    Persist {
        what: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("course {0:?} not found")]
    CourseNotFound(String),
    #[error("lesson {0:?} not found in the loaded catalog")]
    LessonNotFound(String),
    #[error("no course is active")]
    NoActiveCourse,
}

impl CourseError {
    pub(crate) fn fetch(what: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| Self::Fetch { what, source }
    }

    pub(crate) fn persist(what: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| Self::Persist { what, source }
    }

    /// True for failures a user can recover from by retrying the same action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Persist { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CourseNotFound(_) | Self::LessonNotFound(_))
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
