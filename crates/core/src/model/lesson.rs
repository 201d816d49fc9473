use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use thiserror::Error;
use url::Url;

use crate::model::ids::{CourseId, LessonId};

/// Average reading speed used for the lesson reading-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("invalid video url: {0}")]
    InvalidVideoUrl(String),
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single lesson of a course.
///
/// `order_index` positions the lesson inside its course. Navigation sorts by
/// `(order_index, id)` so the sequence stays total even if the stored data
/// carries duplicate indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    title: String,
    content: Option<String>,
    video_url: Option<Url>,
    order_index: i32,
    created_at: DateTime<Utc>,
}

impl Lesson {
    /// Creates a lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if the title is blank.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        order_index: i32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        Ok(Self {
            id,
            course_id,
            title,
            content: None,
            video_url: None,
            order_index,
            created_at,
        })
    }

    #[must_use]
    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = content.filter(|c| !c.trim().is_empty());
        self
    }

    /// Attach an optional video reference.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::InvalidVideoUrl` if the value is not an absolute URL.
    pub fn with_video_url(mut self, raw: Option<&str>) -> Result<Self, LessonError> {
        self.video_url = match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(Url::parse(s).map_err(|_| LessonError::InvalidVideoUrl(s.to_owned()))?),
            None => None,
        };
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&Url> {
        self.video_url.as_ref()
    }

    #[must_use]
    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Estimated reading time in whole minutes, rounded up.
    #[must_use]
    pub fn reading_minutes(&self) -> usize {
        let words = self
            .content
            .as_deref()
            .map_or(0, |c| c.split_whitespace().count());
        words.div_ceil(WORDS_PER_MINUTE)
    }

    /// Navigation order: ascending `order_index`, then id.
    #[must_use]
    pub fn navigation_cmp(&self, other: &Self) -> Ordering {
        self.order_index
            .cmp(&other.order_index)
            .then_with(|| self.id.cmp(&other.id))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn lesson(order: i32) -> Lesson {
        Lesson::new(LessonId::random(), CourseId::random(), "HTML basics", order, fixed_now())
            .unwrap()
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = Lesson::new(LessonId::random(), CourseId::random(), "", 1, fixed_now())
            .unwrap_err();
        assert_eq!(err, LessonError::EmptyTitle);
    }

    #[test]
    fn reading_time_rounds_up() {
        let words = vec!["word"; 201].join(" ");
        let l = lesson(1).with_content(Some(words));
        assert_eq!(l.reading_minutes(), 2);

        let exact = vec!["word"; 200].join("\n");
        assert_eq!(lesson(1).with_content(Some(exact)).reading_minutes(), 1);
    }

    #[test]
    fn missing_content_reads_in_zero_minutes() {
        assert_eq!(lesson(1).reading_minutes(), 0);
        assert_eq!(lesson(1).with_content(Some("  ".into())).content(), None);
    }

    #[test]
    fn video_url_must_be_absolute() {
        let err = lesson(1).with_video_url(Some("not a url")).unwrap_err();
        assert!(matches!(err, LessonError::InvalidVideoUrl(_)));

        let ok = lesson(1)
            .with_video_url(Some("https://video.example.com/v/42"))
            .unwrap();
        assert_eq!(ok.video_url().map(Url::as_str), Some("https://video.example.com/v/42"));

        let cleared = lesson(1).with_video_url(Some("   ")).unwrap();
        assert!(cleared.video_url().is_none());
    }

    #[test]
    fn ties_on_order_index_fall_back_to_id() {
        let a = lesson(3);
        let b = lesson(3);
        let expected = a.id().cmp(&b.id());
        assert_eq!(a.navigation_cmp(&b), expected);
        assert_eq!(lesson(1).navigation_cmp(&lesson(2)), Ordering::Less);
    }
}
