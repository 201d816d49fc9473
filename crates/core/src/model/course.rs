use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::CourseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty tier shown on the course card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Lenient parse for stored values, which are free text in the hosted schema.
    ///
    /// Returns `None` for empty or unrecognized values instead of failing the
    /// whole course row.
    #[must_use]
    pub fn from_stored(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|s| s.parse().ok())
    }
}

impl FromStr for Difficulty {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(CourseError::UnknownDifficulty(s.to_owned())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        };
        f.write_str(label)
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Course header as created by an administrator.
///
/// Learners only ever read courses; lessons are loaded separately through the
/// catalog so a course listing never pays for lesson content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    id: CourseId,
    title: String,
    description: Option<String>,
    difficulty: Option<Difficulty>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl Course {
    /// Creates a new course header.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if the title is blank.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
        difficulty: Option<Difficulty>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            title,
            description,
            difficulty,
            image_url: None,
            created_at,
        })
    }

    #[must_use]
    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|u| !u.trim().is_empty());
        self
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn blank_title_is_rejected() {
        let err = Course::new(CourseId::random(), "   ", None, None, fixed_now()).unwrap_err();
        assert_eq!(err, CourseError::EmptyTitle);
    }

    #[test]
    fn blank_description_is_dropped() {
        let course = Course::new(
            CourseId::random(),
            "Intro to HTML",
            Some("  ".into()),
            Some(Difficulty::Beginner),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(course.description(), None);
        assert_eq!(course.difficulty(), Some(Difficulty::Beginner));
    }

    #[test]
    fn difficulty_parse_is_case_insensitive() {
        assert_eq!("Advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert_eq!(" intermediate ".parse::<Difficulty>().unwrap(), Difficulty::Intermediate);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn stored_difficulty_is_lenient() {
        assert_eq!(Difficulty::from_stored(Some("Beginner")), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::from_stored(Some("n/a")), None);
        assert_eq!(Difficulty::from_stored(None), None);
    }

    #[test]
    fn serializes_difficulty_in_stored_form() {
        let course = Course::new(
            CourseId::random(),
            "Intro to CSS",
            None,
            Some(Difficulty::Intermediate),
            fixed_now(),
        )
        .unwrap();
        let json = serde_json::to_value(&course).unwrap();
        assert_eq!(json["title"], "Intro to CSS");
        assert_eq!(json["difficulty"], Difficulty::Intermediate.as_str());
    }
}
