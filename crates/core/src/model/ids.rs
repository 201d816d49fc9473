use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for parsing an ID from a route or storage string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl ParseIdError {
    /// The kind of identifier that failed to parse (e.g. `LessonId`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The raw input that was rejected.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map($name::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                        raw: s.to_owned(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a Course
    CourseId
);

uuid_id!(
    /// Unique identifier for a Lesson
    LessonId
);

uuid_id!(
    /// Identifier of an authenticated learner (the auth provider's user id)
    LearnerId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "5b6f3c1e-8c1a-4d7e-9f10-0a1b2c3d4e5f";

    #[test]
    fn lesson_id_parses_uuid_strings() {
        let id: LessonId = RAW.parse().unwrap();
        assert_eq!(id.to_string(), RAW);
    }

    #[test]
    fn route_garbage_is_rejected() {
        let err = "lesson-one".parse::<LessonId>().unwrap_err();
        assert_eq!(err.kind(), "LessonId");
        assert_eq!(err.raw(), "lesson-one");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let id: CourseId = format!("  {RAW}\n").parse().unwrap();
        assert_eq!(id.to_string(), RAW);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id: LearnerId = RAW.parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{RAW}\""));
        let back: LearnerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn debug_names_the_kind() {
        let id: CourseId = RAW.parse().unwrap();
        assert_eq!(format!("{id:?}"), format!("CourseId({RAW})"));
    }
}
