mod completion;
mod course;
mod ids;
mod lesson;

pub use ids::{CourseId, LearnerId, LessonId, ParseIdError};

pub use completion::{CompletionRecord, CompletionState};
pub use course::{Course, CourseError, Difficulty};
pub use lesson::{Lesson, LessonError, WORDS_PER_MINUTE};
