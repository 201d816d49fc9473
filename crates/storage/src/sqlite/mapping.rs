use chrono::{DateTime, Utc};
use course_core::model::{
    CompletionRecord, Course, CourseId, Difficulty, LearnerId, Lesson, LessonId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn course_id_from_str(raw: &str) -> Result<CourseId, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn lesson_id_from_str(raw: &str) -> Result<LessonId, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn learner_id_from_str(raw: &str) -> Result<LearnerId, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let id = course_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let difficulty: Option<String> = row.try_get("difficulty").map_err(ser)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    let course = Course::new(
        id,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        Difficulty::from_stored(difficulty.as_deref()),
        created_at,
    )
    .map_err(ser)?;

    Ok(course.with_image_url(row.try_get("image_url").map_err(ser)?))
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let id = lesson_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let course_id = course_id_from_str(&row.try_get::<String, _>("course_id").map_err(ser)?)?;
    let order_index: i64 = row.try_get("order_index").map_err(ser)?;
    let order_index = i32::try_from(order_index)
        .map_err(|_| StorageError::Serialization(format!("order_index overflow: {order_index}")))?;
    let video_url: Option<String> = row.try_get("video_url").map_err(ser)?;

    Lesson::new(
        id,
        course_id,
        row.try_get::<String, _>("title").map_err(ser)?,
        order_index,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)?
    .with_content(row.try_get("content").map_err(ser)?)
    .with_video_url(video_url.as_deref())
    .map_err(ser)
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<CompletionRecord, StorageError> {
    Ok(CompletionRecord::new(
        learner_id_from_str(&row.try_get::<String, _>("profile_id").map_err(ser)?)?,
        course_id_from_str(&row.try_get::<String, _>("course_id").map_err(ser)?)?,
        lesson_id_from_str(&row.try_get::<String, _>("lesson_id").map_err(ser)?)?,
        row.try_get("completed_at").map_err(ser)?,
    ))
}

/// Maps unique-constraint violations to `Conflict`, everything else to `Connection`.
pub(crate) fn write_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Conflict(db.message().to_owned())
        }
        _ => StorageError::Connection(e.to_string()),
    }
}
