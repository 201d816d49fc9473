use course_core::model::{CourseId, Lesson};

use super::SqliteRepository;
use super::mapping::{map_lesson_row, write_error};
use crate::repository::{LessonRepository, StorageError};

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, content, video_url, order_index, created_at
            FROM lessons
            WHERE course_id = ?1
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(lessons)
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, course_id, title, content, video_url, order_index, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                video_url = excluded.video_url,
                order_index = excluded.order_index
            ",
        )
        .bind(lesson.id().to_string())
        .bind(lesson.course_id().to_string())
        .bind(lesson.title())
        .bind(lesson.content())
        .bind(lesson.video_url().map(|u| u.as_str()))
        .bind(i64::from(lesson.order_index()))
        .bind(lesson.created_at())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}
