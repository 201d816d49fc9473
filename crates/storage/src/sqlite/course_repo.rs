use course_core::model::{Course, CourseId};

use super::SqliteRepository;
use super::mapping::{map_course_row, write_error};
use crate::repository::{CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, difficulty, image_url, created_at
            FROM courses
            ORDER BY created_at DESC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            courses.push(map_course_row(&row)?);
        }
        Ok(courses)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, difficulty, image_url, created_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, title, description, difficulty, image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                difficulty = excluded.difficulty,
                image_url = excluded.image_url
            ",
        )
        .bind(course.id().to_string())
        .bind(course.title())
        .bind(course.description())
        .bind(course.difficulty().map(|d| d.as_str()))
        .bind(course.image_url())
        .bind(course.created_at())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}
