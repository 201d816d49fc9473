use course_core::model::{CompletionRecord, CourseId, LearnerId, LessonId};

use super::SqliteRepository;
use super::mapping::{map_completion_row, write_error};
use crate::repository::{CompletionRepository, StorageError};

#[async_trait::async_trait]
impl CompletionRepository for SqliteRepository {
    async fn completions_for(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT profile_id, course_id, lesson_id, completed_at
            FROM lesson_completions
            WHERE profile_id = ?1 AND course_id = ?2
            ORDER BY completed_at ASC
            ",
        )
        .bind(learner_id.to_string())
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_completion_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_completions (profile_id, course_id, lesson_id, completed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(profile_id, lesson_id, course_id) DO UPDATE SET
                -- keep created_at from the first mark; only refresh completed_at
                completed_at = excluded.completed_at
            ",
        )
        .bind(record.learner_id.to_string())
        .bind(record.course_id.to_string())
        .bind(record.lesson_id.to_string())
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn delete_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            DELETE FROM lesson_completions
            WHERE profile_id = ?1 AND lesson_id = ?2 AND course_id = ?3
            ",
        )
        .bind(learner_id.to_string())
        .bind(lesson_id.to_string())
        .bind(course_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.rows_affected() > 0)
    }
}
