//! Repositories backed by the hosted platform's PostgREST-style HTTP API.
//!
//! Tables live under `{base_url}/rest/v1/{table}`; filters use the `eq.`
//! operator and ordering uses `order=<column>.<asc|desc>`.

use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{
    CompletionRecord, Course, CourseId, Difficulty, LearnerId, Lesson, LessonId,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::repository::{CompletionRepository, CourseRepository, LessonRepository, StorageError};

const COURSES: &str = "courses";
const LESSONS: &str = "lessons";
const COMPLETIONS: &str = "lesson_completions";

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    /// Session token of the signed-in learner. Falls back to the API key.
    pub access_token: Option<String>,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Reads `COURSE_REST_URL`, `COURSE_REST_API_KEY`, and optionally
    /// `COURSE_REST_ACCESS_TOKEN`. Returns `None` if the URL or key is unset.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("COURSE_REST_URL").ok()?;
        let api_key = env::var("COURSE_REST_API_KEY").ok()?;
        if base_url.trim().is_empty() || api_key.trim().is_empty() {
            return None;
        }
        Some(Self::new(base_url, api_key).with_access_token(env::var("COURSE_REST_ACCESS_TOKEN").ok()))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Clone)]
pub struct RestRepository {
    client: Client,
    config: Arc<RestConfig>,
}

impl RestRepository {
    #[must_use]
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        self.client
            .request(method, self.config.table_url(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StorageError> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response)?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn upsert_rows<T: Serialize + Sync>(
        &self,
        table: &str,
        on_conflict: &str,
        rows: &[T],
    ) -> Result<(), StorageError> {
        let response = self
            .request(reqwest::Method::POST, table)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(transport)?;
        check_status(response)?;
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(status_error(status))
}

fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict(format!("http status {status}")),
        _ => StorageError::Connection(format!("http status {status}")),
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

//
// ─── ROWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize, Deserialize)]
struct CourseRow {
    id: CourseId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl CourseRow {
    fn from_course(course: &Course) -> Self {
        Self {
            id: course.id(),
            title: course.title().to_owned(),
            description: course.description().map(ToOwned::to_owned),
            difficulty: course.difficulty().map(|d| d.as_str().to_owned()),
            image_url: course.image_url().map(ToOwned::to_owned),
            created_at: Some(course.created_at()),
        }
    }

    fn into_course(self) -> Result<Course, StorageError> {
        let course = Course::new(
            self.id,
            self.title,
            self.description,
            Difficulty::from_stored(self.difficulty.as_deref()),
            self.created_at.unwrap_or_default(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(course.with_image_url(self.image_url))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LessonRow {
    id: LessonId,
    course_id: CourseId,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    order_index: i32,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl LessonRow {
    fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id(),
            course_id: lesson.course_id(),
            title: lesson.title().to_owned(),
            content: lesson.content().map(ToOwned::to_owned),
            video_url: lesson.video_url().map(|u| u.as_str().to_owned()),
            order_index: lesson.order_index(),
            created_at: Some(lesson.created_at()),
        }
    }

    fn into_lesson(self) -> Result<Lesson, StorageError> {
        let ser = |e: course_core::model::LessonError| StorageError::Serialization(e.to_string());
        Lesson::new(
            self.id,
            self.course_id,
            self.title,
            self.order_index,
            self.created_at.unwrap_or_default(),
        )
        .map_err(ser)?
        .with_content(self.content)
        .with_video_url(self.video_url.as_deref())
        .map_err(ser)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CompletionRow {
    profile_id: LearnerId,
    course_id: CourseId,
    lesson_id: LessonId,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl From<&CompletionRecord> for CompletionRow {
    fn from(record: &CompletionRecord) -> Self {
        Self {
            profile_id: record.learner_id,
            course_id: record.course_id,
            lesson_id: record.lesson_id,
            completed_at: Some(record.completed_at),
        }
    }
}

impl From<CompletionRow> for CompletionRecord {
    fn from(row: CompletionRow) -> Self {
        CompletionRecord::new(
            row.profile_id,
            row.course_id,
            row.lesson_id,
            row.completed_at.unwrap_or_default(),
        )
    }
}

//
// ─── REPOSITORIES ─────────────────────────────────────────────────────────────
//

#[async_trait::async_trait]
impl CourseRepository for RestRepository {
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let rows: Vec<CourseRow> = self
            .fetch_rows(
                COURSES,
                &[("select", "*".into()), ("order", "created_at.desc".into())],
            )
            .await?;
        rows.into_iter().map(CourseRow::into_course).collect()
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let rows: Vec<CourseRow> = self
            .fetch_rows(COURSES, &[("select", "*".into()), ("id", eq(id))])
            .await?;
        rows.into_iter().next().map(CourseRow::into_course).transpose()
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        self.upsert_rows(COURSES, "id", &[CourseRow::from_course(course)])
            .await
    }
}

#[async_trait::async_trait]
impl LessonRepository for RestRepository {
    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows: Vec<LessonRow> = self
            .fetch_rows(
                LESSONS,
                &[
                    ("select", "*".into()),
                    ("course_id", eq(course_id)),
                    ("order", "order_index.asc".into()),
                ],
            )
            .await?;
        let mut lessons = rows
            .into_iter()
            .map(LessonRow::into_lesson)
            .collect::<Result<Vec<_>, _>>()?;
        // the hosted schema does not enforce unique order indices
        lessons.sort_by(Lesson::navigation_cmp);
        Ok(lessons)
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        self.upsert_rows(LESSONS, "id", &[LessonRow::from_lesson(lesson)])
            .await
    }
}

#[async_trait::async_trait]
impl CompletionRepository for RestRepository {
    async fn completions_for(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let rows: Vec<CompletionRow> = self
            .fetch_rows(
                COMPLETIONS,
                &[
                    ("select", "profile_id,course_id,lesson_id,completed_at".into()),
                    ("profile_id", eq(learner_id)),
                    ("course_id", eq(course_id)),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(CompletionRecord::from).collect())
    }

    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        self.upsert_rows(
            COMPLETIONS,
            "profile_id,lesson_id,course_id",
            &[CompletionRow::from(record)],
        )
        .await
    }

    async fn delete_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<bool, StorageError> {
        let response = self
            .request(reqwest::Method::DELETE, COMPLETIONS)
            .query(&[
                ("profile_id", eq(learner_id)),
                ("lesson_id", eq(lesson_id)),
                ("course_id", eq(course_id)),
            ])
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(transport)?;
        let deleted: Vec<CompletionRow> = check_status(response)?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(!deleted.is_empty())
    }
}

impl crate::repository::Storage {
    /// Build storage backed by the hosted HTTP API.
    #[must_use]
    pub fn rest(config: RestConfig) -> Self {
        Self::from_repo(RestRepository::new(config))
    }
}
