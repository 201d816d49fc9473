use chrono::{DateTime, Duration, Utc};
use course_core::model::{Course, CourseId, Difficulty, Lesson, LessonId};
use storage::repository::Storage;
use tracing::info;
use uuid::Uuid;

struct SampleCourse {
    id: u128,
    title: &'static str,
    description: &'static str,
    difficulty: Difficulty,
    lessons: &'static [(&'static str, &'static str, Option<&'static str>)],
}

const SAMPLES: &[SampleCourse] = &[
    SampleCourse {
        id: 0x0001,
        title: "Web Development Basics",
        description: "HTML, CSS and a first look at JavaScript.",
        difficulty: Difficulty::Beginner,
        lessons: &[
            (
                "Introduction to HTML",
                "HTML describes the structure of a page with elements, tags and attributes.",
                None,
            ),
            (
                "Styling with CSS",
                "Selectors pick elements and declarations change how they look.",
                Some("https://videos.example.com/css-intro"),
            ),
            (
                "JavaScript fundamentals",
                "Variables, functions and events make pages interactive.",
                None,
            ),
        ],
    },
    SampleCourse {
        id: 0x0002,
        title: "Databases in Practice",
        description: "Relational modelling and SQL queries.",
        difficulty: Difficulty::Intermediate,
        lessons: &[
            (
                "Tables and keys",
                "Primary keys identify rows and foreign keys relate tables.",
                None,
            ),
            (
                "Querying with SELECT",
                "Filter with WHERE, sort with ORDER BY and join related tables.",
                None,
            ),
        ],
    },
];

fn course_id(n: u128) -> CourseId {
    CourseId::new(Uuid::from_u128(n << 64))
}

fn lesson_id(course: u128, order: usize) -> LessonId {
    LessonId::new(Uuid::from_u128((course << 64) | (order as u128 + 1)))
}

fn sample_lesson(
    id: LessonId,
    course_id: CourseId,
    (title, content, video): (&str, &str, Option<&str>),
    order_index: i32,
    now: DateTime<Utc>,
) -> Result<Lesson, course_core::Error> {
    Ok(Lesson::new(id, course_id, title, order_index, now)?
        .with_content(Some(content.to_owned()))
        .with_video_url(video)?)
}

/// Upserts the sample courses and lessons. Ids are stable so re-running only
/// refreshes the rows.
pub async fn seed(storage: &Storage, now: DateTime<Utc>) -> Result<Vec<Course>, Box<dyn std::error::Error>> {
    let mut seeded = Vec::with_capacity(SAMPLES.len());
    for (i, sample) in SAMPLES.iter().enumerate() {
        let course = Course::new(
            course_id(sample.id),
            sample.title,
            Some(sample.description.to_owned()),
            Some(sample.difficulty),
            now - Duration::days(i64::try_from(i)?),
        )?;
        storage.courses.upsert_course(&course).await?;

        for (order, (title, content, video)) in sample.lessons.iter().enumerate() {
            let lesson = sample_lesson(
                lesson_id(sample.id, order),
                course.id(),
                (*title, *content, *video),
                i32::try_from(order + 1)?,
                now,
            )?;
            storage.lessons.upsert_lesson(&lesson).await?;
        }
        info!(course_id = %course.id(), lessons = sample.lessons.len(), "seeded course");
        seeded.push(course);
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    #[tokio::test]
    async fn seeding_twice_is_stable() {
        let storage = Storage::in_memory();
        let first = seed(&storage, fixed_now()).await.unwrap();
        seed(&storage, fixed_now()).await.unwrap();

        let courses = storage.courses.list_courses().await.unwrap();
        assert_eq!(courses.len(), SAMPLES.len());
        assert_eq!(courses[0].id(), first[0].id());
        let lessons = storage.lessons.lessons_for_course(first[0].id()).await.unwrap();
        assert_eq!(lessons.len(), 3);
        assert!(lessons[1].video_url().is_some());
    }
}
