use course_core::model::{CompletionRecord, Course, CourseId, Difficulty, LearnerId, Lesson, LessonId};
use course_core::time::{fixed_clock, fixed_now};
use services::{AppServices, CompletionLabel, LessonNavigator, MarkOutcome};
use storage::repository::{
    CompletionRepository, CourseRepository, InMemoryRepository, LessonRepository, Storage,
};

struct World {
    repo: InMemoryRepository,
    services: AppServices,
    course: Course,
    lessons: Vec<Lesson>,
    learner: LearnerId,
}

async fn world(lesson_count: i32) -> World {
    let repo = InMemoryRepository::new();
    let course = Course::new(
        CourseId::random(),
        "Web Development Basics",
        Some("HTML and CSS".into()),
        Some(Difficulty::Beginner),
        fixed_now(),
    )
    .unwrap();
    repo.upsert_course(&course).await.unwrap();

    let mut lessons = Vec::new();
    for order in (1..=lesson_count).rev() {
        let lesson = Lesson::new(LessonId::random(), course.id(), format!("Lesson {order}"), order, fixed_now())
            .unwrap()
            .with_content(Some("word ".repeat(450)));
        repo.upsert_lesson(&lesson).await.unwrap();
        lessons.push(lesson);
    }
    lessons.reverse();

    let learner = LearnerId::random();
    let services = AppServices::from_storage(Storage::from_repo(repo.clone()), fixed_clock(), learner);
    World {
        repo,
        services,
        course,
        lessons,
        learner,
    }
}

#[tokio::test]
async fn learner_works_through_a_course() {
    let w = world(3).await;
    let session = w.services.session();
    let nav = LessonNavigator::new(session.enter_course(w.course.id()).await.unwrap());

    let view = nav.open(&w.lessons[0].id().to_string());
    assert_eq!(view.course_title, "Web Development Basics");
    assert_eq!(view.position_label().as_deref(), Some("Lesson 1 of 3"));
    assert_eq!(view.lesson.as_ref().unwrap().reading_minutes, 3);
    assert_eq!(view.progress_percent, 0);

    for expected in [33, 67, 100] {
        assert_eq!(nav.mark_current_as_read().await.unwrap(), MarkOutcome::Marked);
        assert_eq!(nav.view().progress_percent, expected);
        nav.go_to_next();
    }
    assert!(!nav.has_next());
    assert!(nav.context().progress().is_complete());

    let stored = w.repo.completions_for(w.learner, w.course.id()).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|r| r.completed_at == fixed_now()));
}

#[tokio::test]
async fn progress_survives_reentering_the_course() {
    let w = world(3).await;
    w.repo
        .upsert_completion(&CompletionRecord::new(w.learner, w.course.id(), w.lessons[1].id(), fixed_now()))
        .await
        .unwrap();
    let session = w.services.session();

    let first = session.enter_course(w.course.id()).await.unwrap();
    let nav = LessonNavigator::new(first);
    let view = nav.open(&w.lessons[1].id().to_string());
    assert_eq!(view.completion, CompletionLabel::Completed);
    assert_eq!(nav.unmark_current().await.unwrap(), MarkOutcome::Unmarked);

    assert!(session.exit_course());
    let again = session.enter_course(w.course.id()).await.unwrap();
    assert_eq!(again.progress().completed, 0);
    assert_eq!(w.repo.completion_count().unwrap(), 0);
}

#[tokio::test]
async fn empty_course_has_zero_progress_and_no_lessons() {
    let w = world(0).await;
    let ctx = w.services.session().enter_course(w.course.id()).await.unwrap();
    let nav = LessonNavigator::new(ctx);

    let view = nav.open(&LessonId::random().to_string());
    assert!(view.is_not_found());
    assert_eq!((view.total, view.progress_percent), (0, 0));
    assert!(nav.sidebar().is_empty());
}

#[tokio::test]
async fn one_lesson_course_has_no_neighbours() {
    let w = world(1).await;
    let nav = LessonNavigator::new(w.services.session().enter_course(w.course.id()).await.unwrap());
    let view = nav.open(&w.lessons[0].id().to_string());
    assert!(!view.has_previous && !view.has_next);
    assert!(nav.go_to_next().is_none() && nav.go_to_previous().is_none());
}

#[tokio::test]
async fn completions_of_other_learners_do_not_count() {
    let w = world(2).await;
    w.repo
        .upsert_completion(&CompletionRecord::new(
            LearnerId::random(),
            w.course.id(),
            w.lessons[0].id(),
            fixed_now(),
        ))
        .await
        .unwrap();
    let ctx = w.services.session().enter_course(w.course.id()).await.unwrap();
    assert_eq!(ctx.progress().completed, 0);
}
