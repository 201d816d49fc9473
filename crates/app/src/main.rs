use std::fmt;

use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use course_core::model::{Course, LearnerId};
use services::{
    AppServices, ChangeEvent, Clock, CourseError, LearnerSession, LessonNavigator, LessonView,
};
use storage::rest::RestConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod db;
mod seed;

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
    MissingLearner,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingLearner => {
                write!(f, "this command needs --learner or COURSE_LEARNER_ID")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Parser, Debug)]
#[command(name = "course", about = "Course progress and lesson navigation")]
struct Cli {
    #[command(flatten)]
    backend: Backend,

    /// Learner whose completions are read and written.
    #[arg(long, global = true, env = "COURSE_LEARNER_ID")]
    learner: Option<LearnerId>,

    /// Print views as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct Backend {
    /// SQLite database URL or path.
    #[arg(long = "db", global = true, env = "COURSE_DB_URL", default_value = "sqlite://dev.sqlite3")]
    db_url: String,

    /// Base URL of the hosted REST API. Selects the HTTP backend when set with an API key.
    #[arg(long, global = true, env = "COURSE_REST_URL")]
    rest_url: Option<String>,

    #[arg(long, global = true, env = "COURSE_REST_API_KEY", hide_env_values = true)]
    rest_api_key: Option<String>,

    #[arg(long, global = true, env = "COURSE_REST_ACCESS_TOKEN", hide_env_values = true)]
    rest_access_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List courses, newest first.
    Courses,
    /// List a course's lessons with completion flags.
    Lessons { course: String },
    /// Show one lesson with its position and the course progress.
    View { course: String, lesson: String },
    /// Mark a lesson as read.
    Mark { course: String, lesson: String },
    /// Remove a lesson's completion.
    Unmark { course: String, lesson: String },
    /// Insert sample courses and lessons.
    Seed {
        /// Fixed current time (RFC 3339) for deterministic seeding.
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Apply newline-delimited change events from stdin to a course and print
    /// its progress after each one.
    Sync { course: String },
}

impl Backend {
    async fn services(&self, learner_id: LearnerId) -> Result<AppServices, Box<dyn std::error::Error>> {
        if let (Some(url), Some(key)) = (&self.rest_url, &self.rest_api_key) {
            info!(%url, "using REST backend");
            let config = RestConfig::new(url.clone(), key.clone())
                .with_access_token(self.rest_access_token.clone());
            return Ok(AppServices::new_rest(config, Clock::System, learner_id));
        }

        let db_url = db::normalize_sqlite_url(&self.db_url);
        db::prepare_sqlite_file(&db_url)?;
        info!(%db_url, "using SQLite backend");
        Ok(AppServices::new_sqlite(&db_url, Clock::System, learner_id).await?)
    }
}

fn print_view(view: &LessonView, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("{}: {}% complete ({}/{})", view.course_title, view.progress_percent, view.completed, view.total);
    match &view.lesson {
        None => println!("Lesson not found"),
        Some(lesson) => {
            if let Some(label) = view.position_label() {
                println!("{label}: {}", lesson.title);
            }
            if let Some(video) = &lesson.video_url {
                println!("Video: {video}");
            }
            if let Some(content) = &lesson.content {
                println!("\n{content}\n");
            }
            println!(
                "status: {:?}  read time: {} min  previous: {}  next: {}",
                view.completion, lesson.reading_minutes, view.has_previous, view.has_next
            );
        }
    }
    Ok(())
}

fn print_courses(courses: &[Course], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(courses)?);
        return Ok(());
    }
    for course in courses {
        let difficulty = course
            .difficulty()
            .map_or_else(|| "-".to_owned(), |d| d.to_string());
        println!("{}  {:<13} {}", course.id(), difficulty, course.title());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // listing and seeding do not touch completions
    let learner_id = match (&cli.command, cli.learner) {
        (_, Some(id)) => id,
        (Command::Courses | Command::Seed { .. }, None) => LearnerId::random(),
        (_, None) => return Err(ArgsError::MissingLearner.into()),
    };
    let services = cli.backend.services(learner_id).await?;
    let session = services.session();

    match cli.command {
        Command::Courses => {
            print_courses(&session.list_courses().await?, cli.json)?;
        }
        Command::Lessons { course } => {
            let ctx = session.enter_course_route(&course).await?;
            let items = LessonNavigator::new(ctx).sidebar();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in items {
                    let mark = if item.completed { "x" } else { " " };
                    println!("[{mark}] {:>3}. {}  {}", item.order_index, item.title, item.id);
                }
            }
        }
        Command::View { course, lesson } => {
            let nav = LessonNavigator::new(session.enter_course_route(&course).await?);
            print_view(&nav.open(&lesson), cli.json)?;
        }
        Command::Mark { course, lesson } => {
            let nav = open_lesson(&session, &course, &lesson).await?;
            let outcome = nav.mark_current_as_read().await?;
            info!(?outcome, "mark finished");
            print_view(&nav.view(), cli.json)?;
        }
        Command::Unmark { course, lesson } => {
            let nav = open_lesson(&session, &course, &lesson).await?;
            let outcome = nav.unmark_current().await?;
            info!(?outcome, "unmark finished");
            print_view(&nav.view(), cli.json)?;
        }
        Command::Seed { now } => {
            let courses = seed::seed(services.storage(), now.unwrap_or_else(Utc::now)).await?;
            print_courses(&courses, cli.json)?;
        }
        Command::Sync { course } => {
            let ctx = session.enter_course_route(&course).await?;
            let (tx, handle) = services.spawn_realtime(16);
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChangeEvent>(&line) {
                    Ok(event) => tx.send(event).await?,
                    Err(e) => warn!(error = %e, "skipping malformed change event"),
                }
            }
            drop(tx);
            handle.await?;
            let progress = ctx.progress();
            println!(
                "{}: {}% complete ({}/{})",
                ctx.course().title(),
                progress.rounded_percentage(),
                progress.completed,
                progress.total
            );
        }
    }

    Ok(())
}

async fn open_lesson(
    session: &LearnerSession,
    course: &str,
    lesson: &str,
) -> Result<LessonNavigator, CourseError> {
    let nav = LessonNavigator::new(session.enter_course_route(course).await?);
    if nav.open(lesson).is_not_found() {
        warn!(%lesson, "lesson not in catalog");
    }
    Ok(nav)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!("{err}");
        std::process::exit(2);
    }
}
