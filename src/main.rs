use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod config;
mod db;
mod error;
mod feedback;
mod models;
mod report;
mod revision;
mod silent;
mod store;
mod tips;

use config::InsightsConfig;
use store::{CsvStore, FeedbackRepository, FeedbackScope};

#[derive(Parser)]
#[command(name = "lis-insights")]
#[command(about = "Lecture feedback insights for professors and administrators", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Read feedback from a CSV file instead of Postgres
    #[arg(long, global = true)]
    csv: Option<PathBuf>,
    /// Roster CSV used with --csv; derived from feedback when omitted
    #[arg(long, global = true, requires = "csv")]
    roster: Option<PathBuf>,
    /// TOML file with analysis thresholds
    #[arg(long, global = true, env = "LIS_CONFIG")]
    config: Option<PathBuf>,
    /// Evaluate as of this RFC 3339 timestamp instead of now
    #[arg(long, global = true)]
    as_of: Option<DateTime<Utc>>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import feedback from a CSV file into the database
    Import {
        #[arg(long = "file")]
        file: PathBuf,
    },
    /// Summarize feedback for one lecture
    Lecture {
        #[arg(long)]
        lecture: String,
    },
    /// Course-level rollup across lectures
    Course {
        #[arg(long)]
        course: String,
    },
    /// Clarity and trend per topic
    Topics {
        #[arg(long)]
        course: String,
    },
    /// List students with no recent feedback
    Silent {
        #[arg(long)]
        course: String,
        /// Print a nudge message for each silent student
        #[arg(long)]
        nudges: bool,
    },
    /// Rank topics for a revision session
    Revision {
        #[arg(long)]
        course: String,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Study tip or plan for one student
    Tip {
        #[arg(long)]
        student: String,
        #[arg(long)]
        plan: bool,
    },
    /// Courses that need attention
    Recommend {
        #[arg(long = "course", required = true)]
        courses: Vec<String>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Generate a markdown course report
    Report {
        #[arg(long)]
        course: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("LIS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set, or pass --csv to read feedback from a file")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(global: &GlobalArgs) -> anyhow::Result<Box<dyn FeedbackRepository>> {
    match &global.csv {
        Some(path) => {
            let store = CsvStore::open(path, global.roster.as_deref())
                .with_context(|| format!("failed to load {}", path.display()))?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(db::PgStore::new(connect().await?))),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose)?;

    let global = cli.global;
    let config = InsightsConfig::load(global.config.as_deref()).context("failed to load config")?;
    let as_of = global.as_of.unwrap_or_else(Utc::now);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { file } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &file).await?;
            println!("Inserted {inserted} feedback items from {}.", file.display());
        }
        Commands::Lecture { lecture } => {
            let store = open_store(&global).await?;
            let items = store.fetch_feedback(&FeedbackScope::Lecture(lecture.clone())).await?;
            let summary = feedback::summarize_lecture_feedback(&lecture, &items);

            if global.json {
                return print_json(&summary);
            }
            if summary.total_responses == 0 {
                println!("No feedback found for lecture {lecture}.");
                return Ok(());
            }
            let understanding = summary.understanding;
            println!(
                "Lecture {}: {} responses ({} anonymous)",
                summary.lecture_id, summary.total_responses, summary.anonymous_responses
            );
            println!(
                "- fully {}%, partial {}%, unclear {}% ({} risk)",
                understanding.full_pct, understanding.partial_pct, understanding.unclear_pct, summary.risk
            );
            for reason in summary.top_reasons.iter() {
                println!("- {}: {}", feedback::reason_label(Some(reason.reason)), reason.count);
            }
        }
        Commands::Course { course } => {
            let store = open_store(&global).await?;
            let items = store.fetch_feedback(&FeedbackScope::Course(course.clone())).await?;
            let insights = feedback::compute_course_insights(&course, &items);

            if global.json {
                return print_json(&insights);
            }
            println!(
                "Course {}: {} responses from {} students, {}% fully understood ({} risk)",
                insights.course_id,
                insights.total_responses,
                insights.participating_students,
                insights.understanding.full_pct,
                insights.risk
            );
            for lecture in insights.lectures.iter() {
                println!(
                    "- {} {}% clear across {} responses ({} risk)",
                    lecture.lecture_id, lecture.understanding.full_pct, lecture.total_responses, lecture.risk
                );
            }
        }
        Commands::Topics { course } => {
            let store = open_store(&global).await?;
            let items = store.fetch_feedback(&FeedbackScope::Course(course)).await?;
            let topics = feedback::analyze_topics(&items, as_of, &config.topics);

            if global.json {
                return print_json(&topics);
            }
            if topics.is_empty() {
                println!("No topic tags found.");
            }
            for topic in topics.iter() {
                println!(
                    "- {}: {:.0}% clear across {} responses ({})",
                    topic.topic, topic.clarity_pct, topic.responses, topic.trend
                );
            }
        }
        Commands::Silent { course, nudges } => {
            let store = open_store(&global).await?;
            let items = store.fetch_feedback(&FeedbackScope::Course(course.clone())).await?;
            let roster = store.fetch_roster(&course).await?;
            let flags = silent::detect_silent_students(&roster, &items, as_of, &config.silence);
            info!(course = %course, roster = roster.len(), silent = flags.len(), "silence check complete");

            if global.json {
                return print_json(&flags);
            }
            if flags.is_empty() {
                println!("No silent students in {course}.");
                return Ok(());
            }
            let title = store.fetch_course(&course).await?.title;
            for flag in flags.iter() {
                println!(
                    "- {} ({}) {} days silent [{}]",
                    flag.student_name, flag.student_id, flag.days_silent, flag.silent_level
                );
                if nudges {
                    println!("  {}", silent::generate_nudge_template(flag, &title));
                }
            }
        }
        Commands::Revision { course, top } => {
            let store = open_store(&global).await?;
            let items = store.fetch_feedback(&FeedbackScope::Course(course)).await?;
            let mut settings = config.revision;
            if let Some(top) = top {
                settings.top_n = top.max(1);
            }
            let plan = revision::build_revision_plan(&items, &settings);
            let session = revision::generate_session_suggestions(&plan);

            if global.json {
                return print_json(&serde_json::json!({ "plan": plan, "session": session }));
            }
            if plan.candidates.is_empty() {
                println!("No topics need revision.");
                return Ok(());
            }
            for (rank, candidate) in plan.candidates.iter().enumerate() {
                println!(
                    "{}. {} score {:.1} ({} priority): {}",
                    rank + 1,
                    candidate.topic,
                    candidate.confusion_score,
                    candidate.priority,
                    candidate.reasoning
                );
            }
            if let Some(session) = session {
                println!(
                    "Suggested session: {} minutes, {}. {}.",
                    session.duration_minutes, session.time_slot, session.format
                );
            }
        }
        Commands::Tip { student, plan } => {
            let store = open_store(&global).await?;
            let history = store.fetch_feedback(&FeedbackScope::Student(student.clone())).await?;
            let recent = config.tips.recent_count;

            if plan {
                let study_plan = tips::generate_student_study_plan(&history, &student, recent);
                if global.json {
                    return print_json(&study_plan);
                }
                println!("{}: {}", study_plan.tip.title, study_plan.tip.message);
                for action in study_plan.actions.iter() {
                    println!("- {action}");
                }
            } else {
                let tip = tips::get_personalized_tip(&history, &student, recent);
                if global.json {
                    return print_json(&tip);
                }
                println!("{}: {}", tip.title, tip.message);
            }
        }
        Commands::Recommend { courses, limit } => {
            let store = open_store(&global).await?;
            let mut snapshots = Vec::with_capacity(courses.len());
            for course_id in courses.iter() {
                let course = store.fetch_course(course_id).await?;
                let items = store.fetch_feedback(&FeedbackScope::Course(course_id.clone())).await?;
                let roster = store.fetch_roster(course_id).await?;
                snapshots.push(report::snapshot_course(&course, &items, &roster, as_of, &config));
            }
            let recommendations = tips::generate_course_recommendations(&snapshots, limit);

            if global.json {
                return print_json(&recommendations);
            }
            if recommendations.is_empty() {
                println!("All courses look healthy.");
            }
            for recommendation in recommendations.iter() {
                println!(
                    "- {} ({}, {} risk): {}",
                    recommendation.title, recommendation.course_id, recommendation.risk, recommendation.message
                );
            }
        }
        Commands::Report { course, out } => {
            let store = open_store(&global).await?;
            let details = store.fetch_course(&course).await?;
            let items = store.fetch_feedback(&FeedbackScope::Course(course.clone())).await?;
            let roster = store.fetch_roster(&course).await?;
            let report = report::build_report(&details, &items, &roster, as_of, &config);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
