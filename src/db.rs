use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{InsightError, Result};
use crate::models::{Course, FeedbackItem, FeedbackRow, RosterEntry};
use crate::store::{FeedbackRepository, FeedbackScope};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("schema migrations applied");
    Ok(())
}

fn feedback_from_row(row: &PgRow) -> Result<FeedbackItem> {
    let topics: Vec<String> = row.try_get("topics")?;
    let raw = FeedbackRow {
        student_id: row.try_get("student_id")?,
        lecture_id: row.try_get("lecture_id")?,
        course_id: row.try_get("course_id")?,
        understanding_level: row.try_get("understanding_level")?,
        reason: row.try_get("reason")?,
        timestamp: row.try_get("submitted_at")?,
        is_anonymous: row.try_get("is_anonymous")?,
        topics: Some(topics.join(";")),
        source_key: None,
    };
    FeedbackItem::try_from(raw)
}

#[async_trait]
impl FeedbackRepository for PgStore {
    async fn fetch_feedback(&self, scope: &FeedbackScope) -> Result<Vec<FeedbackItem>> {
        let (column, value) = match scope {
            FeedbackScope::Lecture(id) => ("lecture_id", id),
            FeedbackScope::Course(id) => ("course_id", id),
            FeedbackScope::Student(id) => ("student_id", id),
        };
        let query = format!(
            "SELECT student_id, lecture_id, course_id, understanding_level, reason, \
             submitted_at, is_anonymous, topics \
             FROM lis.feedback \
             WHERE {column} = $1 \
             ORDER BY submitted_at, id"
        );

        let rows = sqlx::query(&query).bind(value).fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(feedback_from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!(?scope, rows = items.len(), "fetched feedback");
        Ok(items)
    }

    async fn fetch_roster(&self, course_id: &str) -> Result<Vec<RosterEntry>> {
        let rows = sqlx::query(
            "SELECT student_id, student_name, course_id, enrolled_at \
             FROM lis.enrollments \
             WHERE course_id = $1 \
             ORDER BY student_name, student_id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let mut roster = Vec::with_capacity(rows.len());
        for row in rows {
            roster.push(RosterEntry {
                student_id: row.try_get("student_id")?,
                student_name: row.try_get("student_name")?,
                course_id: row.try_get("course_id")?,
                enrolled_at: row.try_get("enrolled_at")?,
            });
        }
        Ok(roster)
    }

    async fn fetch_course(&self, course_id: &str) -> Result<Course> {
        let row = sqlx::query("SELECT id, title, professor FROM lis.courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| InsightError::CourseNotFound(course_id.to_string()))?;

        Ok(Course {
            course_id: row.try_get("id")?,
            title: row.try_get("title")?,
            professor: row.try_get("professor")?,
        })
    }
}

async fn upsert_course(pool: &PgPool, id: &str, title: &str, professor: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lis.courses (id, title, professor)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(professor)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_enrollment(
    pool: &PgPool,
    student_id: &str,
    student_name: &str,
    course_id: &str,
    enrolled_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lis.enrollments (student_id, student_name, course_id, enrolled_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (student_id, course_id) DO UPDATE
        SET enrolled_at = LEAST(lis.enrollments.enrolled_at, EXCLUDED.enrolled_at)
        "#,
    )
    .bind(student_id)
    .bind(student_name)
    .bind(course_id)
    .bind(enrolled_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts one feedback item; returns false when `source_key` was already imported.
async fn insert_feedback(pool: &PgPool, item: &FeedbackItem, source_key: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO lis.feedback
        (id, student_id, lecture_id, course_id, understanding_level, reason,
         submitted_at, is_anonymous, topics, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&item.student_id)
    .bind(&item.lecture_id)
    .bind(&item.course_id)
    .bind(item.understanding_level.as_str())
    .bind(item.reason.map(|reason| reason.as_str()))
    .bind(item.timestamp)
    .bind(item.is_anonymous)
    .bind(&item.topics)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let term_start = now - Duration::days(42);

    upsert_course(pool, "cs101", "Intro to Programming", "Dr. Amara Okafor").await?;
    upsert_course(pool, "math200", "Linear Algebra", "Prof. Jonas Weber").await?;

    let students = [
        ("stu-001", "Avery Lee", "cs101"),
        ("stu-002", "Jules Moreno", "cs101"),
        ("stu-003", "Kiara Patel", "cs101"),
        ("stu-004", "Sam Okonkwo", "cs101"),
        ("stu-002", "Jules Moreno", "math200"),
        ("stu-005", "Noor Haddad", "math200"),
    ];
    for (student_id, name, course_id) in students {
        upsert_enrollment(pool, student_id, name, course_id, term_start).await?;
    }

    let feedback = [
        ("seed-001", "stu-001", "cs101-l05", "cs101", "fully", None, 2, "loops"),
        ("seed-002", "stu-002", "cs101-l05", "cs101", "confused", Some("too_fast"), 2, "recursion;loops"),
        ("seed-003", "stu-003", "cs101-l04", "cs101", "partial", Some("need_examples"), 9, "recursion"),
        ("seed-004", "stu-001", "cs101-l04", "cs101", "confused", Some("concept_unclear"), 9, "recursion"),
        ("seed-005", "stu-003", "cs101-l03", "cs101", "fully", None, 16, "variables"),
        ("seed-006", "stu-002", "math200-l02", "math200", "partial", Some("missing_prerequisites"), 20, "eigenvalues"),
        ("seed-007", "stu-005", "math200-l03", "math200", "fully", None, 1, "eigenvalues"),
    ];

    let mut inserted = 0usize;
    for (source_key, student_id, lecture_id, course_id, level, reason, days_ago, topics) in feedback {
        let row = FeedbackRow {
            student_id: student_id.to_string(),
            lecture_id: lecture_id.to_string(),
            course_id: course_id.to_string(),
            understanding_level: level.to_string(),
            reason: reason.map(str::to_string),
            timestamp: now - Duration::days(days_ago),
            is_anonymous: false,
            topics: Some(topics.to_string()),
            source_key: None,
        };
        let item = FeedbackItem::try_from(row).context("invalid seed feedback")?;
        if insert_feedback(pool, &item, source_key).await? {
            inserted += 1;
        }
    }

    info!(inserted, "seed data written");
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<FeedbackRow>().enumerate() {
        let row = result?;
        let source_key = row
            .source_key
            .clone()
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let item = FeedbackItem::try_from(row)
            .with_context(|| format!("row {} of {} is invalid", index + 1, csv_path.display()))?;

        upsert_course(pool, &item.course_id, &item.course_id, "").await?;
        upsert_enrollment(pool, &item.student_id, &item.student_id, &item.course_id, item.timestamp)
            .await?;

        if insert_feedback(pool, &item, &source_key).await? {
            inserted += 1;
        } else {
            warn!(%source_key, "skipping feedback already imported");
        }
    }

    Ok(inserted)
}
