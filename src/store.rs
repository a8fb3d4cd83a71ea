use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{InsightError, Result};
use crate::models::{Course, FeedbackItem, FeedbackRow, RosterEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackScope {
    Lecture(String),
    Course(String),
    Student(String),
}

impl FeedbackScope {
    pub fn matches(&self, item: &FeedbackItem) -> bool {
        match self {
            FeedbackScope::Lecture(id) => &item.lecture_id == id,
            FeedbackScope::Course(id) => &item.course_id == id,
            FeedbackScope::Student(id) => &item.student_id == id,
        }
    }
}

/// Read access to recorded feedback and the records it refers to.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn fetch_feedback(&self, scope: &FeedbackScope) -> Result<Vec<FeedbackItem>>;

    async fn fetch_roster(&self, course_id: &str) -> Result<Vec<RosterEntry>>;

    async fn fetch_course(&self, course_id: &str) -> Result<Course>;
}

/// Feedback loaded from CSV files and kept in memory.
pub struct CsvStore {
    feedback: Vec<FeedbackItem>,
    roster: Vec<RosterEntry>,
}

pub fn read_feedback_csv(path: &Path) -> Result<Vec<FeedbackItem>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut items = Vec::new();

    for (index, result) in reader.deserialize::<FeedbackRow>().enumerate() {
        let row = result?;
        let item = FeedbackItem::try_from(row).map_err(|err| InsightError::Validation {
            field: format!("row {}", index + 1),
            reason: err.to_string(),
        })?;
        items.push(item);
    }

    debug!(path = %path.display(), rows = items.len(), "read feedback CSV");
    Ok(items)
}

pub fn read_roster_csv(path: &Path) -> Result<Vec<RosterEntry>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut roster = Vec::new();
    for result in reader.deserialize::<RosterEntry>() {
        let entry = result?;
        if entry.student_id.is_empty() {
            return Err(InsightError::validation("student_id", "must not be empty"));
        }
        roster.push(entry);
    }
    Ok(roster)
}

/// One entry per student and course, enrolled at their first submission.
pub fn roster_from_feedback(items: &[FeedbackItem]) -> Vec<RosterEntry> {
    let mut roster: Vec<RosterEntry> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for item in items {
        let key = (item.student_id.as_str(), item.course_id.as_str());
        match index.get(&key) {
            Some(&position) => {
                let entry = &mut roster[position];
                if item.timestamp < entry.enrolled_at {
                    entry.enrolled_at = item.timestamp;
                }
            }
            None => {
                index.insert(key, roster.len());
                roster.push(RosterEntry {
                    student_id: item.student_id.clone(),
                    student_name: item.student_id.clone(),
                    course_id: item.course_id.clone(),
                    enrolled_at: item.timestamp,
                });
            }
        }
    }

    roster
}

impl CsvStore {
    pub fn new(feedback: Vec<FeedbackItem>, roster: Vec<RosterEntry>) -> Self {
        Self { feedback, roster }
    }

    pub fn open(feedback_path: &Path, roster_path: Option<&Path>) -> Result<Self> {
        let feedback = read_feedback_csv(feedback_path)?;
        let roster = match roster_path {
            Some(path) => read_roster_csv(path)?,
            None => roster_from_feedback(&feedback),
        };
        info!(
            feedback = feedback.len(),
            roster = roster.len(),
            "loaded CSV feedback store"
        );
        Ok(Self::new(feedback, roster))
    }
}

#[async_trait]
impl FeedbackRepository for CsvStore {
    async fn fetch_feedback(&self, scope: &FeedbackScope) -> Result<Vec<FeedbackItem>> {
        Ok(self
            .feedback
            .iter()
            .filter(|item| scope.matches(item))
            .cloned()
            .collect())
    }

    async fn fetch_roster(&self, course_id: &str) -> Result<Vec<RosterEntry>> {
        Ok(self
            .roster
            .iter()
            .filter(|entry| entry.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn fetch_course(&self, course_id: &str) -> Result<Course> {
        let known = self.feedback.iter().any(|item| item.course_id == course_id)
            || self.roster.iter().any(|entry| entry.course_id == course_id);
        if !known {
            return Err(InsightError::CourseNotFound(course_id.to_string()));
        }
        Ok(Course {
            course_id: course_id.to_string(),
            title: course_id.to_string(),
            professor: String::new(),
        })
    }
}
