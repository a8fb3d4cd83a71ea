use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InsightError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderstandingLevel {
    Fully,
    Partial,
    Confused,
}

impl UnderstandingLevel {
    pub const ALL: [UnderstandingLevel; 3] = [
        UnderstandingLevel::Fully,
        UnderstandingLevel::Partial,
        UnderstandingLevel::Confused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnderstandingLevel::Fully => "fully",
            UnderstandingLevel::Partial => "partial",
            UnderstandingLevel::Confused => "confused",
        }
    }

    /// Higher means less understood.
    pub fn severity(&self) -> u8 {
        match self {
            UnderstandingLevel::Fully => 0,
            UnderstandingLevel::Partial => 1,
            UnderstandingLevel::Confused => 2,
        }
    }
}

impl fmt::Display for UnderstandingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnderstandingLevel {
    type Err = InsightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fully" | "full" => Ok(UnderstandingLevel::Fully),
            "partial" | "partially" => Ok(UnderstandingLevel::Partial),
            "confused" | "not_understood" | "unclear" => Ok(UnderstandingLevel::Confused),
            _ => Err(InsightError::UnknownLevel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackReason {
    TooFast,
    NeedExamples,
    ConceptUnclear,
    MissingPrerequisites,
    AudioVisual,
    Other,
}

impl FeedbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackReason::TooFast => "too_fast",
            FeedbackReason::NeedExamples => "need_examples",
            FeedbackReason::ConceptUnclear => "concept_unclear",
            FeedbackReason::MissingPrerequisites => "missing_prerequisites",
            FeedbackReason::AudioVisual => "audio_visual",
            FeedbackReason::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedbackReason::TooFast => "pace too fast",
            FeedbackReason::NeedExamples => "needs more examples",
            FeedbackReason::ConceptUnclear => "concept unclear",
            FeedbackReason::MissingPrerequisites => "missing prerequisites",
            FeedbackReason::AudioVisual => "audio/visual issues",
            FeedbackReason::Other => "other",
        }
    }
}

impl fmt::Display for FeedbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackReason {
    type Err = InsightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "too_fast" => Ok(FeedbackReason::TooFast),
            "need_examples" => Ok(FeedbackReason::NeedExamples),
            "concept_unclear" => Ok(FeedbackReason::ConceptUnclear),
            "missing_prerequisites" => Ok(FeedbackReason::MissingPrerequisites),
            "audio_visual" => Ok(FeedbackReason::AudioVisual),
            "other" => Ok(FeedbackReason::Other),
            _ => Err(InsightError::UnknownReason(value.to_string())),
        }
    }
}

/// A single student's self-reported understanding of one lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub student_id: String,
    pub lecture_id: String,
    pub course_id: String,
    pub understanding_level: UnderstandingLevel,
    pub reason: Option<FeedbackReason>,
    pub timestamp: DateTime<Utc>,
    pub is_anonymous: bool,
    pub topics: Vec<String>,
}

/// Unvalidated feedback as it arrives from a CSV file or a database row.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRow {
    pub student_id: String,
    pub lecture_id: String,
    pub course_id: String,
    pub understanding_level: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub topics: Option<String>,
    #[serde(default)]
    pub source_key: Option<String>,
}

fn required(field: &str, value: String) -> Result<String, InsightError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InsightError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub fn split_topics(raw: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for topic in raw.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        if !topics.iter().any(|seen| seen == topic) {
            topics.push(topic.to_string());
        }
    }
    topics
}

impl TryFrom<FeedbackRow> for FeedbackItem {
    type Error = InsightError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        let reason = match row.reason.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(value.parse()?),
        };

        Ok(FeedbackItem {
            student_id: required("student_id", row.student_id)?,
            lecture_id: required("lecture_id", row.lecture_id)?,
            course_id: required("course_id", row.course_id)?,
            understanding_level: row.understanding_level.parse()?,
            reason,
            timestamp: row.timestamp,
            is_anonymous: row.is_anonymous,
            topics: row.topics.as_deref().map(split_topics).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    pub professor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedbackDistribution {
    pub total: usize,
    pub fully: usize,
    pub partial: usize,
    pub confused: usize,
    pub fully_pct: f64,
    pub partial_pct: f64,
    pub confused_pct: f64,
}

/// Whole-number percentages as shown on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnderstandingPct {
    pub full_pct: u32,
    pub partial_pct: u32,
    pub unclear_pct: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: FeedbackReason,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LectureSummary {
    pub lecture_id: String,
    pub course_id: Option<String>,
    pub total_responses: usize,
    pub anonymous_responses: usize,
    pub distribution: FeedbackDistribution,
    pub understanding: UnderstandingPct,
    pub top_reasons: Vec<ReasonCount>,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseInsights {
    pub course_id: String,
    pub total_responses: usize,
    pub participating_students: usize,
    pub anonymous_responses: usize,
    pub distribution: FeedbackDistribution,
    pub understanding: UnderstandingPct,
    pub risk: RiskLevel,
    pub top_reasons: Vec<ReasonCount>,
    pub lectures: Vec<LectureSummary>,
    pub lectures_at_risk: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicTrend {
    Improving,
    Declining,
    Stable,
}

impl fmt::Display for TopicTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TopicTrend::Improving => "improving",
            TopicTrend::Declining => "declining",
            TopicTrend::Stable => "stable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicInsight {
    pub topic: String,
    pub responses: usize,
    pub clarity_pct: f64,
    pub trend: TopicTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SilentLevel {
    Watch,
    Warning,
    Critical,
}

impl fmt::Display for SilentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SilentLevel::Watch => "watch",
            SilentLevel::Warning => "warning",
            SilentLevel::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceReason {
    NeverSubmitted,
    NoRecentFeedback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilentStudentFlag {
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub silent_level: SilentLevel,
    pub reason: SilenceReason,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub days_silent: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionCandidate {
    pub topic: String,
    pub confusion_score: f64,
    pub priority: Priority,
    pub mention_count: usize,
    pub confused_count: usize,
    pub affected_student_count: usize,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionPlan {
    pub total_topics: usize,
    pub candidates: Vec<RevisionCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSuggestion {
    pub duration_minutes: u32,
    pub time_slot: String,
    pub format: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyTip {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyPlan {
    pub student_id: String,
    pub dominant_level: Option<UnderstandingLevel>,
    pub tip: StudyTip,
    pub focus_topics: Vec<String>,
    pub actions: Vec<String>,
}

/// Per-course figures a recommendation is chosen from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSnapshot {
    pub course: Course,
    pub clarity_pct: f64,
    pub risk: RiskLevel,
    pub silent_students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRecommendation {
    pub course_id: String,
    pub title: String,
    pub risk: RiskLevel,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(level: &str, reason: Option<&str>) -> FeedbackRow {
        FeedbackRow {
            student_id: "stu-1".to_string(),
            lecture_id: "lec-1".to_string(),
            course_id: "cs101".to_string(),
            understanding_level: level.to_string(),
            reason: reason.map(str::to_string),
            timestamp: Utc::now(),
            is_anonymous: false,
            topics: Some("recursion; loops;recursion".to_string()),
            source_key: None,
        }
    }

    #[test]
    fn level_aliases_parse() {
        assert_eq!("Partially".parse::<UnderstandingLevel>().unwrap(), UnderstandingLevel::Partial);
        assert_eq!(
            "not_understood".parse::<UnderstandingLevel>().unwrap(),
            UnderstandingLevel::Confused
        );
        assert!("maybe".parse::<UnderstandingLevel>().is_err());
    }

    #[test]
    fn row_converts_with_deduplicated_topics() {
        let item = FeedbackItem::try_from(row("fully", Some("too_fast"))).unwrap();
        assert_eq!(item.reason, Some(FeedbackReason::TooFast));
        assert_eq!(item.topics, vec!["recursion".to_string(), "loops".to_string()]);
    }

    #[test]
    fn blank_reason_is_absent() {
        let item = FeedbackItem::try_from(row("confused", Some("  "))).unwrap();
        assert_eq!(item.reason, None);
    }

    #[test]
    fn row_with_empty_student_is_rejected() {
        let mut bad = row("fully", None);
        bad.student_id = " ".to_string();
        let err = FeedbackItem::try_from(bad).unwrap_err();
        assert!(matches!(err, InsightError::Validation { ref field, .. } if field == "student_id"));
    }

    #[test]
    fn row_with_unknown_reason_is_rejected() {
        let err = FeedbackItem::try_from(row("fully", Some("bored"))).unwrap_err();
        assert!(matches!(err, InsightError::UnknownReason(_)));
    }
}
