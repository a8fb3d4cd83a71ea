use chrono::{DateTime, Duration, Utc};

use crate::config::{SilenceThresholds, MAX_WINDOW_DAYS};
use crate::models::{FeedbackItem, RosterEntry, SilenceReason, SilentLevel, SilentStudentFlag};

fn days(value: i64) -> Duration {
    Duration::days(value.clamp(0, MAX_WINDOW_DAYS))
}

/// Tier for the exact time since the last activity, not the whole-day count.
pub fn silent_level(elapsed: Duration, thresholds: &SilenceThresholds) -> SilentLevel {
    if elapsed > days(thresholds.critical_after_days) {
        SilentLevel::Critical
    } else if elapsed > days(thresholds.warning_after_days) {
        SilentLevel::Warning
    } else {
        SilentLevel::Watch
    }
}

/// Flags a student with no feedback in the trailing window.
///
/// Students who never submitted anything are measured from their enrollment
/// date, so a fresh enrollment is not flagged until the window has passed.
pub fn detect_silent_student(
    entry: &RosterEntry,
    history: &[FeedbackItem],
    as_of: DateTime<Utc>,
    thresholds: &SilenceThresholds,
) -> Option<SilentStudentFlag> {
    let last_activity_at = history
        .iter()
        .filter(|item| item.student_id == entry.student_id && item.course_id == entry.course_id)
        .map(|item| item.timestamp)
        .max();

    let since = last_activity_at.unwrap_or(entry.enrolled_at);
    let window_start = as_of - days(thresholds.window_days.max(1));
    if since >= window_start {
        return None;
    }

    let elapsed = as_of - since;
    Some(SilentStudentFlag {
        student_id: entry.student_id.clone(),
        student_name: entry.student_name.clone(),
        course_id: entry.course_id.clone(),
        silent_level: silent_level(elapsed, thresholds),
        reason: if last_activity_at.is_some() {
            SilenceReason::NoRecentFeedback
        } else {
            SilenceReason::NeverSubmitted
        },
        last_activity_at,
        days_silent: elapsed.num_days(),
    })
}

pub fn detect_silent_students(
    roster: &[RosterEntry],
    history: &[FeedbackItem],
    as_of: DateTime<Utc>,
    thresholds: &SilenceThresholds,
) -> Vec<SilentStudentFlag> {
    roster
        .iter()
        .filter_map(|entry| detect_silent_student(entry, history, as_of, thresholds))
        .collect()
}

fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("there")
}

pub fn generate_nudge_template(flag: &SilentStudentFlag, course_title: &str) -> String {
    let name = first_name(&flag.student_name);
    let opener = match flag.reason {
        SilenceReason::NeverSubmitted => format!(
            "Hi {name}, you enrolled in {course_title} {} days ago and we haven't heard from you yet.",
            flag.days_silent
        ),
        SilenceReason::NoRecentFeedback => format!(
            "Hi {name}, it's been {} days since your last lecture feedback in {course_title}.",
            flag.days_silent
        ),
    };
    let ask = match flag.silent_level {
        SilentLevel::Watch => {
            "A quick check-in after the next lecture helps us pitch the pace right."
        }
        SilentLevel::Warning => {
            "Could you take 30 seconds to tell us how the recent lectures landed? Anonymous feedback is fine."
        }
        SilentLevel::Critical => {
            "We'd like to make sure you're not stuck. Reply to this message or drop by office hours this week, and share feedback on the last lecture when you can."
        }
    };
    format!("{opener} {ask}")
}
