use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::config::InsightsConfig;
use crate::feedback::{self, reason_label};
use crate::models::{Course, CourseSnapshot, FeedbackItem, RosterEntry};
use crate::revision;
use crate::silent;
use crate::tips;

pub fn snapshot_course(
    course: &Course,
    items: &[FeedbackItem],
    roster: &[RosterEntry],
    as_of: DateTime<Utc>,
    config: &InsightsConfig,
) -> CourseSnapshot {
    let insights = feedback::compute_course_insights(&course.course_id, items);
    let flags = silent::detect_silent_students(roster, items, as_of, &config.silence);
    CourseSnapshot {
        course: course.clone(),
        clarity_pct: insights.distribution.fully_pct,
        risk: insights.risk,
        silent_students: flags.len(),
    }
}

pub fn build_report(
    course: &Course,
    items: &[FeedbackItem],
    roster: &[RosterEntry],
    as_of: DateTime<Utc>,
    config: &InsightsConfig,
) -> String {
    let insights = feedback::compute_course_insights(&course.course_id, items);
    let topics = feedback::analyze_topics(items, as_of, &config.topics);
    let flags = silent::detect_silent_students(roster, items, as_of, &config.silence);
    let plan = revision::build_revision_plan(items, &config.revision);
    let session = revision::generate_session_suggestions(&plan);
    let snapshot = snapshot_course(course, items, roster, as_of, config);
    let recommendations = tips::generate_course_recommendations(std::slice::from_ref(&snapshot), 1);

    let mut output = String::new();

    let _ = writeln!(output, "# Learning Insights Report: {}", course.title);
    let _ = writeln!(
        output,
        "Course {} as of {} ({} responses from {} students)",
        course.course_id,
        as_of.format("%Y-%m-%d"),
        insights.total_responses,
        insights.participating_students
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Health");

    if insights.total_responses == 0 {
        let _ = writeln!(output, "No feedback recorded for this course.");
    } else {
        let understanding = insights.understanding;
        let _ = writeln!(
            output,
            "- Fully understood {}%, partially {}%, unclear {}%",
            understanding.full_pct, understanding.partial_pct, understanding.unclear_pct
        );
        let _ = writeln!(output, "- Risk level: {}", insights.risk);
        for reason in insights.top_reasons.iter() {
            let _ = writeln!(
                output,
                "- Cited: {} ({} responses)",
                reason_label(Some(reason.reason)),
                reason.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lectures");

    if insights.lectures.is_empty() {
        let _ = writeln!(output, "No lectures with feedback.");
    } else {
        for lecture in insights.lectures.iter() {
            let _ = writeln!(
                output,
                "- {}: {} responses, {}% clear, {} risk",
                lecture.lecture_id,
                lecture.total_responses,
                lecture.understanding.full_pct,
                lecture.risk
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Topics");

    if topics.is_empty() {
        let _ = writeln!(output, "No topic tags in this feedback.");
    } else {
        for topic in topics.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.0}% clear across {} responses ({})",
                topic.topic, topic.clarity_pct, topic.responses, topic.trend
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Silent Students");

    if flags.is_empty() {
        let _ = writeln!(output, "Every enrolled student has given feedback recently.");
    } else {
        for flag in flags.iter() {
            let _ = writeln!(
                output,
                "- {} ({}): {} days silent, {}",
                flag.student_name, flag.student_id, flag.days_silent, flag.silent_level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Revision Plan");

    if plan.candidates.is_empty() {
        let _ = writeln!(output, "No topics need revision.");
    } else {
        for (rank, candidate) in plan.candidates.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} (score {:.1}, {} priority): {}",
                rank + 1,
                candidate.topic,
                candidate.confusion_score,
                candidate.priority,
                candidate.reasoning
            );
        }
    }

    if let Some(session) = session {
        let _ = writeln!(
            output,
            "\nSuggested session: {} minutes, {}. {}.",
            session.duration_minutes, session.time_slot, session.format
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendation");

    match recommendations.first() {
        Some(recommendation) => {
            let _ = writeln!(output, "{}", recommendation.message);
        }
        None => {
            let _ = writeln!(output, "No action needed.");
        }
    }

    output
}
