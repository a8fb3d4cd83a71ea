use crate::models::{
    CourseRecommendation, CourseSnapshot, FeedbackItem, RiskLevel, StudyPlan, StudyTip,
    UnderstandingLevel,
};

const MAX_FOCUS_TOPICS: usize = 3;

/// Most frequent level; ties go to the weaker level.
pub fn dominant_level(items: &[FeedbackItem]) -> Option<UnderstandingLevel> {
    UnderstandingLevel::ALL
        .into_iter()
        .map(|level| {
            let count = items.iter().filter(|item| item.understanding_level == level).count();
            (level, count)
        })
        .filter(|(_, count)| *count > 0)
        .max_by(|(a_level, a_count), (b_level, b_count)| {
            a_count.cmp(b_count).then(a_level.severity().cmp(&b_level.severity()))
        })
        .map(|(level, _)| level)
}

pub fn tip_for(level: Option<UnderstandingLevel>) -> StudyTip {
    let (title, message) = match level {
        Some(UnderstandingLevel::Fully) => (
            "Keep the momentum",
            "You're following the material well. Try explaining this week's key idea to a classmate, or attempt one stretch problem beyond the assigned set.",
        ),
        Some(UnderstandingLevel::Partial) => (
            "Close the gaps",
            "Re-read your notes within 24 hours of each lecture and write down the one step you couldn't reproduce. Bring that question to office hours.",
        ),
        Some(UnderstandingLevel::Confused) => (
            "Rebuild the foundations",
            "Start from the worked examples rather than the theory, and go through them slowly. Book a short session with a tutor or TA this week.",
        ),
        None => (
            "Tell us how it's going",
            "Share quick feedback after your next lecture so we can suggest what to focus on.",
        ),
    };
    StudyTip {
        title: title.to_string(),
        message: message.to_string(),
    }
}

fn recent_for<'a>(history: &'a [FeedbackItem], student_id: &str, recent_count: usize) -> Vec<&'a FeedbackItem> {
    let mut items: Vec<&FeedbackItem> = history
        .iter()
        .filter(|item| item.student_id == student_id)
        .collect();
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items.truncate(recent_count);
    items
}

pub fn get_personalized_tip(history: &[FeedbackItem], student_id: &str, recent_count: usize) -> StudyTip {
    let recent: Vec<FeedbackItem> = recent_for(history, student_id, recent_count)
        .into_iter()
        .cloned()
        .collect();
    tip_for(dominant_level(&recent))
}

fn actions_for(level: Option<UnderstandingLevel>, focus_topics: &[String]) -> Vec<String> {
    let mut actions = Vec::new();
    for topic in focus_topics {
        actions.push(format!("Review your notes and one worked example on {topic}"));
    }
    match level {
        Some(UnderstandingLevel::Confused) => {
            actions.push("Attend the next revision session or office hours".to_string());
            actions.push("Ask one question in the course forum".to_string());
        }
        Some(UnderstandingLevel::Partial) => {
            actions.push("Summarise each lecture in three sentences".to_string());
        }
        Some(UnderstandingLevel::Fully) => {
            actions.push("Try an extension problem".to_string());
        }
        None => {
            actions.push("Submit feedback after your next lecture".to_string());
        }
    }
    actions
}

pub fn generate_student_study_plan(
    history: &[FeedbackItem],
    student_id: &str,
    recent_count: usize,
) -> StudyPlan {
    let recent = recent_for(history, student_id, recent_count);

    let mut focus_topics: Vec<String> = Vec::new();
    for item in recent
        .iter()
        .filter(|item| item.understanding_level != UnderstandingLevel::Fully)
    {
        for topic in &item.topics {
            if focus_topics.len() < MAX_FOCUS_TOPICS && !focus_topics.contains(topic) {
                focus_topics.push(topic.clone());
            }
        }
    }

    let recent: Vec<FeedbackItem> = recent.into_iter().cloned().collect();
    let level = dominant_level(&recent);

    StudyPlan {
        student_id: student_id.to_string(),
        dominant_level: level,
        tip: tip_for(level),
        actions: actions_for(level, &focus_topics),
        focus_topics,
    }
}

fn recommendation_message(snapshot: &CourseSnapshot) -> String {
    let mut message = match snapshot.risk {
        RiskLevel::High => format!(
            "Only {:.0}% of responses report full understanding. Schedule a revision session.",
            snapshot.clarity_pct
        ),
        RiskLevel::Medium => format!(
            "Clarity is {:.0}%. Review the most cited difficulties before the next lecture.",
            snapshot.clarity_pct
        ),
        RiskLevel::Low => format!("Clarity is healthy at {:.0}%.", snapshot.clarity_pct),
    };
    if snapshot.silent_students > 0 {
        message.push_str(&format!(
            " {} silent student{} to follow up.",
            snapshot.silent_students,
            if snapshot.silent_students == 1 { "" } else { "s" }
        ));
    }
    message
}

/// Courses that need attention, highest risk first and then lowest clarity.
pub fn generate_course_recommendations(
    snapshots: &[CourseSnapshot],
    limit: usize,
) -> Vec<CourseRecommendation> {
    let mut flagged: Vec<&CourseSnapshot> = snapshots
        .iter()
        .filter(|snapshot| snapshot.risk != RiskLevel::Low || snapshot.silent_students > 0)
        .collect();
    flagged.sort_by(|a, b| {
        b.risk.cmp(&a.risk).then(
            a.clarity_pct
                .partial_cmp(&b.clarity_pct)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    flagged
        .into_iter()
        .take(limit)
        .map(|snapshot| CourseRecommendation {
            course_id: snapshot.course.course_id.clone(),
            title: snapshot.course.title.clone(),
            risk: snapshot.risk,
            message: recommendation_message(snapshot),
        })
        .collect()
}
