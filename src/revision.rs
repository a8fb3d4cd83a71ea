use std::collections::{HashMap, HashSet};

use crate::config::RevisionSettings;
use crate::feedback::percentage;
use crate::models::{
    FeedbackItem, Priority, RevisionCandidate, RevisionPlan, SessionSuggestion, UnderstandingLevel,
};

pub const HIGH_PRIORITY_SCORE: f64 = 60.0;
pub const MEDIUM_PRIORITY_SCORE: f64 = 35.0;

const MIN_SESSION_MINUTES: u32 = 30;
const MAX_SESSION_MINUTES: u32 = 90;
const LARGE_GROUP_STUDENTS: usize = 15;

#[derive(Default)]
struct TopicCounts<'a> {
    mentions: usize,
    confused: usize,
    confused_students: HashSet<&'a str>,
}

pub fn priority_for(score: f64) -> Priority {
    if score >= HIGH_PRIORITY_SCORE {
        Priority::High
    } else if score >= MEDIUM_PRIORITY_SCORE {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn reasoning(topic: &str, counts: &TopicCounts<'_>, confused_pct: f64) -> String {
    let students = counts.confused_students.len();
    format!(
        "{} of {} responses on '{}' reported confusion ({:.0}%), affecting {} {}.",
        counts.confused,
        counts.mentions,
        topic,
        confused_pct,
        students,
        if students == 1 { "student" } else { "students" }
    )
}

/// Scores every topic mentioned in feedback, in the order topics were first seen.
pub fn identify_revision_candidates(
    items: &[FeedbackItem],
    settings: &RevisionSettings,
) -> Vec<RevisionCandidate> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, TopicCounts<'_>> = HashMap::new();

    for item in items {
        let confused = item.understanding_level == UnderstandingLevel::Confused;
        for topic in &item.topics {
            let entry = counts.entry(topic.as_str()).or_insert_with(|| {
                order.push(topic.as_str());
                TopicCounts::default()
            });
            entry.mentions += 1;
            if confused {
                entry.confused += 1;
                entry.confused_students.insert(item.student_id.as_str());
            }
        }
    }

    let max_mentions = counts.values().map(|c| c.mentions).max().unwrap_or(0);

    order
        .into_iter()
        .filter_map(|topic| {
            let topic_counts = counts.get(topic)?;
            let confused_pct = percentage(topic_counts.confused, topic_counts.mentions);
            let volume_share = percentage(topic_counts.mentions, max_mentions);
            let raw = settings.confusion_weight * confused_pct + settings.volume_weight * volume_share;
            let confusion_score = (raw * 10.0).round() / 10.0;

            Some(RevisionCandidate {
                topic: topic.to_string(),
                confusion_score,
                priority: priority_for(confusion_score),
                mention_count: topic_counts.mentions,
                confused_count: topic_counts.confused,
                affected_student_count: topic_counts.confused_students.len(),
                reasoning: reasoning(topic, topic_counts, confused_pct),
            })
        })
        .collect()
}

/// Highest score first; equal scores keep discovery order.
pub fn rank_candidates(mut candidates: Vec<RevisionCandidate>, top_n: usize) -> Vec<RevisionCandidate> {
    candidates.sort_by(|a, b| {
        b.confusion_score
            .partial_cmp(&a.confusion_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_n);
    candidates
}

pub fn build_revision_plan(items: &[FeedbackItem], settings: &RevisionSettings) -> RevisionPlan {
    let candidates = identify_revision_candidates(items, settings);
    let total_topics = candidates.len();
    RevisionPlan {
        total_topics,
        candidates: rank_candidates(candidates, settings.top_n),
    }
}

fn minutes_for(priority: Priority) -> u32 {
    match priority {
        Priority::High => 15,
        Priority::Medium => 10,
        Priority::Low => 5,
    }
}

fn time_slot_for(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "Within 48 hours, directly after the next lecture",
        Priority::Medium => "Later this week, during the regular office-hours slot",
        Priority::Low => "Before the next assessment, as an optional review",
    }
}

/// Suggests one revision session from fixed rules of thumb. `None` when there is nothing to revise.
pub fn generate_session_suggestions(plan: &RevisionPlan) -> Option<SessionSuggestion> {
    let top_priority = plan.candidates.iter().map(|c| c.priority).max()?;

    let raw: u32 = plan.candidates.iter().map(|c| minutes_for(c.priority)).sum();
    let rounded = raw.div_ceil(5) * 5;
    let duration_minutes = rounded.clamp(MIN_SESSION_MINUTES, MAX_SESSION_MINUTES);

    let affected: usize = plan
        .candidates
        .iter()
        .map(|c| c.affected_student_count)
        .max()
        .unwrap_or(0);
    let format = if affected >= LARGE_GROUP_STUDENTS {
        "Whole-class recap with worked examples"
    } else {
        "Small-group clinic with guided practice"
    };

    Some(SessionSuggestion {
        duration_minutes,
        time_slot: time_slot_for(top_priority).to_string(),
        format: format.to_string(),
        topics: plan.candidates.iter().map(|c| c.topic.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::fixtures::topical;
    use chrono::Utc;

    fn candidate(topic: &str, score: f64, affected: usize) -> RevisionCandidate {
        RevisionCandidate {
            topic: topic.to_string(),
            confusion_score: score,
            priority: priority_for(score),
            mention_count: 1,
            confused_count: 1,
            affected_student_count: affected,
            reasoning: String::new(),
        }
    }

    #[test]
    fn ranks_higher_score_first() {
        let ranked = rank_candidates(vec![candidate("loops", 40.0, 1), candidate("recursion", 90.0, 1)], 5);
        let topics: Vec<&str> = ranked.iter().map(|c| c.topic.as_str()).collect();
        assert_eq!(topics, vec!["recursion", "loops"]);
    }

    #[test]
    fn equal_scores_keep_discovery_order() {
        let ranked = rank_candidates(
            vec![candidate("a", 50.0, 1), candidate("b", 70.0, 1), candidate("c", 50.0, 1)],
            3,
        );
        let topics: Vec<&str> = ranked.iter().map(|c| c.topic.as_str()).collect();
        assert_eq!(topics, vec!["b", "a", "c"]);
    }

    #[test]
    fn scores_weight_confusion_and_volume() {
        let now = Utc::now();
        let items = vec![
            topical("a", UnderstandingLevel::Confused, &["pointers", "loops"], now),
            topical("b", UnderstandingLevel::Confused, &["pointers"], now),
            topical("a", UnderstandingLevel::Confused, &["pointers"], now),
            topical("c", UnderstandingLevel::Fully, &["pointers", "loops"], now),
        ];
        let candidates = identify_revision_candidates(&items, &RevisionSettings::default());
        assert_eq!(candidates[0].topic, "pointers");
        // 0.7 * 75 + 0.3 * 100
        assert!((candidates[0].confusion_score - 82.5).abs() < 1e-9);
        assert_eq!(candidates[0].affected_student_count, 2);
        assert_eq!(candidates[0].priority, Priority::High);
        assert_eq!(
            candidates[0].reasoning,
            "3 of 4 responses on 'pointers' reported confusion (75%), affecting 2 students."
        );
        // 0.7 * 50 + 0.3 * 50
        assert_eq!(candidates[1].topic, "loops");
        assert!((candidates[1].confusion_score - 50.0).abs() < 1e-9);
        assert_eq!(candidates[1].priority, Priority::Medium);
    }

    #[test]
    fn plan_truncates_to_top_n() {
        let now = Utc::now();
        let items = vec![
            topical("a", UnderstandingLevel::Fully, &["sets"], now),
            topical("b", UnderstandingLevel::Confused, &["graphs"], now),
            topical("c", UnderstandingLevel::Partial, &["trees"], now),
        ];
        let settings = RevisionSettings { top_n: 2, ..RevisionSettings::default() };
        let plan = build_revision_plan(&items, &settings);
        assert_eq!(plan.total_topics, 3);
        assert_eq!(plan.candidates.len(), 2);
        assert_eq!(plan.candidates[0].topic, "graphs");
    }

    #[test]
    fn empty_feedback_has_no_session() {
        let plan = build_revision_plan(&[], &RevisionSettings::default());
        assert!(plan.candidates.is_empty());
        assert!(generate_session_suggestions(&plan).is_none());
    }

    #[test]
    fn session_length_is_clamped() {
        let short = RevisionPlan { total_topics: 1, candidates: vec![candidate("a", 10.0, 1)] };
        let suggestion = generate_session_suggestions(&short).unwrap();
        assert_eq!(suggestion.duration_minutes, 30);
        assert_eq!(suggestion.time_slot, time_slot_for(Priority::Low));

        let long = RevisionPlan {
            total_topics: 8,
            candidates: (0..8).map(|i| candidate(&format!("t{i}"), 95.0, 20)).collect(),
        };
        let suggestion = generate_session_suggestions(&long).unwrap();
        assert_eq!(suggestion.duration_minutes, 90);
        assert_eq!(suggestion.format, "Whole-class recap with worked examples");
    }

    #[test]
    fn mixed_priorities_sum_minutes() {
        let plan = RevisionPlan {
            total_topics: 4,
            candidates: vec![
                candidate("a", 80.0, 3),
                candidate("b", 70.0, 2),
                candidate("c", 40.0, 2),
                candidate("d", 36.0, 1),
            ],
        };
        let suggestion = generate_session_suggestions(&plan).unwrap();
        assert_eq!(suggestion.duration_minutes, 50);
        assert_eq!(suggestion.time_slot, time_slot_for(Priority::High));
        assert_eq!(suggestion.topics, vec!["a", "b", "c", "d"]);
    }
}
