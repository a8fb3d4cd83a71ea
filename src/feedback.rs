use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::config::{TopicTrendSettings, MAX_WINDOW_DAYS};
use crate::models::{
    CourseInsights, FeedbackDistribution, FeedbackItem, FeedbackReason, LectureSummary,
    ReasonCount, RiskLevel, TopicInsight, TopicTrend, UnderstandingLevel, UnderstandingPct,
};

pub const LOW_RISK_CLARITY_PCT: f64 = 80.0;
pub const HIGH_RISK_CLARITY_PCT: f64 = 60.0;
pub const TOP_REASON_COUNT: usize = 3;

pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn whole_pct(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

pub fn compute_feedback_distribution(items: &[FeedbackItem]) -> FeedbackDistribution {
    let mut counts = [0usize; 3];
    for item in items {
        match item.understanding_level {
            UnderstandingLevel::Fully => counts[0] += 1,
            UnderstandingLevel::Partial => counts[1] += 1,
            UnderstandingLevel::Confused => counts[2] += 1,
        }
    }

    let total = items.len();
    FeedbackDistribution {
        total,
        fully: counts[0],
        partial: counts[1],
        confused: counts[2],
        fully_pct: percentage(counts[0], total),
        partial_pct: percentage(counts[1], total),
        confused_pct: percentage(counts[2], total),
    }
}

fn understanding_from_distribution(distribution: &FeedbackDistribution) -> UnderstandingPct {
    UnderstandingPct {
        full_pct: whole_pct(distribution.fully_pct),
        partial_pct: whole_pct(distribution.partial_pct),
        unclear_pct: whole_pct(distribution.confused_pct),
    }
}

pub fn compute_understanding_pct(items: &[FeedbackItem]) -> UnderstandingPct {
    understanding_from_distribution(&compute_feedback_distribution(items))
}

/// Tally of the reasons given, in the order each reason first appears.
pub fn compute_reason_breakdown(items: &[FeedbackItem]) -> Vec<ReasonCount> {
    let mut breakdown: Vec<ReasonCount> = Vec::new();
    for reason in items.iter().filter_map(|item| item.reason) {
        match breakdown.iter_mut().find(|entry| entry.reason == reason) {
            Some(entry) => entry.count += 1,
            None => breakdown.push(ReasonCount { reason, count: 1 }),
        }
    }
    breakdown
}

pub fn get_top_reasons(items: &[FeedbackItem], limit: usize) -> Vec<ReasonCount> {
    let mut breakdown = compute_reason_breakdown(items);
    // sort_by is stable, so equal counts keep first-seen order
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown.truncate(limit);
    breakdown
}

pub fn assess_risk_level(clarity_pct: f64) -> RiskLevel {
    if clarity_pct >= LOW_RISK_CLARITY_PCT {
        RiskLevel::Low
    } else if clarity_pct < HIGH_RISK_CLARITY_PCT {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

pub fn summarize_lecture_feedback(lecture_id: &str, items: &[FeedbackItem]) -> LectureSummary {
    let lecture_items: Vec<FeedbackItem> = items
        .iter()
        .filter(|item| item.lecture_id == lecture_id)
        .cloned()
        .collect();
    let distribution = compute_feedback_distribution(&lecture_items);

    LectureSummary {
        lecture_id: lecture_id.to_string(),
        course_id: lecture_items.first().map(|item| item.course_id.clone()),
        total_responses: lecture_items.len(),
        anonymous_responses: lecture_items.iter().filter(|item| item.is_anonymous).count(),
        distribution,
        understanding: compute_understanding_pct(&lecture_items),
        top_reasons: get_top_reasons(&lecture_items, TOP_REASON_COUNT),
        risk: assess_risk_level(distribution.fully_pct),
    }
}

pub fn compute_course_insights(course_id: &str, items: &[FeedbackItem]) -> CourseInsights {
    let course_items: Vec<FeedbackItem> = items
        .iter()
        .filter(|item| item.course_id == course_id)
        .cloned()
        .collect();

    let mut lecture_ids: Vec<&str> = Vec::new();
    for item in &course_items {
        if !lecture_ids.contains(&item.lecture_id.as_str()) {
            lecture_ids.push(&item.lecture_id);
        }
    }

    let lectures: Vec<LectureSummary> = lecture_ids
        .iter()
        .map(|lecture_id| summarize_lecture_feedback(lecture_id, &course_items))
        .collect();
    let lectures_at_risk = lectures
        .iter()
        .filter(|lecture| lecture.risk == RiskLevel::High)
        .map(|lecture| lecture.lecture_id.clone())
        .collect();

    let students: HashSet<&str> = course_items.iter().map(|item| item.student_id.as_str()).collect();
    let distribution = compute_feedback_distribution(&course_items);

    CourseInsights {
        course_id: course_id.to_string(),
        total_responses: course_items.len(),
        participating_students: students.len(),
        anonymous_responses: course_items.iter().filter(|item| item.is_anonymous).count(),
        distribution,
        understanding: compute_understanding_pct(&course_items),
        risk: assess_risk_level(distribution.fully_pct),
        top_reasons: get_top_reasons(&course_items, TOP_REASON_COUNT),
        lectures,
        lectures_at_risk,
    }
}

#[derive(Default)]
struct TopicTally {
    total: usize,
    fully: usize,
    recent_total: usize,
    recent_fully: usize,
    prior_total: usize,
    prior_fully: usize,
}

fn trend_between(tally: &TopicTally, tolerance_pct: f64) -> TopicTrend {
    if tally.recent_total == 0 || tally.prior_total == 0 {
        return TopicTrend::Stable;
    }
    let recent = percentage(tally.recent_fully, tally.recent_total);
    let prior = percentage(tally.prior_fully, tally.prior_total);
    let delta = recent - prior;
    if delta > tolerance_pct {
        TopicTrend::Improving
    } else if delta < -tolerance_pct {
        TopicTrend::Declining
    } else {
        TopicTrend::Stable
    }
}

/// Clarity per topic with a trend comparing the latest window to the one before it.
pub fn analyze_topics(
    items: &[FeedbackItem],
    as_of: DateTime<Utc>,
    settings: &TopicTrendSettings,
) -> Vec<TopicInsight> {
    let window = Duration::days(settings.window_days.clamp(1, MAX_WINDOW_DAYS));
    let recent_start = as_of - window;
    let prior_start = recent_start - window;

    let mut order: Vec<&str> = Vec::new();
    let mut tallies: HashMap<&str, TopicTally> = HashMap::new();

    for item in items {
        let fully = item.understanding_level == UnderstandingLevel::Fully;
        let in_recent = item.timestamp > recent_start && item.timestamp <= as_of;
        let in_prior = item.timestamp > prior_start && item.timestamp <= recent_start;

        for topic in &item.topics {
            let tally = tallies.entry(topic.as_str()).or_insert_with(|| {
                order.push(topic.as_str());
                TopicTally::default()
            });
            tally.total += 1;
            tally.fully += usize::from(fully);
            if in_recent {
                tally.recent_total += 1;
                tally.recent_fully += usize::from(fully);
            } else if in_prior {
                tally.prior_total += 1;
                tally.prior_fully += usize::from(fully);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|topic| {
            let tally = tallies.get(topic)?;
            Some(TopicInsight {
                topic: topic.to_string(),
                responses: tally.total,
                clarity_pct: percentage(tally.fully, tally.total),
                trend: trend_between(tally, settings.tolerance_pct),
            })
        })
        .collect()
}

pub fn reason_label(reason: Option<FeedbackReason>) -> &'static str {
    reason.map(|reason| reason.label()).unwrap_or("no reason given")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, Utc};

    use crate::models::{FeedbackItem, FeedbackReason, UnderstandingLevel};

    pub fn item(
        student_id: &str,
        lecture_id: &str,
        level: UnderstandingLevel,
        reason: Option<FeedbackReason>,
    ) -> FeedbackItem {
        FeedbackItem {
            student_id: student_id.to_string(),
            lecture_id: lecture_id.to_string(),
            course_id: "cs101".to_string(),
            understanding_level: level,
            reason,
            timestamp: Utc::now(),
            is_anonymous: false,
            topics: Vec::new(),
        }
    }

    pub fn topical(
        student_id: &str,
        level: UnderstandingLevel,
        topics: &[&str],
        at: DateTime<Utc>,
    ) -> FeedbackItem {
        FeedbackItem {
            timestamp: at,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            ..item(student_id, "lec-1", level, None)
        }
    }

    pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }

    pub fn lecture_with(fully: usize, partial: usize, confused: usize) -> Vec<FeedbackItem> {
        let mut items = Vec::new();
        let levels = [
            (UnderstandingLevel::Fully, fully),
            (UnderstandingLevel::Partial, partial),
            (UnderstandingLevel::Confused, confused),
        ];
        for (level, count) in levels {
            for _ in 0..count {
                let student = format!("stu-{}", items.len() + 1);
                items.push(item(&student, "lec-1", level, None));
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn distribution_counts_sum_to_total() {
        let items = lecture_with(4, 7, 2);
        let distribution = compute_feedback_distribution(&items);
        assert_eq!(
            distribution.fully + distribution.partial + distribution.confused,
            items.len()
        );
        assert_eq!(distribution.total, 13);
    }

    #[test]
    fn empty_input_yields_zeros() {
        let distribution = compute_feedback_distribution(&[]);
        assert_eq!(distribution.total, 0);
        assert_eq!(distribution.fully_pct, 0.0);
        assert_eq!(distribution.confused_pct, 0.0);
        assert!(!distribution.partial_pct.is_nan());

        let pct = compute_understanding_pct(&[]);
        assert_eq!(pct, UnderstandingPct { full_pct: 0, partial_pct: 0, unclear_pct: 0 });
        assert!(compute_reason_breakdown(&[]).is_empty());
        assert!(analyze_topics(&[], Utc::now(), &TopicTrendSettings::default()).is_empty());
    }

    #[test]
    fn percentages_round_to_whole_numbers() {
        let pct = compute_understanding_pct(&lecture_with(2, 0, 1));
        assert_eq!(pct.full_pct, 67);
        assert_eq!(pct.unclear_pct, 33);
    }

    #[test]
    fn distribution_counts_reproduce_percentages() {
        let distribution = compute_feedback_distribution(&lecture_with(5, 4, 3));
        let pairs = [
            (distribution.fully, distribution.fully_pct),
            (distribution.partial, distribution.partial_pct),
            (distribution.confused, distribution.confused_pct),
        ];
        for (count, expected) in pairs {
            let recomputed = percentage(count, distribution.total);
            assert!((recomputed - expected).abs() < 0.5);
        }
    }

    #[test]
    fn risk_boundaries() {
        assert_eq!(assess_risk_level(100.0), RiskLevel::Low);
        assert_eq!(assess_risk_level(80.0), RiskLevel::Low);
        assert_eq!(assess_risk_level(79.0), RiskLevel::Medium);
        assert_eq!(assess_risk_level(60.0), RiskLevel::Medium);
        assert_eq!(assess_risk_level(59.0), RiskLevel::High);
        assert_eq!(assess_risk_level(0.0), RiskLevel::High);
    }

    #[test]
    fn ten_item_lecture_scenario() {
        let items = lecture_with(6, 3, 1);
        let summary = summarize_lecture_feedback("lec-1", &items);
        assert_eq!(summary.total_responses, 10);
        assert_eq!(
            summary.understanding,
            UnderstandingPct { full_pct: 60, partial_pct: 30, unclear_pct: 10 }
        );
        assert_eq!(summary.risk, RiskLevel::Medium);
        assert_eq!(summary.course_id.as_deref(), Some("cs101"));
    }

    #[test]
    fn top_reasons_break_ties_by_first_seen() {
        let items = vec![
            item("a", "lec-1", UnderstandingLevel::Partial, Some(FeedbackReason::NeedExamples)),
            item("b", "lec-1", UnderstandingLevel::Confused, Some(FeedbackReason::TooFast)),
            item("c", "lec-1", UnderstandingLevel::Confused, None),
            item("d", "lec-1", UnderstandingLevel::Confused, Some(FeedbackReason::TooFast)),
            item("e", "lec-1", UnderstandingLevel::Partial, Some(FeedbackReason::ConceptUnclear)),
            item("f", "lec-1", UnderstandingLevel::Partial, Some(FeedbackReason::NeedExamples)),
            item("g", "lec-1", UnderstandingLevel::Partial, Some(FeedbackReason::Other)),
        ];

        let breakdown = compute_reason_breakdown(&items);
        assert_eq!(breakdown.iter().map(|r| r.count).sum::<usize>(), 6);

        let top = get_top_reasons(&items, 3);
        let reasons: Vec<FeedbackReason> = top.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                FeedbackReason::NeedExamples,
                FeedbackReason::TooFast,
                FeedbackReason::ConceptUnclear
            ]
        );
    }

    #[test]
    fn course_insights_roll_up_lectures() {
        let mut items = lecture_with(9, 1, 0);
        let mut second = lecture_with(1, 1, 2);
        for item in &mut second {
            item.lecture_id = "lec-2".to_string();
            item.is_anonymous = true;
        }
        items.extend(second);
        let mut other_course = item("z", "lec-9", UnderstandingLevel::Confused, None);
        other_course.course_id = "math200".to_string();
        items.push(other_course);

        let insights = compute_course_insights("cs101", &items);
        assert_eq!(insights.total_responses, 14);
        assert_eq!(insights.lectures.len(), 2);
        assert_eq!(insights.lectures[0].lecture_id, "lec-1");
        assert_eq!(insights.lectures[0].risk, RiskLevel::Low);
        assert_eq!(insights.lectures_at_risk, vec!["lec-2".to_string()]);
        assert_eq!(insights.anonymous_responses, 4);
        // stu-1..stu-10 and stu-1..stu-4 overlap
        assert_eq!(insights.participating_students, 10);
        assert_eq!(insights.risk, RiskLevel::Medium);
    }

    #[test]
    fn topic_trend_compares_windows() {
        let now = Utc::now();
        let items = vec![
            topical("a", UnderstandingLevel::Confused, &["recursion"], days_ago(now, 10)),
            topical("b", UnderstandingLevel::Confused, &["recursion"], days_ago(now, 9)),
            topical("a", UnderstandingLevel::Fully, &["recursion", "loops"], days_ago(now, 2)),
            topical("b", UnderstandingLevel::Fully, &["recursion"], days_ago(now, 1)),
            topical("c", UnderstandingLevel::Fully, &["loops"], days_ago(now, 12)),
            topical("c", UnderstandingLevel::Confused, &["loops"], days_ago(now, 3)),
            topical("d", UnderstandingLevel::Partial, &["pointers"], days_ago(now, 1)),
        ];

        let topics = analyze_topics(&items, now, &TopicTrendSettings::default());
        let names: Vec<&str> = topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(names, vec!["recursion", "loops", "pointers"]);

        assert_eq!(topics[0].responses, 4);
        assert!((topics[0].clarity_pct - 50.0).abs() < 1e-9);
        assert_eq!(topics[0].trend, TopicTrend::Improving);
        assert_eq!(topics[1].trend, TopicTrend::Declining);
        assert_eq!(topics[2].trend, TopicTrend::Stable);
    }

    #[test]
    fn topic_windows_close_at_their_later_edge() {
        let now = Utc::now();
        let settings = TopicTrendSettings { window_days: 7, tolerance_pct: 60.0 };
        let items = vec![
            // exactly as_of - 2w falls outside the prior window
            topical("a", UnderstandingLevel::Fully, &["graphs"], days_ago(now, 14)),
            // exactly as_of - w closes the prior window
            topical("b", UnderstandingLevel::Confused, &["graphs"], days_ago(now, 7)),
            // exactly as_of closes the recent window
            topical("c", UnderstandingLevel::Fully, &["graphs"], now),
        ];

        let topics = analyze_topics(&items, now, &settings);
        assert_eq!(topics[0].responses, 3);
        // recent 100% against prior 0%; any misplaced edge item leaves the delta within tolerance
        assert_eq!(topics[0].trend, TopicTrend::Improving);
    }

    #[test]
    fn rollups_use_whole_number_understanding() {
        let items = lecture_with(2, 0, 1);
        let summary = summarize_lecture_feedback("lec-1", &items);
        assert_eq!(summary.understanding, compute_understanding_pct(&items));
        let insights = compute_course_insights("cs101", &items);
        assert_eq!(insights.understanding.full_pct, 67);
    }

    #[test]
    fn oversized_topic_window_does_not_panic() {
        let now = Utc::now();
        let settings = TopicTrendSettings { window_days: i64::MAX, tolerance_pct: 5.0 };
        let items = vec![topical("a", UnderstandingLevel::Fully, &["sets"], now)];
        let topics = analyze_topics(&items, now, &settings);
        assert_eq!(topics[0].trend, TopicTrend::Stable);
    }

    #[test]
    fn small_clarity_change_is_stable() {
        let now = Utc::now();
        let settings = TopicTrendSettings { window_days: 7, tolerance_pct: 60.0 };
        let items = vec![
            topical("a", UnderstandingLevel::Confused, &["graphs"], days_ago(now, 8)),
            topical("a", UnderstandingLevel::Fully, &["graphs"], days_ago(now, 1)),
            topical("b", UnderstandingLevel::Confused, &["graphs"], days_ago(now, 1)),
        ];
        let topics = analyze_topics(&items, now, &settings);
        assert_eq!(topics[0].trend, TopicTrend::Stable);
    }
}
