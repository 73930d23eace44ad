//! Derived statistics over a user's attempt history.
//!
//! Everything here is recomputed from the full attempt list, soft-deleted
//! attempts included. Every output is bounded and defined for an empty history.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::normalize_category;
use crate::config::ExamConfig;
use crate::model::{AttemptResult, Section, TestAttempt};
use crate::scoring::percentage;

/// Lifetime totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_attempts: u32,
    pub passed: u32,
    pub failed: u32,
    pub average_score: f64,
    pub best_score: u32,
    /// Correct answers over all questions, as a percentage.
    pub accuracy: u32,
    pub total_time_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub completed_at: DateTime<Utc>,
    pub test_name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeMetrics {
    pub avg_secs_per_question: f64,
    /// 100 at or under the target pace, falling off as answers slow down.
    pub speed_score: u32,
    /// 100 when recent scores are identical, lower as they spread out.
    pub consistency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceKind {
    Strength,
    Weakness,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPerformance {
    pub section: Section,
    pub average: u32,
    /// Attempts that included this section.
    pub attempts: u32,
    pub kind: PerformanceKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub score: u32,
    pub pass_probability: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub focus: Vec<Section>,
    pub strengths: Vec<Section>,
    pub guidance: Vec<String>,
}

/// Everything the analytics view shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub overview: Overview,
    pub trend: Vec<TrendPoint>,
    pub time: TimeMetrics,
    pub sections: Vec<SectionPerformance>,
    pub streak: u32,
    pub readiness: Readiness,
    pub recommendations: Recommendations,
}

pub fn overview(attempts: &[TestAttempt]) -> Overview {
    let total = attempts.len() as u32;
    if total == 0 {
        return Overview::default();
    }
    let passed = attempts
        .iter()
        .filter(|a| a.record.result == AttemptResult::Passed)
        .count() as u32;
    let correct: u32 = attempts.iter().map(|a| a.record.correct_answers).sum();
    let questions: u32 = attempts.iter().map(|a| a.record.total_questions).sum();

    Overview {
        total_attempts: total,
        passed,
        failed: total - passed,
        average_score: average_score(attempts),
        best_score: attempts.iter().map(|a| a.record.score).max().unwrap_or(0),
        accuracy: percentage(correct, questions),
        total_time_secs: attempts
            .iter()
            .map(|a| u64::from(a.record.time_spent_secs))
            .sum(),
    }
}

fn average_score(attempts: &[TestAttempt]) -> f64 {
    if attempts.is_empty() {
        return 0.0;
    }
    attempts.iter().map(|a| f64::from(a.record.score)).sum::<f64>() / attempts.len() as f64
}

/// Oldest-first scores, limited to the last `window` attempts.
pub fn score_trend(attempts: &[TestAttempt], window: usize) -> Vec<TrendPoint> {
    let mut ordered: Vec<&TestAttempt> = attempts.iter().collect();
    ordered.sort_by_key(|a| a.record.completed_at);
    let skip = ordered.len().saturating_sub(window);
    ordered
        .into_iter()
        .skip(skip)
        .map(|a| TrendPoint {
            completed_at: a.record.completed_at,
            test_name: a.record.test_name.clone(),
            score: a.record.score,
        })
        .collect()
}

fn most_recent(attempts: &[TestAttempt], count: usize) -> Vec<&TestAttempt> {
    let mut ordered: Vec<&TestAttempt> = attempts.iter().collect();
    ordered.sort_by(|a, b| b.record.completed_at.cmp(&a.record.completed_at));
    ordered.truncate(count);
    ordered
}

/// Pace and score spread over the most recent attempts.
pub fn time_metrics(attempts: &[TestAttempt], config: &ExamConfig) -> TimeMetrics {
    let recent = most_recent(attempts, config.recent_window);
    if recent.is_empty() {
        return TimeMetrics::default();
    }

    let secs: u64 = recent.iter().map(|a| u64::from(a.record.time_spent_secs)).sum();
    let questions: u64 = recent.iter().map(|a| u64::from(a.record.total_questions)).sum();
    let avg_secs_per_question = if questions == 0 {
        0.0
    } else {
        secs as f64 / questions as f64
    };

    let speed_score = if questions == 0 {
        0
    } else if avg_secs_per_question <= 0.0 {
        100
    } else {
        let ratio = f64::from(config.target_secs_per_question) / avg_secs_per_question;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u32
    };

    let n = recent.len() as f64;
    let mean = recent.iter().map(|a| f64::from(a.record.score)).sum::<f64>() / n;
    let variance = recent
        .iter()
        .map(|a| (f64::from(a.record.score) - mean).powi(2))
        .sum::<f64>()
        / n;
    let consistency = (100.0 - 2.0 * variance.sqrt()).round().clamp(0.0, 100.0) as u32;

    TimeMetrics {
        avg_secs_per_question,
        speed_score,
        consistency,
    }
}

/// Sections an attempt covered.
///
/// Attempts with stored responses use their question categories; older
/// attempts without responses fall back to non-zero section scores.
fn sections_in(attempt: &TestAttempt) -> BTreeSet<Section> {
    if attempt.record.responses.is_empty() {
        attempt
            .record
            .section_scores
            .iter()
            .filter(|(_, score)| *score > 0)
            .map(|(section, _)| section)
            .collect()
    } else {
        attempt
            .record
            .responses
            .iter()
            .map(|r| normalize_category(&r.question.category))
            .collect()
    }
}

pub fn classify(average: u32, attempts: u32, config: &ExamConfig) -> PerformanceKind {
    if attempts == 0 {
        PerformanceKind::Neutral
    } else if average >= config.strength_threshold {
        PerformanceKind::Strength
    } else if average < config.weakness_threshold {
        PerformanceKind::Weakness
    } else {
        PerformanceKind::Neutral
    }
}

/// Average per section over the attempts that covered it, for every section.
pub fn section_performance(
    attempts: &[TestAttempt],
    config: &ExamConfig,
) -> Vec<SectionPerformance> {
    let covered: Vec<BTreeSet<Section>> = attempts.iter().map(sections_in).collect();

    Section::ALL
        .into_iter()
        .map(|section| {
            let scores: Vec<u32> = attempts
                .iter()
                .zip(&covered)
                .filter(|(_, sections)| sections.contains(&section))
                .map(|(a, _)| a.record.section_scores.get(section))
                .collect();
            let count = scores.len() as u32;
            let average = if count == 0 {
                0
            } else {
                (scores.iter().map(|s| f64::from(*s)).sum::<f64>() / f64::from(count)).round()
                    as u32
            };
            SectionPerformance {
                section,
                average,
                attempts: count,
                kind: classify(average, count, config),
            }
        })
        .collect()
}

/// Activity dates: answered dates plus each attempt's completion date.
pub fn activity_dates(
    attempts: &[TestAttempt],
    answered_dates: &[NaiveDate],
) -> BTreeSet<NaiveDate> {
    answered_dates
        .iter()
        .copied()
        .chain(attempts.iter().map(|a| a.record.completed_at.date_naive()))
        .collect()
}

/// Consecutive active days ending today, or ending yesterday if today has no activity yet.
pub fn current_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut day = if dates.contains(&today) {
        today
    } else if dates.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while dates.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Readiness and pass probability from the average score and attempt count.
///
/// Both are 0 with no attempts and grow with practice volume up to a cap.
pub fn readiness(average_score: f64, attempt_count: u32, config: &ExamConfig) -> Readiness {
    if attempt_count == 0 || !average_score.is_finite() {
        return Readiness::default();
    }

    let practice = f64::from(attempt_count.min(10)) * 1.5;
    let score = (average_score * 0.85 + practice).round().clamp(0.0, 100.0) as u32;

    let margin = (average_score - f64::from(config.pass_threshold)) / 8.0;
    let logistic = 1.0 / (1.0 + (-margin).exp());
    let confidence = 0.6 + 0.4 * f64::from(attempt_count.min(5)) / 5.0;
    let pass_probability = (logistic * confidence * 100.0).round().clamp(0.0, 100.0) as u32;

    Readiness {
        score,
        pass_probability,
    }
}

const MAX_TOPICS: usize = 3;

/// Weakest sections to focus on, strongest sections to keep, and advice text.
pub fn recommendations(sections: &[SectionPerformance], config: &ExamConfig) -> Recommendations {
    if sections.iter().all(|s| s.average == 0) {
        return Recommendations {
            focus: Vec::new(),
            strengths: Vec::new(),
            guidance: vec![
                "Take a full practice test to establish a baseline across all sections.".into(),
                "Try a continuous session to sample questions from every section.".into(),
                "Aim for steady daily practice to build a streak.".into(),
            ],
        };
    }

    let mut ascending: Vec<&SectionPerformance> = sections.iter().collect();
    ascending.sort_by_key(|s| s.average);

    let focus: Vec<Section> = ascending
        .iter()
        .filter(|s| s.average < config.strength_threshold)
        .take(MAX_TOPICS)
        .map(|s| s.section)
        .collect();

    let strengths: Vec<Section> = ascending
        .iter()
        .rev()
        .filter(|s| s.average >= config.strength_threshold)
        .take(MAX_TOPICS)
        .map(|s| s.section)
        .collect();

    let mut guidance: Vec<String> = ascending
        .iter()
        .filter(|s| focus.contains(&s.section))
        .map(|s| {
            if s.attempts == 0 {
                format!("Start practicing {}; no attempts cover it yet.", s.section)
            } else {
                format!("Review {} (average {}%).", s.section, s.average)
            }
        })
        .collect();

    if guidance.is_empty() {
        guidance.push(
            "Every section is a strength; keep taking full mock exams to stay sharp.".into(),
        );
    } else if !strengths.is_empty() {
        let names: Vec<&str> = strengths.iter().map(|s| s.label()).collect();
        guidance.push(format!("Keep up the work in {}.", names.join(", ")));
    }

    Recommendations {
        focus,
        strengths,
        guidance,
    }
}

/// Compute the full analytics view.
pub fn compute_analytics(
    attempts: &[TestAttempt],
    answered_dates: &[NaiveDate],
    today: NaiveDate,
    config: &ExamConfig,
) -> Analytics {
    let overview = overview(attempts);
    let sections = section_performance(attempts, config);
    let streak = current_streak(&activity_dates(attempts, answered_dates), today);
    let readiness = readiness(overview.average_score, overview.total_attempts, config);
    let recommendations = recommendations(&sections, config);

    Analytics {
        trend: score_trend(attempts, config.trend_window),
        time: time_metrics(attempts, config),
        overview,
        sections,
        streak,
        readiness,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::soft_delete;
    use crate::model::{
        AttemptRecord, Question, QuestionResponse, QuestionTypeScores, SectionScores,
    };
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn attempt(id: &str, score: u32, day: u32, sections: &[(Section, u32)]) -> TestAttempt {
        let mut section_scores = SectionScores::default();
        for (section, value) in sections {
            section_scores.set(*section, *value);
        }
        TestAttempt::new(
            id,
            AttemptRecord {
                test_name: format!("Test {id}"),
                score,
                result: AttemptResult::from_score(score, 70),
                section_scores,
                question_type_scores: QuestionTypeScores::default(),
                correct_answers: score / 10,
                incorrect_answers: 10 - score / 10,
                unanswered: 0,
                total_questions: 10,
                time_spent_secs: 600,
                time_limit_secs: 1200,
                responses: vec![],
                completed_at: Utc.with_ymd_and_hms(2026, 5, day, 9, 0, 0).unwrap(),
                is_mock_exam: false,
            },
        )
    }

    fn response(category: &str) -> QuestionResponse {
        QuestionResponse {
            question: Question {
                id: None,
                text: category.into(),
                options: vec!["a".into(), "b".into()],
                correct_index: 0,
                category: category.into(),
                difficulty: None,
                explanation: None,
            },
            user_answer: Some(1),
            correct_answer: 0,
            is_correct: false,
            time_spent_secs: 10,
            explanation: String::new(),
            bookmarked: false,
        }
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let today = date(2026, 5, 20);
        let dates: BTreeSet<_> = [today, date(2026, 5, 19), date(2026, 5, 17)].into();
        assert_eq!(current_streak(&dates, today), 2);
    }

    #[test]
    fn streak_anchors_on_yesterday() {
        let today = date(2026, 5, 20);
        let dates: BTreeSet<_> = [date(2026, 5, 19), date(2026, 5, 18)].into();
        assert_eq!(current_streak(&dates, today), 2);

        let stale: BTreeSet<_> = [date(2026, 5, 18)].into();
        assert_eq!(current_streak(&stale, today), 0);
        assert_eq!(current_streak(&BTreeSet::new(), today), 0);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let today = date(2026, 6, 1);
        let dates: BTreeSet<_> = [today, date(2026, 5, 31), date(2026, 5, 30)].into();
        assert_eq!(current_streak(&dates, today), 3);
    }

    #[test]
    fn empty_history_is_well_defined() {
        let analytics = compute_analytics(&[], &[], date(2026, 5, 20), &ExamConfig::default());
        assert_eq!(analytics.overview, Overview::default());
        assert!(analytics.trend.is_empty());
        assert_eq!(analytics.time, TimeMetrics::default());
        assert_eq!(analytics.sections.len(), 6);
        assert!(analytics
            .sections
            .iter()
            .all(|s| s.average == 0 && s.kind == PerformanceKind::Neutral));
        assert_eq!(analytics.streak, 0);
        assert_eq!(analytics.readiness, Readiness::default());
        assert!(analytics.recommendations.focus.is_empty());
        assert!(!analytics.recommendations.guidance.is_empty());
    }

    #[test]
    fn trend_is_oldest_first_and_windowed() {
        let attempts: Vec<_> = (1..=12)
            .rev()
            .map(|day| attempt(&format!("a{day}"), day * 5, day, &[]))
            .collect();
        let trend = score_trend(&attempts, 10);
        assert_eq!(trend.len(), 10);
        assert_eq!(trend[0].score, 15);
        assert_eq!(trend[9].score, 60);
    }

    #[test]
    fn sections_classified_and_unattempted_reported() {
        let attempts = vec![
            attempt("a", 80, 1, &[(Section::Verbal, 90), (Section::Numerical, 40)]),
            attempt("b", 70, 2, &[(Section::Verbal, 80), (Section::Numerical, 60)]),
            attempt("c", 65, 3, &[(Section::Analytical, 65)]),
        ];
        let sections = section_performance(&attempts, &ExamConfig::default());
        let get = |section| sections.iter().find(|s| s.section == section).unwrap();

        assert_eq!(get(Section::Verbal).average, 85);
        assert_eq!(get(Section::Verbal).kind, PerformanceKind::Strength);
        assert_eq!(get(Section::Numerical).average, 50);
        assert_eq!(get(Section::Numerical).kind, PerformanceKind::Weakness);
        assert_eq!(get(Section::Analytical).kind, PerformanceKind::Neutral);
        assert_eq!(get(Section::Clerical).average, 0);
        assert_eq!(get(Section::Clerical).attempts, 0);
        assert_eq!(get(Section::Clerical).kind, PerformanceKind::Neutral);
    }

    #[test]
    fn zero_section_counts_when_responses_cover_it() {
        let mut a = attempt("a", 50, 1, &[(Section::Verbal, 100)]);
        a.record.responses = vec![response("Verbal Ability"), response("Clerical Ability")];
        let b = attempt("b", 50, 2, &[(Section::Clerical, 100)]);

        let sections = section_performance(&[a, b], &ExamConfig::default());
        let clerical = sections.iter().find(|s| s.section == Section::Clerical).unwrap();
        assert_eq!(clerical.attempts, 2);
        assert_eq!(clerical.average, 50);
    }

    #[test]
    fn time_metrics_use_recent_window() {
        let mut attempts: Vec<_> = (1..=6).map(|d| attempt(&format!("a{d}"), 70, d, &[])).collect();
        attempts[0].record.time_spent_secs = 6000;
        let metrics = time_metrics(&attempts, &ExamConfig::default());
        assert_eq!(metrics.avg_secs_per_question, 60.0);
        assert_eq!(metrics.speed_score, 100);
        assert_eq!(metrics.consistency, 100);

        attempts[5].record.time_spent_secs = 3000;
        attempts[5].record.score = 20;
        let slower = time_metrics(&attempts, &ExamConfig::default());
        assert!(slower.speed_score < 100);
        assert!(slower.consistency < 100);
    }

    #[test]
    fn instant_submission_is_fastest() {
        let mut a = attempt("a", 0, 1, &[]);
        a.record.time_spent_secs = 0;
        let metrics = time_metrics(&[a.clone()], &ExamConfig::default());
        assert_eq!(metrics.avg_secs_per_question, 0.0);
        assert_eq!(metrics.speed_score, 100);

        a.record.total_questions = 0;
        assert_eq!(time_metrics(&[a], &ExamConfig::default()).speed_score, 0);
    }

    #[test]
    fn readiness_is_bounded_and_monotonic() {
        let config = ExamConfig::default();
        assert_eq!(readiness(0.0, 0, &config), Readiness::default());
        let low = readiness(50.0, 2, &config);
        let high = readiness(90.0, 2, &config);
        let practiced = readiness(90.0, 10, &config);
        assert!(low.score < high.score);
        assert!(low.pass_probability < high.pass_probability);
        assert!(high.score <= practiced.score);
        assert!(practiced.score <= 100 && practiced.pass_probability <= 100);
        assert_eq!(readiness(100.0, 50, &config).score, 100);
    }

    #[test]
    fn recommendations_rank_sections() {
        let attempts = vec![attempt(
            "a",
            70,
            1,
            &[
                (Section::Verbal, 95),
                (Section::Numerical, 30),
                (Section::Clerical, 80),
                (Section::Analytical, 50),
            ],
        )];
        let config = ExamConfig::default();
        let recs = recommendations(&section_performance(&attempts, &config), &config);
        assert_eq!(recs.focus[0], Section::GeneralInfo);
        assert!(recs.focus.len() <= 3);
        assert_eq!(recs.strengths, vec![Section::Verbal, Section::Clerical]);
        assert!(recs.guidance.iter().any(|g| g.contains("Keep up")));
    }

    #[test]
    fn deleted_attempts_still_count() {
        let mut attempts = vec![attempt("a", 90, 19, &[]), attempt("b", 40, 20, &[])];
        let today = date(2026, 5, 20);
        let before = compute_analytics(&attempts, &[], today, &ExamConfig::default());
        soft_delete(&mut attempts[1], Utc::now());
        let after = compute_analytics(&attempts, &[], today, &ExamConfig::default());
        assert_eq!(before, after);
        assert_eq!(after.streak, 2);
        assert_eq!(after.overview.average_score, 65.0);
    }
}
