//! Attempt history: list views and soft delete.
//!
//! Deleted attempts vanish from [`list_visible`] but stay in every aggregate
//! ([`user_stats`], analytics) until restored. Nothing here removes an
//! attempt outright.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AttemptResult, TestAttempt, UserStats};

/// Field used to order the history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CompletedAt,
    Score,
    TestName,
    TimeSpent,
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortField::CompletedAt => write!(f, "completedAt"),
            SortField::Score => write!(f, "score"),
            SortField::TestName => write!(f, "testName"),
            SortField::TimeSpent => write!(f, "timeSpent"),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completedat" | "completed" | "date" => Ok(SortField::CompletedAt),
            "score" => Ok(SortField::Score),
            "testname" | "name" => Ok(SortField::TestName),
            "timespent" | "time" => Ok(SortField::TimeSpent),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Filters for the history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// One-based page number.
    pub page: u32,
    pub limit: u32,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    #[serde(default)]
    pub result: Option<AttemptResult>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
            result: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub total_pages: u32,
}

/// One page of the history list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptPage {
    pub attempts: Vec<TestAttempt>,
    pub pagination: Pagination,
}

fn compare(a: &TestAttempt, b: &TestAttempt, field: SortField) -> Ordering {
    match field {
        SortField::CompletedAt => a.record.completed_at.cmp(&b.record.completed_at),
        SortField::Score => a.record.score.cmp(&b.record.score),
        SortField::TestName => a.record.test_name.cmp(&b.record.test_name),
        SortField::TimeSpent => a.record.time_spent_secs.cmp(&b.record.time_spent_secs),
    }
}

/// The history list view: non-deleted attempts, filtered, sorted, and paged.
pub fn list_visible(attempts: &[TestAttempt], query: &ListQuery) -> AttemptPage {
    let mut visible: Vec<&TestAttempt> = attempts
        .iter()
        .filter(|a| !a.is_deleted)
        .filter(|a| query.result.map_or(true, |r| a.record.result == r))
        .collect();

    visible.sort_by(|a, b| {
        let ord = compare(a, b, query.sort_field);
        match query.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let limit = query.limit.max(1);
    let page = query.page.max(1);
    let total = visible.len() as u32;
    let total_pages = total.div_ceil(limit);

    let attempts = visible
        .into_iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .cloned()
        .collect();

    AttemptPage {
        attempts,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
        },
    }
}

/// Soft-deleted attempts, most recently deleted first.
pub fn deleted_attempts(attempts: &[TestAttempt]) -> Vec<&TestAttempt> {
    let mut deleted: Vec<&TestAttempt> = attempts.iter().filter(|a| a.is_deleted).collect();
    deleted.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
    deleted
}

/// Mark an attempt deleted. Returns `false` if it already was.
pub fn soft_delete(attempt: &mut TestAttempt, now: DateTime<Utc>) -> bool {
    if attempt.is_deleted {
        return false;
    }
    attempt.is_deleted = true;
    attempt.deleted_at = Some(now);
    tracing::debug!(attempt_id = %attempt.id, "attempt soft-deleted");
    true
}

/// Clear an attempt's deleted flag. Returns `false` if it was not deleted.
pub fn restore(attempt: &mut TestAttempt) -> bool {
    if !attempt.is_deleted {
        return false;
    }
    attempt.is_deleted = false;
    attempt.deleted_at = None;
    tracing::debug!(attempt_id = %attempt.id, "attempt restored");
    true
}

/// Lifetime totals over every attempt, deleted or not.
pub fn user_stats(attempts: &[TestAttempt]) -> UserStats {
    let total = attempts.len() as u32;
    let passed = attempts
        .iter()
        .filter(|a| a.record.result == AttemptResult::Passed)
        .count() as u32;
    let average_score = if total == 0 {
        0.0
    } else {
        attempts.iter().map(|a| a.record.score as f64).sum::<f64>() / total as f64
    };

    UserStats {
        total_attempts: total,
        total_passed: passed,
        total_failed: total - passed,
        average_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptRecord, QuestionTypeScores, SectionScores};
    use chrono::{Duration, TimeZone};

    fn attempt(id: &str, score: u32, days_ago: i64) -> TestAttempt {
        let base = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        TestAttempt::new(
            id,
            AttemptRecord {
                test_name: format!("Test {id}"),
                score,
                result: AttemptResult::from_score(score, 70),
                section_scores: SectionScores::default(),
                question_type_scores: QuestionTypeScores::default(),
                correct_answers: score / 10,
                incorrect_answers: 10 - score / 10,
                unanswered: 0,
                total_questions: 10,
                time_spent_secs: 600 - score,
                time_limit_secs: 600,
                responses: vec![],
                completed_at: base - Duration::days(days_ago),
                is_mock_exam: false,
            },
        )
    }

    fn sample() -> Vec<TestAttempt> {
        vec![
            attempt("a", 90, 0),
            attempt("b", 50, 1),
            attempt("c", 70, 2),
            attempt("d", 30, 3),
        ]
    }

    #[test]
    fn delete_hides_from_list_but_not_stats() {
        let mut attempts = sample();
        let before = user_stats(&attempts);

        assert!(soft_delete(&mut attempts[1], Utc::now()));
        let page = list_visible(&attempts, &ListQuery::default());
        assert_eq!(page.pagination.total, 3);
        assert!(page.attempts.iter().all(|a| a.id != "b"));

        let after = user_stats(&attempts);
        assert_eq!(before, after);
        assert_eq!(after.total_attempts, 4);
        assert_eq!(deleted_attempts(&attempts).len(), 1);
    }

    #[test]
    fn restore_brings_attempt_back() {
        let mut attempts = sample();
        soft_delete(&mut attempts[0], Utc::now());
        assert!(!soft_delete(&mut attempts[0], Utc::now()));
        assert!(restore(&mut attempts[0]));
        assert!(!restore(&mut attempts[0]));
        assert!(attempts[0].deleted_at.is_none());

        let page = list_visible(&attempts, &ListQuery::default());
        assert_eq!(page.pagination.total, 4);
        assert_eq!(page.attempts[0].id, "a");
    }

    #[test]
    fn sorting_and_result_filter() {
        let attempts = sample();
        let query = ListQuery {
            sort_field: SortField::Score,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let ids: Vec<_> = list_visible(&attempts, &query)
            .attempts
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["d", "b", "c", "a"]);

        let passed = ListQuery {
            result: Some(AttemptResult::Passed),
            ..Default::default()
        };
        let page = list_visible(&attempts, &passed);
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.attempts[0].id, "a");
    }

    #[test]
    fn pagination_bounds() {
        let attempts = sample();
        let query = ListQuery {
            page: 2,
            limit: 3,
            ..Default::default()
        };
        let page = list_visible(&attempts, &query);
        assert_eq!(page.attempts.len(), 1);
        assert_eq!(page.attempts[0].id, "d");
        assert_eq!(page.pagination.total_pages, 2);

        let beyond = ListQuery {
            page: 9,
            limit: 3,
            ..Default::default()
        };
        assert!(list_visible(&attempts, &beyond).attempts.is_empty());
    }

    #[test]
    fn stats_on_empty_history() {
        let stats = user_stats(&[]);
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.average_score, 0.0);
    }

    #[test]
    fn parse_sort_options() {
        assert_eq!("score".parse::<SortField>().unwrap(), SortField::Score);
        assert_eq!("date".parse::<SortField>().unwrap(), SortField::CompletedAt);
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
