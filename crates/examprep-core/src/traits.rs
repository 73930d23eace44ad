//! Collaborator trait definitions.
//!
//! The question generator, the attempt store, and the mastery tracker are
//! remote services. `examprep-providers` implements them over HTTP and with
//! a local store; the session and submission layers only see these traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{AttemptPage, ListQuery};
use crate::model::{AttemptRecord, MasteryUpdate, TestAttempt, UserStats};

// ---------------------------------------------------------------------------
// Question generation
// ---------------------------------------------------------------------------

/// Backend that produces one new question on demand.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Human-readable generator name (e.g. "http").
    fn name(&self) -> &str;

    /// Request a new question.
    async fn generate(&self, request: &GenerateQuestionRequest)
        -> anyhow::Result<GenerateQuestionResponse>;
}

/// Request for one generated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionRequest {
    /// Category labels to draw from.
    pub categories: Vec<String>,
    /// Question texts already seen in this session.
    pub avoid_list: Vec<String>,
    pub session_id: Uuid,
    /// One-based number of the question being requested.
    pub question_number: u32,
}

/// Generator response as received; validated by
/// [`normalize_response`](crate::generation::normalize_response).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateQuestionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

/// A generated question before normalization.
///
/// `options` may be a list or a keyed object, and the answer may be an index,
/// a numeric string, a letter, or the option text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub answer: serde_json::Value,
    #[serde(default, rename = "correctAnswer")]
    pub correct_answer: serde_json::Value,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub id: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Attempt storage
// ---------------------------------------------------------------------------

/// Remote store of finished attempts.
///
/// Listing excludes soft-deleted attempts; `all_attempts` and `user_stats`
/// include them. There is no hard delete.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Persist a new attempt and return it with its assigned id.
    async fn save_attempt(&self, record: &AttemptRecord) -> anyhow::Result<TestAttempt>;

    /// Page through non-deleted attempts.
    async fn list_attempts(&self, query: &ListQuery) -> anyhow::Result<AttemptPage>;

    /// Every attempt including soft-deleted ones, newest first.
    async fn all_attempts(&self) -> anyhow::Result<Vec<TestAttempt>>;

    /// Lifetime totals, soft-deleted attempts included.
    async fn user_stats(&self) -> anyhow::Result<UserStats>;

    /// Soft-delete an attempt.
    async fn delete_attempt(&self, id: &str) -> anyhow::Result<()>;

    /// Undo a soft delete.
    async fn restore_attempt(&self, id: &str) -> anyhow::Result<()>;

    /// Set or clear the bookmark on one question response.
    async fn set_bookmark(
        &self,
        attempt_id: &str,
        question_index: usize,
        bookmarked: bool,
    ) -> anyhow::Result<()>;
}

/// Remote per-question mastery tracking.
#[async_trait]
pub trait MasteryTracker: Send + Sync {
    /// Record correctness for a batch of stored questions.
    async fn update_mastery(&self, updates: &[MasteryUpdate]) -> anyhow::Result<()>;

    /// Dates on which the user answered at least one question.
    async fn answered_dates(&self) -> anyhow::Result<Vec<NaiveDate>>;
}
