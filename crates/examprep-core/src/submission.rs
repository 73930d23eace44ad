//! Turning a submitted draft into a stored attempt.
//!
//! The attempt save and the mastery batch are independent: a mastery failure
//! never affects a save that already succeeded, and a failed save can be
//! retried from the same payload without rescoring.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ExamConfig;
use crate::error::is_auth_failure;
use crate::model::{AnswerOutcome, AttemptRecord, MasteryUpdate, QuestionResponse, TestAttempt};
use crate::scoring::score_attempt;
use crate::session::AttemptDraft;
use crate::traits::{AttemptStore, MasteryTracker};

/// Attempt details not held by the draft.
#[derive(Debug, Clone)]
pub struct AttemptMetadata {
    pub test_name: String,
    pub is_mock_exam: bool,
    pub completed_at: DateTime<Utc>,
}

/// Score the draft and assemble the persistence payload.
pub fn build_attempt_record(
    draft: &AttemptDraft,
    metadata: &AttemptMetadata,
    config: &ExamConfig,
) -> AttemptRecord {
    let summary = score_attempt(
        &draft.questions,
        &draft.answers,
        &draft.results,
        config.pass_threshold,
    );

    let time_spent_secs = draft.elapsed_secs();
    let per_question = if draft.questions.is_empty() {
        0
    } else {
        time_spent_secs / draft.questions.len() as u32
    };

    let responses = draft
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| QuestionResponse {
            question: question.clone(),
            user_answer: draft.answers.get(&index).copied(),
            correct_answer: question.correct_index,
            is_correct: draft.results.get(&index)
                == Some(&AnswerOutcome::Correct),
            time_spent_secs: per_question,
            explanation: question.explanation.clone().unwrap_or_default(),
            bookmarked: false,
        })
        .collect();

    AttemptRecord {
        test_name: metadata.test_name.clone(),
        score: summary.score,
        result: summary.result,
        section_scores: summary.section_scores,
        question_type_scores: summary.question_type_scores,
        correct_answers: summary.correct,
        incorrect_answers: summary.incorrect,
        unanswered: summary.unanswered,
        total_questions: summary.total,
        time_spent_secs,
        time_limit_secs: draft.initial_secs,
        responses,
        completed_at: metadata.completed_at,
        is_mock_exam: metadata.is_mock_exam,
    }
}

/// Mastery updates for the draft's questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasteryBatch {
    pub updates: Vec<MasteryUpdate>,
    /// Questions without a stable id.
    pub skipped: usize,
}

/// One update per question that has a stable id; the rest are counted as skipped.
pub fn mastery_updates(draft: &AttemptDraft) -> MasteryBatch {
    let mut batch = MasteryBatch::default();
    for (index, question) in draft.questions.iter().enumerate() {
        match question.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => batch.updates.push(MasteryUpdate {
                question_id: id.to_string(),
                is_correct: draft.results.get(&index)
                    == Some(&AnswerOutcome::Correct),
            }),
            _ => batch.skipped += 1,
        }
    }
    batch
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Pending,
    Saved { attempt: TestAttempt },
    /// The save failed; [`SubmissionPipeline::retry`] resends the same payload.
    SaveError { message: String },
    SignedOut,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasteryReport {
    pub submitted: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionReport {
    pub saved: bool,
    pub attempt: Option<TestAttempt>,
    pub save_error: Option<String>,
    pub mastery: MasteryReport,
    pub signed_out: bool,
}

/// Receives pipeline events as they happen.
pub trait SubmissionObserver: Send + Sync {
    fn on_saved(&self, attempt: &TestAttempt);
    fn on_save_error(&self, message: &str);
    fn on_mastery_error(&self, message: &str);
    fn on_auth_failure(&self);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {
    fn on_saved(&self, _: &TestAttempt) {}
    fn on_save_error(&self, _: &str) {}
    fn on_mastery_error(&self, _: &str) {}
    fn on_auth_failure(&self) {}
}

pub struct SubmissionPipeline {
    store: Arc<dyn AttemptStore>,
    mastery: Arc<dyn MasteryTracker>,
    record: AttemptRecord,
    batch: MasteryBatch,
    state: SubmissionState,
    last_report: Option<SubmissionReport>,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        mastery: Arc<dyn MasteryTracker>,
        record: AttemptRecord,
        batch: MasteryBatch,
    ) -> Self {
        Self {
            store,
            mastery,
            record,
            batch,
            state: SubmissionState::Pending,
            last_report: None,
        }
    }

    /// Score the draft once and prepare both payloads.
    pub fn from_draft(
        store: Arc<dyn AttemptStore>,
        mastery: Arc<dyn MasteryTracker>,
        draft: &AttemptDraft,
        metadata: &AttemptMetadata,
        config: &ExamConfig,
    ) -> Self {
        let record = build_attempt_record(draft, metadata, config);
        let batch = mastery_updates(draft);
        Self::new(store, mastery, record, batch)
    }

    pub fn record(&self) -> &AttemptRecord {
        &self.record
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Save the attempt, then send the mastery batch.
    ///
    /// After a successful save (or a sign-out) this returns the previous
    /// report without calling the store again.
    pub async fn submit(&mut self, observer: &dyn SubmissionObserver) -> SubmissionReport {
        if let (SubmissionState::Saved { .. } | SubmissionState::SignedOut, Some(report)) =
            (&self.state, &self.last_report)
        {
            return report.clone();
        }

        let mut report = SubmissionReport {
            mastery: MasteryReport {
                skipped: self.batch.skipped,
                ..Default::default()
            },
            ..Default::default()
        };

        match self.store.save_attempt(&self.record).await {
            Ok(attempt) => {
                tracing::info!(
                    attempt_id = %attempt.id,
                    score = attempt.record.score,
                    "attempt saved"
                );
                observer.on_saved(&attempt);
                report.saved = true;
                report.attempt = Some(attempt.clone());
                self.state = SubmissionState::Saved { attempt };
            }
            Err(e) if is_auth_failure(&e) => {
                tracing::warn!(error = %e, "attempt save rejected credentials");
                observer.on_auth_failure();
                report.signed_out = true;
                self.state = SubmissionState::SignedOut;
                self.last_report = Some(report.clone());
                return report;
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(error = %message, "failed to save attempt");
                observer.on_save_error(&message);
                report.save_error = Some(message.clone());
                self.state = SubmissionState::SaveError { message };
            }
        }

        if !self.batch.updates.is_empty() {
            match self.mastery.update_mastery(&self.batch.updates).await {
                Ok(()) => report.mastery.submitted = self.batch.updates.len(),
                Err(e) if is_auth_failure(&e) => {
                    tracing::warn!(error = %e, "mastery update rejected credentials");
                    observer.on_auth_failure();
                    report.signed_out = true;
                    if !report.saved {
                        self.state = SubmissionState::SignedOut;
                    }
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    tracing::warn!(
                        error = %message,
                        updates = self.batch.updates.len(),
                        "mastery update failed"
                    );
                    observer.on_mastery_error(&message);
                    report.mastery.error = Some(message);
                }
            }
        } else if self.batch.skipped > 0 {
            tracing::debug!(
                skipped = self.batch.skipped,
                "no stored questions to update mastery for"
            );
        }

        self.last_report = Some(report.clone());
        report
    }

    /// Re-run the pipeline after a failed save. Any other state returns the
    /// last report unchanged.
    pub async fn retry(&mut self, observer: &dyn SubmissionObserver) -> SubmissionReport {
        match &self.state {
            SubmissionState::SaveError { .. } | SubmissionState::Pending => {
                tracing::debug!("retrying attempt submission");
                self.submit(observer).await
            }
            _ => self.last_report.clone().unwrap_or_default(),
        }
    }
}
