//! Core data model types for examprep.
//!
//! Questions, canonical sections, and the persisted attempt records that the
//! scoring, submission, and analytics layers exchange.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the fixed scoring sections every question is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Verbal,
    Numerical,
    Analytical,
    GeneralInfo,
    Clerical,
    Constitution,
}

impl Section {
    /// Every canonical section, in reporting order.
    pub const ALL: [Section; 6] = [
        Section::Verbal,
        Section::Numerical,
        Section::Analytical,
        Section::GeneralInfo,
        Section::Clerical,
        Section::Constitution,
    ];

    /// The canonical key used in persisted score maps.
    pub fn key(self) -> &'static str {
        match self {
            Section::Verbal => "verbal",
            Section::Numerical => "numerical",
            Section::Analytical => "analytical",
            Section::GeneralInfo => "generalInfo",
            Section::Clerical => "clerical",
            Section::Constitution => "constitution",
        }
    }

    /// Human-readable section label.
    pub fn label(self) -> &'static str {
        match self {
            Section::Verbal => "Verbal Ability",
            Section::Numerical => "Numerical Ability",
            Section::Analytical => "Analytical Ability",
            Section::GeneralInfo => "General Information",
            Section::Clerical => "Clerical Ability",
            Section::Constitution => "Philippine Constitution",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Section::ALL
            .into_iter()
            .find(|section| {
                section.key().eq_ignore_ascii_case(wanted)
                    || section.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("unknown section: {wanted}"))
    }
}

/// Question difficulty as authored in a bank or reported by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "beginner" => Ok(Difficulty::Easy),
            "medium" | "intermediate" | "normal" => Ok(Difficulty::Medium),
            "hard" | "advanced" | "difficult" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A multiple-choice question. Immutable once added to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Stable identifier; absent for generated questions never stored in a bank.
    #[serde(default)]
    pub id: Option<String>,
    /// The question prompt.
    #[serde(rename = "question")]
    pub text: String,
    /// Answer choices in display order.
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    #[serde(rename = "correctAnswer")]
    pub correct_index: usize,
    /// Free-text category label, normalized to a [`Section`] when scoring.
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    /// Whether the question offers at least two non-empty choices.
    pub fn is_multiple_choice(&self) -> bool {
        self.options.iter().filter(|o| !o.trim().is_empty()).count() >= 2
    }

    /// Whether `option` is the correct choice.
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_index
    }
}

/// A static question set loaded from a bank file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub time_limit_minutes: f64,
    #[serde(default)]
    pub is_mock_exam: bool,
    pub questions: Vec<Question>,
}

/// Correctness verdict recorded when an answer locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOutcome {
    Correct,
    Wrong,
}

impl AnswerOutcome {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Wrong
        }
    }
}

/// Pass/fail verdict of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttemptResult {
    Passed,
    Failed,
}

impl AttemptResult {
    /// `Passed` iff `score >= pass_threshold`.
    pub fn from_score(score: u32, pass_threshold: u32) -> Self {
        if score >= pass_threshold {
            AttemptResult::Passed
        } else {
            AttemptResult::Failed
        }
    }
}

impl fmt::Display for AttemptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptResult::Passed => write!(f, "Passed"),
            AttemptResult::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for AttemptResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "passed" | "pass" => Ok(AttemptResult::Passed),
            "failed" | "fail" => Ok(AttemptResult::Failed),
            other => Err(format!("unknown result: {other}")),
        }
    }
}

/// Percentage per canonical section, keyed by the fixed canonical names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionScores {
    #[serde(default)]
    pub verbal: u32,
    #[serde(default)]
    pub numerical: u32,
    #[serde(default)]
    pub analytical: u32,
    #[serde(default)]
    pub general_info: u32,
    #[serde(default)]
    pub clerical: u32,
    #[serde(default)]
    pub constitution: u32,
}

impl SectionScores {
    pub fn get(&self, section: Section) -> u32 {
        match section {
            Section::Verbal => self.verbal,
            Section::Numerical => self.numerical,
            Section::Analytical => self.analytical,
            Section::GeneralInfo => self.general_info,
            Section::Clerical => self.clerical,
            Section::Constitution => self.constitution,
        }
    }

    pub fn set(&mut self, section: Section, value: u32) {
        let slot = match section {
            Section::Verbal => &mut self.verbal,
            Section::Numerical => &mut self.numerical,
            Section::Analytical => &mut self.analytical,
            Section::GeneralInfo => &mut self.general_info,
            Section::Clerical => &mut self.clerical,
            Section::Constitution => &mut self.constitution,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, u32)> + '_ {
        Section::ALL.into_iter().map(|s| (s, self.get(s)))
    }
}

/// Percentage per question type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTypeScores {
    #[serde(default)]
    pub multiple_choice: u32,
    #[serde(default)]
    pub true_false: u32,
    #[serde(default)]
    pub fill_in_blank: u32,
}

/// Snapshot of one question and how it was answered, embedded in an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question: Question,
    /// The option the user picked, if any.
    pub user_answer: Option<usize>,
    pub correct_answer: usize,
    pub is_correct: bool,
    /// Share of the attempt's time attributed to this question, in seconds.
    pub time_spent_secs: u32,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub bookmarked: bool,
}

/// Everything persisted about a finished attempt except its identity and
/// soft-delete state. This is the payload sent to the attempt store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub test_name: String,
    /// Overall percentage, `round(correct / total * 100)`.
    pub score: u32,
    pub result: AttemptResult,
    pub section_scores: SectionScores,
    #[serde(default)]
    pub question_type_scores: QuestionTypeScores,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub unanswered: u32,
    pub total_questions: u32,
    pub time_spent_secs: u32,
    #[serde(default)]
    pub time_limit_secs: u32,
    #[serde(default)]
    pub responses: Vec<QuestionResponse>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub is_mock_exam: bool,
}

impl AttemptRecord {
    /// Check the score and verdict invariants against the stored counts.
    pub fn is_consistent(&self, pass_threshold: u32) -> bool {
        let expected = crate::scoring::percentage(self.correct_answers, self.total_questions);
        self.score == expected
            && self.result == AttemptResult::from_score(self.score, pass_threshold)
            && self.correct_answers + self.incorrect_answers + self.unanswered
                == self.total_questions
    }
}

/// A persisted attempt as returned by the attempt store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
    pub id: String,
    #[serde(flatten)]
    pub record: AttemptRecord,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TestAttempt {
    pub fn new(id: impl Into<String>, record: AttemptRecord) -> Self {
        Self {
            id: id.into(),
            record,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

/// Lifetime totals for a user; soft-deleted attempts are included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_attempts: u32,
    pub total_passed: u32,
    pub total_failed: u32,
    pub average_score: f64,
}

/// A per-question mastery signal sent after an attempt is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryUpdate {
    pub question_id: String,
    pub is_correct: bool,
}
