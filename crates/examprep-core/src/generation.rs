//! Continuous-mode question sourcing.
//!
//! Asks the generator for one question at a time, rejects repeats of texts
//! already seen in the session, and falls back to a local pool when the
//! generator fails, repeats itself, or returns something unusable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::ExamConfig;
use crate::error::{is_auth_failure, is_permanent, remote_error, GenerationError};
use crate::model::{Difficulty, Question, Section};
use crate::traits::{
    GenerateQuestionRequest, GenerateQuestionResponse, GeneratedQuestion, QuestionGenerator,
};

/// Longest rate-limit pause honoured between generator retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Avoid-list
// ---------------------------------------------------------------------------

/// Question texts already shown in a session.
///
/// Membership ignores case and surrounding or repeated whitespace.
#[derive(Debug, Clone, Default)]
pub struct AvoidList {
    texts: Vec<String>,
    keys: HashSet<String>,
}

fn text_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl AvoidList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut list = Self::new();
        for text in texts {
            list.insert(text.as_ref());
        }
        list
    }

    /// Add a text. Returns `false` if an equivalent text was already present.
    pub fn insert(&mut self, text: &str) -> bool {
        if self.keys.insert(text_key(text)) {
            self.texts.push(text.to_string());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.keys.contains(&text_key(text))
    }

    /// Texts in the order they were first seen.
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Validate a generator response and take its first question.
pub fn normalize_response(
    response: GenerateQuestionResponse,
    fallback_category: &str,
) -> Result<Question, GenerationError> {
    if !response.success {
        return Err(GenerationError::Unsuccessful);
    }
    let raw = response
        .questions
        .into_iter()
        .next()
        .ok_or(GenerationError::Empty)?;
    normalize_generated(raw, fallback_category)
}

/// Turn a raw generated question into a [`Question`].
pub fn normalize_generated(
    raw: GeneratedQuestion,
    fallback_category: &str,
) -> Result<Question, GenerationError> {
    let text = raw
        .question
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(GenerationError::MissingText)?;

    let options = normalize_options(&raw.options)?;

    let answer = if raw.answer.is_null() {
        &raw.correct_answer
    } else {
        &raw.answer
    };
    let correct_index = resolve_answer(answer, &options)?;

    let category = raw
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| fallback_category.to_string());

    let id = match raw.id {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    Ok(Question {
        id,
        text,
        options,
        correct_index,
        category,
        difficulty: raw.difficulty.and_then(|d| d.parse::<Difficulty>().ok()),
        explanation: raw.explanation.filter(|e| !e.trim().is_empty()),
    })
}

fn option_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept an ordered list, or a keyed object ordered by key (`{"A": .., "B": ..}`).
fn normalize_options(value: &Value) -> Result<Vec<String>, GenerationError> {
    let options: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| {
                option_text(v).ok_or_else(|| {
                    GenerationError::InvalidOptions(format!("unsupported option value: {v}"))
                })
            })
            .collect::<Result<_, _>>()?,
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
            entries
                .into_iter()
                .map(|(key, v)| {
                    option_text(v).ok_or_else(|| {
                        GenerationError::InvalidOptions(format!("unsupported value for {key}"))
                    })
                })
                .collect::<Result<_, _>>()?
        }
        Value::Null => return Err(GenerationError::InvalidOptions("missing".into())),
        other => {
            return Err(GenerationError::InvalidOptions(format!(
                "expected a list or keyed object, got {other}"
            )))
        }
    };

    if options.len() < 2 {
        return Err(GenerationError::InvalidOptions(format!(
            "need at least two options, got {}",
            options.len()
        )));
    }
    Ok(options)
}

/// Resolve an answer given as an index, option text, letter, or numeric string.
fn resolve_answer(value: &Value, options: &[String]) -> Result<usize, GenerationError> {
    let index = match value {
        Value::Number(n) => n
            .as_u64()
            .map(|i| i as usize)
            .ok_or_else(|| GenerationError::InvalidAnswer(format!("not an index: {n}")))?,
        Value::String(s) => {
            let s = s.trim();
            if let Some(pos) = options.iter().position(|o| o == s) {
                pos
            } else if let Some(letter) = single_letter(s) {
                (letter as u8 - b'A') as usize
            } else if let Ok(i) = s.parse::<usize>() {
                i
            } else {
                return Err(GenerationError::InvalidAnswer(format!(
                    "unrecognized answer: {s}"
                )));
            }
        }
        Value::Null => return Err(GenerationError::InvalidAnswer("missing".into())),
        other => {
            return Err(GenerationError::InvalidAnswer(format!(
                "unsupported answer value: {other}"
            )))
        }
    };

    if index >= options.len() {
        return Err(GenerationError::InvalidAnswer(format!(
            "index {index} out of range for {} options",
            options.len()
        )));
    }
    Ok(index)
}

fn single_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Fallback pool
// ---------------------------------------------------------------------------

/// Local questions substituted when the generator cannot deliver.
#[derive(Debug, Clone)]
pub struct FallbackPool {
    questions: Vec<Question>,
}

impl FallbackPool {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// The bundled pool covering every section.
    pub fn builtin() -> Self {
        Self::new(builtin_questions())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// First question not in `avoid`, scanning from a rotating offset.
    pub fn pick(&self, avoid: &AvoidList, offset: u32) -> Option<Question> {
        let len = self.questions.len();
        if len == 0 {
            return None;
        }
        let start = offset as usize % len;
        (0..len)
            .map(|i| &self.questions[(start + i) % len])
            .find(|q| !avoid.contains(&q.text))
            .cloned()
    }
}

fn fallback(
    text: &str,
    options: [&str; 4],
    correct_index: usize,
    section: Section,
    explanation: &str,
) -> Question {
    Question {
        id: None,
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_index,
        category: section.label().to_string(),
        difficulty: Some(Difficulty::Medium),
        explanation: Some(explanation.to_string()),
    }
}

fn builtin_questions() -> Vec<Question> {
    vec![
        fallback(
            "Choose the word closest in meaning to DILIGENT.",
            ["Lazy", "Hardworking", "Careless", "Hesitant"],
            1,
            Section::Verbal,
            "Diligent means showing care and effort in one's work.",
        ),
        fallback(
            "Choose the word opposite in meaning to SCARCE.",
            ["Rare", "Limited", "Abundant", "Insufficient"],
            2,
            Section::Verbal,
            "Scarce means in short supply; abundant is its antonym.",
        ),
        fallback(
            "What is 15% of 240?",
            ["24", "30", "36", "48"],
            2,
            Section::Numerical,
            "0.15 x 240 = 36.",
        ),
        fallback(
            "A worker finishes a job in 6 days. How many days do 3 such workers need?",
            ["1", "2", "3", "18"],
            1,
            Section::Numerical,
            "Three times the workforce needs a third of the time: 6 / 3 = 2.",
        ),
        fallback(
            "What comes next in the series 2, 6, 12, 20, 30, ...?",
            ["40", "42", "44", "36"],
            1,
            Section::Analytical,
            "The differences grow by 2 (4, 6, 8, 10, 12), so 30 + 12 = 42.",
        ),
        fallback(
            "All clerks are employees. Some employees are managers. Which must be true?",
            [
                "All managers are clerks",
                "Some clerks are managers",
                "All clerks are employees",
                "No clerk is a manager",
            ],
            2,
            Section::Analytical,
            "Only the given premise itself is guaranteed.",
        ),
        fallback(
            "Which is the largest planet in the solar system?",
            ["Earth", "Saturn", "Neptune", "Jupiter"],
            3,
            Section::GeneralInfo,
            "Jupiter is the largest planet by mass and volume.",
        ),
        fallback(
            "Which gas do plants absorb from the atmosphere for photosynthesis?",
            ["Oxygen", "Carbon dioxide", "Nitrogen", "Hydrogen"],
            1,
            Section::GeneralInfo,
            "Plants take in carbon dioxide and release oxygen.",
        ),
        fallback(
            "Which name comes first in alphabetical filing order?",
            ["Santos, Maria", "Santiago, Jose", "Santos, Ana", "Sanchez, Luis"],
            3,
            Section::Clerical,
            "Sanc- precedes Sant- alphabetically.",
        ),
        fallback(
            "Which pair is an exact match?",
            [
                "4827-AB9 / 4827-A89",
                "QX-7731 / QX-7731",
                "M0N-552 / MON-552",
                "8812-LT / 8821-LT",
            ],
            1,
            Section::Clerical,
            "Only QX-7731 matches character for character.",
        ),
        fallback(
            "Under the 1987 Constitution, what is the term of office of the President?",
            [
                "Four years, one re-election",
                "Six years, no re-election",
                "Six years, one re-election",
                "Five years, no re-election",
            ],
            1,
            Section::Constitution,
            "Article VII, Section 4: a single six-year term without re-election.",
        ),
        fallback(
            "Which branch of government has the power to declare a law unconstitutional?",
            ["Legislative", "Executive", "Judicial", "Constitutional Commissions"],
            2,
            Section::Constitution,
            "Judicial review is vested in the Supreme Court.",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Sourcing
// ---------------------------------------------------------------------------

/// Where an appended question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOrigin {
    Static,
    Generated,
    Fallback,
}

/// Everything one fetch needs, owned so the fetch can outlive its caller's borrow.
#[derive(Clone)]
pub struct FetchContext {
    pub generator: Option<Arc<dyn QuestionGenerator>>,
    pub fallback: Arc<FallbackPool>,
    pub request: GenerateQuestionRequest,
    /// Generator calls still allowed this session.
    pub requests_remaining: u32,
    pub config: ExamConfig,
}

/// Result of sourcing one question.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Question {
        question: Question,
        origin: QuestionOrigin,
        requests_made: u32,
    },
    /// Neither the generator nor the fallback pool has an unseen question.
    Exhausted { requests_made: u32 },
    /// The generator rejected the user's credential.
    Unauthorized { requests_made: u32 },
}

/// Source the next continuous-mode question.
///
/// Duplicates get `max_duplicate_retries` extra calls and transient errors
/// `max_generation_retries`; malformed payloads, permanent errors, and the
/// session-wide request cap go straight to the fallback pool.
pub async fn fetch_next_question(ctx: FetchContext) -> FetchOutcome {
    let FetchContext {
        generator,
        fallback,
        request,
        requests_remaining,
        config,
    } = ctx;

    let avoid = AvoidList::from_texts(&request.avoid_list);
    let fallback_category = request
        .categories
        .first()
        .cloned()
        .unwrap_or_else(|| Section::GeneralInfo.label().to_string());

    let mut requests_made = 0u32;
    let mut duplicates = 0u32;
    let mut failures = 0u32;

    if let Some(generator) = &generator {
        loop {
            if requests_made >= requests_remaining {
                tracing::warn!(
                    session_id = %request.session_id,
                    "generation request cap reached, using fallback pool"
                );
                break;
            }
            requests_made += 1;

            match generator.generate(&request).await {
                Ok(response) => match normalize_response(response, &fallback_category) {
                    Ok(question) if avoid.contains(&question.text) => {
                        duplicates += 1;
                        tracing::warn!(
                            question_number = request.question_number,
                            duplicates,
                            "generator repeated a seen question"
                        );
                        if duplicates > config.max_duplicate_retries {
                            break;
                        }
                    }
                    Ok(question) => {
                        tracing::debug!(
                            question_number = request.question_number,
                            generator = generator.name(),
                            "generated question accepted"
                        );
                        return FetchOutcome::Question {
                            question,
                            origin: QuestionOrigin::Generated,
                            requests_made,
                        };
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed generator response, using fallback");
                        break;
                    }
                },
                Err(e) => {
                    if is_auth_failure(&e) {
                        tracing::warn!(error = %e, "generator rejected credentials");
                        return FetchOutcome::Unauthorized { requests_made };
                    }
                    if is_permanent(&e) || failures >= config.max_generation_retries {
                        tracing::warn!(error = %e, "question generation failed, using fallback");
                        break;
                    }
                    failures += 1;
                    let delay = remote_error(&e)
                        .and_then(|r| r.retry_after_ms())
                        .map(Duration::from_millis)
                        .unwrap_or_else(|| config.generation_retry_delay())
                        .min(MAX_RETRY_DELAY);
                    tracing::debug!(error = %e, ?delay, "retrying question generation");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    match fallback.pick(&avoid, request.question_number) {
        Some(question) => FetchOutcome::Question {
            question,
            origin: QuestionOrigin::Fallback,
            requests_made,
        },
        None => {
            tracing::warn!(
                session_id = %request.session_id,
                "fallback pool exhausted, no more questions this session"
            );
            FetchOutcome::Exhausted { requests_made }
        }
    }
}
