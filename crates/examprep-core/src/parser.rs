//! TOML question bank parser.
//!
//! Loads static question sets from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::category::{classify_category, MatchKind};
use crate::model::{Difficulty, Question, QuestionBank};

/// Intermediate TOML structure for parsing bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_time_limit")]
    time_limit_minutes: f64,
    #[serde(default)]
    is_mock_exam: bool,
}

fn default_time_limit() -> f64 {
    30.0
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    id: Option<String>,
    text: String,
    options: Vec<String>,
    answer: TomlAnswer,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

fn default_category() -> String {
    "General Information".to_string()
}

/// `answer = 2` or `answer = "C"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlAnswer {
    Index(usize),
    Letter(String),
}

impl TomlAnswer {
    fn resolve(&self, option_count: usize) -> Result<usize> {
        let index = match self {
            TomlAnswer::Index(i) => *i,
            TomlAnswer::Letter(s) => {
                let s = s.trim();
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => {
                        (c.to_ascii_uppercase() as u8 - b'A') as usize
                    }
                    _ => anyhow::bail!("answer must be an index or a single letter, got {s:?}"),
                }
            }
        };
        anyhow::ensure!(
            index < option_count,
            "answer {index} is out of range for {option_count} options"
        );
        Ok(index)
    }
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(n, q)| {
            let label = q.id.clone().unwrap_or_else(|| format!("#{}", n + 1));
            let correct_index = q
                .answer
                .resolve(q.options.len())
                .with_context(|| format!("question {label}"))?;
            let difficulty = q
                .difficulty
                .map(|d| d.parse::<Difficulty>().map_err(|e| anyhow::anyhow!("{e}")))
                .transpose()
                .with_context(|| format!("question {label}"))?;

            Ok(Question {
                id: q.id,
                text: q.text,
                options: q.options,
                correct_index,
                category: q.category,
                difficulty,
                explanation: q.explanation,
            })
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid question in {}", source_path.display()))?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        time_limit_minutes: parsed.bank.time_limit_minutes,
        is_mock_exam: parsed.bank.is_mock_exam,
        questions,
    })
}

/// Recursively load all `.toml` bank files from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
            }
        }
    }

    banks.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(banks)
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Question id, or `#n` for questions without one.
    pub question: Option<String>,
    pub message: String,
}

/// Check a bank for authoring mistakes that still parse.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut seen_texts = HashSet::new();

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            question: None,
            message: "bank has no questions".into(),
        });
    }
    if bank.time_limit_minutes < 1.0 {
        warnings.push(ValidationWarning {
            question: None,
            message: format!(
                "time_limit_minutes {} rounds down to zero seconds",
                bank.time_limit_minutes
            ),
        });
    }

    for (n, q) in bank.questions.iter().enumerate() {
        let label = q.id.clone().unwrap_or_else(|| format!("#{}", n + 1));
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                question: Some(label.clone()),
                message,
            })
        };

        if let Some(id) = &q.id {
            if !seen_ids.insert(id.as_str()) {
                warn(format!("duplicate question id: {id}"));
            }
        }
        if q.text.trim().is_empty() {
            warn("question text is empty".into());
        } else if !seen_texts.insert(q.text.trim().to_lowercase()) {
            warn("duplicate question text".into());
        }
        if q.options.len() < 2 {
            warn(format!("needs at least two options, has {}", q.options.len()));
        }
        if q.options.iter().any(|o| o.trim().is_empty()) {
            warn("has an empty option".into());
        }
        let (section, kind) = classify_category(&q.category);
        if kind == MatchKind::Default {
            warn(format!(
                "category {:?} is not recognized and will count as {section}",
                q.category
            ));
        }
    }

    warnings
}
