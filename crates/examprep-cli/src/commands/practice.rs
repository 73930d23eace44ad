//! The `examprep practice` command.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};
use tokio::sync::mpsc;

use examprep_core::category::normalize_category;
use examprep_core::generation::{FallbackPool, QuestionOrigin};
use examprep_core::model::{AttemptRecord, Question, TestAttempt};
use examprep_core::parser;
use examprep_core::runner::{SessionCommand, SessionOutcome, SessionReporter, SessionRunner};
use examprep_core::session::{
    AttemptDraft, Selection, SessionConfig, SessionController, SessionMode, SubmitReason,
};
use examprep_core::submission::{
    AttemptMetadata, SubmissionObserver, SubmissionPipeline, SubmissionState,
};
use examprep_core::traits::QuestionGenerator;
use examprep_providers::config::load_config_from;
use examprep_providers::{create_api_client, HttpQuestionGenerator};

use super::{format_duration, open_backends, Backends};

const CONTINUOUS_MINUTES: f64 = 30.0;

pub struct PracticeArgs {
    pub bank: Option<PathBuf>,
    pub continuous: bool,
    pub categories: Option<String>,
    pub minutes: Option<f64>,
    pub name: Option<String>,
    pub mock_exam: bool,
    pub store: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

/// Prints the session as it runs.
struct ConsoleReporter {
    current: Arc<AtomicUsize>,
    warned: AtomicBool,
}

impl SessionReporter for ConsoleReporter {
    fn on_question(&self, index: usize, question: &Question, origin: QuestionOrigin) {
        self.current.store(index, Ordering::Relaxed);
        let source = match origin {
            QuestionOrigin::Fallback => " (offline pool)",
            _ => "",
        };
        println!("\nQuestion {} [{}]{source}", index + 1, question.category);
        println!("{}", question.text);
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}) {option}", option_letter(i));
        }
    }

    fn on_answer(&self, _index: usize, question: &Question, _option: usize, correct: bool) {
        if correct {
            println!("Correct!");
        } else {
            let answer = question
                .options
                .get(question.correct_index)
                .map(String::as_str)
                .unwrap_or_default();
            println!(
                "Wrong. The answer is {}) {answer}",
                option_letter(question.correct_index)
            );
        }
        if let Some(explanation) = question.explanation.as_deref().filter(|e| !e.is_empty()) {
            println!("  {explanation}");
        }
    }

    fn on_rejected(&self, index: usize, selection: Selection) {
        if let Some(message) = rejection_message(index, selection) {
            println!("{message}");
        }
    }

    fn on_tick(&self, remaining_secs: u32, warning: bool) {
        if warning && !self.warned.swap(true, Ordering::Relaxed) {
            println!("\n{} remaining!", format_duration(remaining_secs as u64));
        } else if remaining_secs > 0 && remaining_secs % 60 == 0 {
            eprintln!("  [{} left]", format_duration(remaining_secs as u64));
        }
    }

    fn on_exhausted(&self) {
        println!("\nNo more questions are available. Type `submit` to finish.");
    }

    fn on_submitted(&self, reason: SubmitReason, draft: &AttemptDraft) {
        match reason {
            SubmitReason::TimerExpired => println!("\nTime's up!"),
            SubmitReason::UserRequested => println!("\nSubmitted."),
        }
        println!(
            "{} of {} question(s) answered.",
            draft.answers.len(),
            draft.questions.len()
        );
    }
}

struct ConsoleObserver;

impl SubmissionObserver for ConsoleObserver {
    fn on_saved(&self, attempt: &TestAttempt) {
        println!("Attempt saved ({}).", attempt.id);
    }

    fn on_save_error(&self, message: &str) {
        eprintln!("Could not save attempt: {message}");
    }

    fn on_mastery_error(&self, message: &str) {
        eprintln!("Warning: mastery update failed: {message}");
    }

    fn on_auth_failure(&self) {
        eprintln!("Your session has expired. Sign in again to save attempts.");
    }
}

fn rejection_message(index: usize, selection: Selection) -> Option<String> {
    match selection {
        Selection::Recorded { .. } => None,
        Selection::AlreadyAnswered => Some(format!(
            "Question {} is already answered; the first answer stands.",
            index + 1
        )),
        Selection::Ignored => Some(format!(
            "Input ignored for question {}: pick a listed option once the question is shown.",
            index + 1
        )),
    }
}

fn parse_option(input: &str) -> Option<usize> {
    let input = input.trim();
    let mut chars = input.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some((c.to_ascii_lowercase() as u8 - b'a') as usize);
        }
    }
    input.parse::<usize>().ok().filter(|n| *n >= 1).map(|n| n - 1)
}

/// Parse one line of input. `current` is the question on screen.
///
/// Accepts `A`..`Z` or `1`.. for the current question, `3:B` for a given
/// question, `next`, `prev`, `goto N`, and `submit`.
pub(crate) fn parse_command(line: &str, current: usize) -> Option<SessionCommand> {
    let input = line.trim().to_lowercase();
    match input.as_str() {
        "" => return None,
        "submit" => return Some(SessionCommand::Submit),
        "next" => return Some(SessionCommand::Navigate(current + 1)),
        "prev" => return Some(SessionCommand::Navigate(current.saturating_sub(1))),
        _ => {}
    }

    if let Some(target) = input.strip_prefix("goto") {
        let n = target.trim().parse::<usize>().ok().filter(|n| *n >= 1)?;
        return Some(SessionCommand::Navigate(n - 1));
    }

    if let Some((question, option)) = input.split_once(':') {
        let n = question.trim().parse::<usize>().ok().filter(|n| *n >= 1)?;
        return Some(SessionCommand::Answer {
            question_index: n - 1,
            option: parse_option(option)?,
        });
    }

    parse_option(&input).map(SessionCommand::AnswerCurrent)
}

/// Read stdin lines on a plain thread so the runtime never blocks on input.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn forward_input(
    lines: &mut mpsc::UnboundedReceiver<String>,
    commands: mpsc::Sender<SessionCommand>,
    current: &AtomicUsize,
) {
    while let Some(line) = lines.recv().await {
        match parse_command(&line, current.load(Ordering::Relaxed)) {
            Some(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => eprintln!(
                "Unrecognized input {:?}: answer with a letter or number, \
                 or use next, prev, goto N, submit",
                line.trim()
            ),
        }
    }
}

fn print_result(record: &AttemptRecord) {
    println!("\nScore: {}% ({})", record.score, record.result);
    println!(
        "Correct: {}  Wrong: {}  Unanswered: {}  Time: {}",
        record.correct_answers,
        record.incorrect_answers,
        record.unanswered,
        format_duration(record.time_spent_secs as u64)
    );

    let present: BTreeSet<_> = record
        .responses
        .iter()
        .map(|r| normalize_category(&r.question.category))
        .collect();
    if present.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Section", "Score"]);
    for section in present {
        table.add_row(vec![
            Cell::new(section),
            Cell::new(format!("{}%", record.section_scores.get(section))),
        ]);
    }
    println!("{table}");
}

pub async fn execute(args: PracticeArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let (mode, default_name, default_minutes, bank_is_mock) = match &args.bank {
        Some(path) => {
            let bank = parser::parse_bank(path)?;
            for w in parser::validate_bank(&bank) {
                tracing::warn!(question = ?w.question, "{}", w.message);
            }
            anyhow::ensure!(!bank.questions.is_empty(), "bank {} has no questions", bank.id);
            (
                SessionMode::Static(bank.questions),
                bank.name,
                bank.time_limit_minutes,
                bank.is_mock_exam,
            )
        }
        None => {
            anyhow::ensure!(args.continuous, "pass --bank <file> or --continuous");
            let categories: Vec<String> = match &args.categories {
                Some(list) => list
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => config.categories.clone(),
            };
            anyhow::ensure!(!categories.is_empty(), "at least one category is required");
            (
                SessionMode::Continuous { categories },
                "Continuous Practice".to_string(),
                CONTINUOUS_MINUTES,
                false,
            )
        }
    };

    let minutes = args.minutes.unwrap_or(default_minutes);
    anyhow::ensure!(
        minutes.is_finite() && minutes > 0.0,
        "--minutes must be a positive number"
    );
    let name = args.name.unwrap_or(default_name);
    let is_mock_exam = args.mock_exam || bank_is_mock;

    let backends = match open_backends(args.store.as_deref(), &config)? {
        Some(backends) => backends,
        None => {
            eprintln!("No attempt store configured; this attempt will not be kept.");
            Backends::in_memory()
        }
    };

    let generator: Option<Arc<dyn QuestionGenerator>> = match &config.api {
        Some(api) => Some(Arc::new(HttpQuestionGenerator::new(create_api_client(api)?))),
        None => None,
    };
    if matches!(mode, SessionMode::Continuous { .. }) && generator.is_none() {
        eprintln!("No API configured; questions come from the built-in pool.");
    }

    let controller = SessionController::new(SessionConfig {
        name: name.clone(),
        time_limit_minutes: minutes,
        is_mock_exam,
        mode,
        exam: config.exam.clone(),
    });
    println!(
        "{name}: {} on the clock. Type `submit` when done.",
        format_duration(controller.draft().initial_secs as u64)
    );

    let runner = SessionRunner::new(generator, FallbackPool::builtin());
    let current = Arc::new(AtomicUsize::new(0));
    let reporter = ConsoleReporter {
        current: Arc::clone(&current),
        warned: AtomicBool::new(false),
    };

    let mut lines = spawn_stdin_reader();
    let (tx, rx) = mpsc::channel(16);

    let run = runner.run(controller, rx, &reporter);
    tokio::pin!(run);
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = forward_input(&mut lines, tx, &current) => run.await,
    };

    let draft = match outcome {
        SessionOutcome::Submitted { draft, .. } => draft,
        SessionOutcome::Abandoned { .. } => {
            println!("\nSession abandoned; nothing was saved.");
            return Ok(());
        }
        SessionOutcome::SignedOut => {
            anyhow::bail!("signed out: the question service rejected the token")
        }
    };

    let metadata = AttemptMetadata {
        test_name: name,
        is_mock_exam,
        completed_at: Utc::now(),
    };
    let description = backends.description.clone();
    let mut pipeline = SubmissionPipeline::from_draft(
        backends.store,
        backends.mastery,
        &draft,
        &metadata,
        &config.exam,
    );
    print_result(pipeline.record());

    println!("\nSaving to {description}...");
    let observer = ConsoleObserver;
    let mut report = pipeline.submit(&observer).await;
    while matches!(pipeline.state(), SubmissionState::SaveError { .. }) {
        println!("Enter `r` to retry saving, anything else to discard.");
        match lines.recv().await {
            Some(line) if line.trim().eq_ignore_ascii_case("r") => {
                report = pipeline.retry(&observer).await;
            }
            _ => break,
        }
    }

    if report.signed_out && !report.saved {
        anyhow::bail!("signed out: the attempt was not saved");
    }
    if report.mastery.submitted > 0 && report.mastery.error.is_none() {
        tracing::info!(
            questions = report.mastery.submitted,
            skipped = report.mastery.skipped,
            "mastery updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_numbers_answer_current() {
        assert_eq!(parse_command("b", 0), Some(SessionCommand::AnswerCurrent(1)));
        assert_eq!(parse_command(" A ", 3), Some(SessionCommand::AnswerCurrent(0)));
        assert_eq!(parse_command("4", 0), Some(SessionCommand::AnswerCurrent(3)));
        assert_eq!(parse_command("0", 0), None);
    }

    #[test]
    fn explicit_question_answers() {
        assert_eq!(
            parse_command("3:C", 0),
            Some(SessionCommand::Answer {
                question_index: 2,
                option: 2
            })
        );
        assert_eq!(parse_command("0:a", 0), None);
    }

    #[test]
    fn navigation_and_submit() {
        assert_eq!(parse_command("next", 2), Some(SessionCommand::Navigate(3)));
        assert_eq!(parse_command("prev", 0), Some(SessionCommand::Navigate(0)));
        assert_eq!(parse_command("goto 5", 0), Some(SessionCommand::Navigate(4)));
        assert_eq!(parse_command("SUBMIT", 0), Some(SessionCommand::Submit));
        assert_eq!(parse_command("", 0), None);
        assert_eq!(parse_command("hello", 0), None);
    }

    #[test]
    fn rejected_answers_are_explained() {
        assert_eq!(rejection_message(0, Selection::Recorded { correct: true }), None);
        let ignored = rejection_message(2, Selection::Ignored).unwrap();
        assert!(ignored.contains("Input ignored for question 3"));
        let repeated = rejection_message(0, Selection::AlreadyAnswered).unwrap();
        assert!(repeated.contains("first answer stands"));
    }
}
