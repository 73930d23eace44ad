//! Async driver for a [`SessionController`].
//!
//! One task owns the controller and multiplexes the 1-second countdown, user
//! commands, the in-flight question fetch, and the fade/next-question
//! deadlines. Each event is applied to the draft as a single step.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::config::ExamConfig;
use crate::generation::{
    fetch_next_question, FallbackPool, FetchContext, FetchOutcome, QuestionOrigin,
};
use crate::model::Question;
use crate::session::{AttemptDraft, Selection, SessionController, SubmitReason, TickOutcome};
use crate::traits::QuestionGenerator;

/// User input delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Answer { question_index: usize, option: usize },
    AnswerCurrent(usize),
    Navigate(usize),
    Submit,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Submitted {
        draft: AttemptDraft,
        reason: SubmitReason,
    },
    /// The command channel closed before submission.
    Abandoned { draft: AttemptDraft },
    /// A remote call rejected the user's credential.
    SignedOut,
}

/// Receives session events for display.
pub trait SessionReporter: Send + Sync {
    fn on_question(&self, index: usize, question: &Question, origin: QuestionOrigin);
    fn on_answer(&self, index: usize, question: &Question, option: usize, correct: bool);
    /// An answer command that did not record anything.
    fn on_rejected(&self, index: usize, selection: Selection);
    fn on_tick(&self, remaining_secs: u32, warning: bool);
    fn on_exhausted(&self);
    fn on_submitted(&self, reason: SubmitReason, draft: &AttemptDraft);
}

/// Reporter that ignores every event.
pub struct NoopReporter;

impl SessionReporter for NoopReporter {
    fn on_question(&self, _: usize, _: &Question, _: QuestionOrigin) {}
    fn on_answer(&self, _: usize, _: &Question, _: usize, _: bool) {}
    fn on_rejected(&self, _: usize, _: Selection) {}
    fn on_tick(&self, _: u32, _: bool) {}
    fn on_exhausted(&self) {}
    fn on_submitted(&self, _: SubmitReason, _: &AttemptDraft) {}
}

pub struct SessionRunner {
    generator: Option<Arc<dyn QuestionGenerator>>,
    fallback: Arc<FallbackPool>,
}

type PendingFetch = Option<BoxFuture<'static, FetchOutcome>>;

async fn poll_fetch(pending: &mut PendingFetch) -> FetchOutcome {
    match pending {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl SessionRunner {
    pub fn new(generator: Option<Arc<dyn QuestionGenerator>>, fallback: FallbackPool) -> Self {
        Self {
            generator,
            fallback: Arc::new(fallback),
        }
    }

    /// Start a fetch if the controller wants one.
    fn start_fetch(&self, controller: &mut SessionController) -> PendingFetch {
        let request = controller.begin_loading()?;
        let ctx = FetchContext {
            generator: self.generator.clone(),
            fallback: Arc::clone(&self.fallback),
            request,
            requests_remaining: controller.requests_remaining(),
            config: controller.config().exam.clone(),
        };
        Some(fetch_next_question(ctx).boxed())
    }

    /// Drive the session until it is submitted, abandoned, or signed out.
    ///
    /// A fetch still in flight when the session ends is dropped.
    pub async fn run(
        &self,
        mut controller: SessionController,
        mut commands: mpsc::Receiver<SessionCommand>,
        reporter: &dyn SessionReporter,
    ) -> SessionOutcome {
        controller.start();
        if let Some((index, question)) = controller.current_question() {
            reporter.on_question(index, question, QuestionOrigin::Static);
        }

        let exam = controller.config().exam.clone();
        let mut pending = self.start_fetch(&mut controller);
        let mut fade: Option<(Instant, usize)> = None;
        let mut load_at: Option<Instant> = None;

        let second = Duration::from_secs(1);
        let mut ticker = interval_at(Instant::now() + second, second);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("command channel closed, abandoning session");
                        return SessionOutcome::Abandoned { draft: controller.into_draft() };
                    };
                    match command {
                        SessionCommand::Submit => {
                            if let Some(reason) = controller.submit(SubmitReason::UserRequested) {
                                break reason;
                            }
                        }
                        SessionCommand::Navigate(index) => {
                            if controller.navigate(index) {
                                if let Some((index, question)) = controller.current_question() {
                                    reporter.on_question(index, question, QuestionOrigin::Static);
                                }
                            }
                        }
                        SessionCommand::Answer { question_index, option } => {
                            self.answer(
                                &mut controller,
                                question_index,
                                option,
                                reporter,
                                &mut fade,
                                &mut load_at,
                                &exam,
                            );
                        }
                        SessionCommand::AnswerCurrent(option) => {
                            let index = controller.current_index();
                            self.answer(
                                &mut controller,
                                index,
                                option,
                                reporter,
                                &mut fade,
                                &mut load_at,
                                &exam,
                            );
                        }
                    }
                }

                outcome = poll_fetch(&mut pending) => {
                    pending = None;
                    match outcome {
                        FetchOutcome::Question { question, origin, requests_made } => {
                            if controller.append_question(question, origin, requests_made) {
                                if let Some((index, question)) = controller.current_question() {
                                    reporter.on_question(index, question, origin);
                                }
                            }
                        }
                        FetchOutcome::Exhausted { requests_made } => {
                            controller.mark_exhausted(requests_made);
                            reporter.on_exhausted();
                        }
                        FetchOutcome::Unauthorized { .. } => {
                            return SessionOutcome::SignedOut;
                        }
                    }
                }

                _ = sleep_until_opt(fade.map(|(at, _)| at)) => {
                    if let Some((_, index)) = fade.take() {
                        controller.complete_fade(index);
                        let cursor = controller.current_index();
                        if !controller.is_continuous() && !controller.is_answered(cursor) {
                            if let Some((index, question)) = controller.current_question() {
                                reporter.on_question(index, question, QuestionOrigin::Static);
                            }
                        }
                    }
                }

                _ = sleep_until_opt(load_at) => {
                    load_at = None;
                    if pending.is_none() {
                        pending = self.start_fetch(&mut controller);
                    }
                }

                _ = ticker.tick() => {
                    match controller.tick() {
                        TickOutcome::Running { remaining_secs } => {
                            reporter.on_tick(remaining_secs, controller.is_time_warning());
                        }
                        TickOutcome::Expired => break SubmitReason::TimerExpired,
                        TickOutcome::Ignored => {}
                    }
                }
            }
        };

        drop(pending);
        let draft = controller.into_draft();
        reporter.on_submitted(reason, &draft);
        SessionOutcome::Submitted { draft, reason }
    }

    #[allow(clippy::too_many_arguments)]
    fn answer(
        &self,
        controller: &mut SessionController,
        index: usize,
        option: usize,
        reporter: &dyn SessionReporter,
        fade: &mut Option<(Instant, usize)>,
        load_at: &mut Option<Instant>,
        exam: &ExamConfig,
    ) {
        let correct = match controller.select_answer(index, option) {
            Selection::Recorded { correct } => correct,
            rejected => {
                reporter.on_rejected(index, rejected);
                return;
            }
        };
        if let Some(question) = controller.draft().questions.get(index) {
            reporter.on_answer(index, question, option, correct);
        }
        let now = Instant::now();
        *fade = Some((now + exam.lock_fade(), index));
        if controller.is_continuous() && !controller.is_exhausted() {
            *load_at = Some(now + exam.next_question_delay());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionConfig, SessionMode};
    use crate::traits::{GenerateQuestionRequest, GenerateQuestionResponse, GeneratedQuestion};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Returns the same text on every call.
    struct Repeating {
        calls: AtomicU32,
    }

    #[async_trait]
    impl QuestionGenerator for Repeating {
        fn name(&self) -> &str {
            "repeating"
        }

        async fn generate(
            &self,
            _request: &GenerateQuestionRequest,
        ) -> anyhow::Result<GenerateQuestionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerateQuestionResponse {
                success: true,
                questions: vec![GeneratedQuestion {
                    question: Some("Always the same".into()),
                    options: json!(["a", "b"]),
                    answer: json!(0),
                    ..Default::default()
                }],
            })
        }
    }

    /// Never answers.
    struct Stalled;

    #[async_trait]
    impl QuestionGenerator for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn generate(
            &self,
            _request: &GenerateQuestionRequest,
        ) -> anyhow::Result<GenerateQuestionResponse> {
            std::future::pending().await
        }
    }

    fn question(text: &str) -> Question {
        Question {
            id: None,
            text: text.into(),
            options: vec!["x".into(), "y".into()],
            correct_index: 0,
            category: "Clerical Ability".into(),
            difficulty: None,
            explanation: None,
        }
    }

    fn config(minutes: f64, mode: SessionMode) -> SessionConfig {
        SessionConfig {
            name: "runner".into(),
            time_limit_minutes: minutes,
            is_mock_exam: false,
            mode,
            exam: ExamConfig {
                generation_retry_delay_ms: 10,
                ..Default::default()
            },
        }
    }

    fn continuous() -> SessionMode {
        SessionMode::Continuous {
            categories: vec!["Verbal Ability".into()],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn user_submit_ends_static_session() {
        let runner = SessionRunner::new(None, FallbackPool::builtin());
        let controller = SessionController::new(config(
            5.0,
            SessionMode::Static(vec![question("one"), question("two")]),
        ));
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionCommand::AnswerCurrent(0)).await.unwrap();
        tx.send(SessionCommand::Submit).await.unwrap();

        match runner.run(controller, rx, &NoopReporter).await {
            SessionOutcome::Submitted { draft, reason } => {
                assert_eq!(reason, SubmitReason::UserRequested);
                assert_eq!(draft.answers.len(), 1);
                assert_eq!(draft.questions.len(), 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[derive(Default)]
    struct Rejections(std::sync::Mutex<Vec<(usize, Selection)>>);

    impl SessionReporter for Rejections {
        fn on_question(&self, _: usize, _: &Question, _: QuestionOrigin) {}
        fn on_answer(&self, _: usize, _: &Question, _: usize, _: bool) {}
        fn on_rejected(&self, index: usize, selection: Selection) {
            self.0.lock().unwrap().push((index, selection));
        }
        fn on_tick(&self, _: u32, _: bool) {}
        fn on_exhausted(&self) {}
        fn on_submitted(&self, _: SubmitReason, _: &AttemptDraft) {}
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_answers_are_reported() {
        let runner = SessionRunner::new(None, FallbackPool::builtin());
        let controller = SessionController::new(config(
            5.0,
            SessionMode::Static(vec![question("one"), question("two")]),
        ));
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionCommand::AnswerCurrent(7)).await.unwrap();
        tx.send(SessionCommand::AnswerCurrent(0)).await.unwrap();
        // Still fading.
        tx.send(SessionCommand::AnswerCurrent(1)).await.unwrap();
        tx.send(SessionCommand::Submit).await.unwrap();

        let reporter = Rejections::default();
        let outcome = runner.run(controller, rx, &reporter).await;
        let SessionOutcome::Submitted { draft, .. } = outcome else {
            panic!("session was not submitted");
        };
        assert_eq!(draft.answers.len(), 1);
        assert_eq!(draft.answers[&0], 0);
        assert_eq!(
            *reporter.0.lock().unwrap(),
            vec![(0, Selection::Ignored), (0, Selection::Ignored)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expiry_submits_with_fetch_in_flight() {
        let runner = SessionRunner::new(Some(Arc::new(Stalled)), FallbackPool::builtin());
        let controller = SessionController::new(config(1.0, continuous()));
        let (_tx, rx) = mpsc::channel(8);

        match runner.run(controller, rx, &NoopReporter).await {
            SessionOutcome::Submitted { draft, reason } => {
                assert_eq!(reason, SubmitReason::TimerExpired);
                assert!(draft.questions.is_empty());
                assert_eq!(draft.remaining_secs, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_session_never_repeats_text() {
        let generator = Arc::new(Repeating {
            calls: AtomicU32::new(0),
        });
        let runner = SessionRunner::new(Some(generator.clone()), FallbackPool::builtin());
        let controller = SessionController::new(config(2.0, continuous()));
        let (tx, rx) = mpsc::channel(8);

        let driver = tokio::spawn(async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_secs(3)).await;
                tx.send(SessionCommand::AnswerCurrent(0)).await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(3)).await;
            tx.send(SessionCommand::Submit).await.unwrap();
        });

        let outcome = runner.run(controller, rx, &NoopReporter).await;
        driver.await.unwrap();

        let SessionOutcome::Submitted { draft, .. } = outcome else {
            panic!("session was not submitted");
        };
        assert_eq!(draft.questions.len(), 5);
        let mut texts: Vec<_> = draft.questions.iter().map(|q| q.text.to_lowercase()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), 5);
        assert_eq!(draft.origins[0], QuestionOrigin::Generated);
        assert!(draft.origins[1..].iter().all(|o| *o == QuestionOrigin::Fallback));
        assert_eq!(draft.generation_counter, generator.calls.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_abandons() {
        let runner = SessionRunner::new(None, FallbackPool::builtin());
        let controller =
            SessionController::new(config(5.0, SessionMode::Static(vec![question("one")])));
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        assert!(matches!(
            runner.run(controller, rx, &NoopReporter).await,
            SessionOutcome::Abandoned { .. }
        ));
    }
}
