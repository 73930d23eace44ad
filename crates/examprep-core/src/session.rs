//! The state machine for one timed attempt.
//!
//! [`SessionController`] is synchronous: every method is one atomic step on
//! the owned [`AttemptDraft`]. Timing and question fetching are driven from
//! outside by [`SessionRunner`](crate::runner::SessionRunner).

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::config::ExamConfig;
use crate::generation::{AvoidList, QuestionOrigin};
use crate::model::{AnswerOutcome, Question};
use crate::traits::GenerateQuestionRequest;

/// Where a session's questions come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMode {
    /// A preloaded question set.
    Static(Vec<Question>),
    /// Questions generated one at a time from these category labels.
    Continuous { categories: Vec<String> },
}

/// Settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display name stored with the attempt.
    pub name: String,
    pub time_limit_minutes: f64,
    pub is_mock_exam: bool,
    pub mode: SessionMode,
    pub exam: ExamConfig,
}

/// The in-progress attempt owned by a session.
#[derive(Debug, Clone)]
pub struct AttemptDraft {
    pub session_id: Uuid,
    pub questions: Vec<Question>,
    /// Origin of each question, parallel to `questions`.
    pub origins: Vec<QuestionOrigin>,
    /// Question index to selected option.
    pub answers: BTreeMap<usize, usize>,
    /// Question index to verdict, set when the answer locks.
    pub results: BTreeMap<usize, AnswerOutcome>,
    pub remaining_secs: u32,
    pub initial_secs: u32,
    /// Generator requests made so far this session.
    pub generation_counter: u32,
    pub avoid_list: AvoidList,
}

impl AttemptDraft {
    fn new(initial_secs: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            questions: Vec::new(),
            origins: Vec::new(),
            answers: BTreeMap::new(),
            results: BTreeMap::new(),
            remaining_secs: initial_secs,
            initial_secs,
            generation_counter: 0,
            avoid_list: AvoidList::new(),
        }
    }

    /// Seconds consumed so far.
    pub fn elapsed_secs(&self) -> u32 {
        self.initial_secs - self.remaining_secs
    }

    fn push(&mut self, question: Question, origin: QuestionOrigin) -> usize {
        self.avoid_list.insert(&question.text);
        self.questions.push(question);
        self.origins.push(origin);
        self.questions.len() - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    /// Waiting for the next generated question.
    Loading,
    Active,
    /// An answer was just recorded and the question is fading.
    Locked { index: usize },
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReason {
    TimerExpired,
    UserRequested,
}

/// Result of selecting an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Recorded { correct: bool },
    /// The question already has an answer; the first one stands.
    AlreadyAnswered,
    /// Not answerable right now, or no such question or option.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_secs: u32 },
    /// The countdown reached zero and the session was submitted by this tick.
    Expired,
    /// The session was already submitted.
    Ignored,
}

pub struct SessionController {
    config: SessionConfig,
    draft: AttemptDraft,
    state: SessionState,
    cursor: usize,
    load_in_flight: bool,
    exhausted: bool,
    submit_reason: Option<SubmitReason>,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        let initial_secs = (config.time_limit_minutes.max(0.0).floor() as u32).saturating_mul(60);
        Self {
            draft: AttemptDraft::new(initial_secs),
            config,
            state: SessionState::Initializing,
            cursor: 0,
            load_in_flight: false,
            exhausted: false,
            submit_reason: None,
        }
    }

    /// Load the static set, or enter `Loading` with no questions in continuous mode.
    pub fn start(&mut self) {
        if self.state != SessionState::Initializing {
            return;
        }
        match &self.config.mode {
            SessionMode::Static(questions) => {
                for question in questions.clone() {
                    self.draft.push(question, QuestionOrigin::Static);
                }
                self.state = SessionState::Active;
            }
            SessionMode::Continuous { .. } => {
                self.state = SessionState::Loading;
            }
        }
        tracing::debug!(
            session_id = %self.draft.session_id,
            questions = self.draft.questions.len(),
            seconds = self.draft.initial_secs,
            "session started"
        );
    }

    /// Record the first answer for `index` and lock the question.
    pub fn select_answer(&mut self, index: usize, option: usize) -> Selection {
        if self.state != SessionState::Active {
            return Selection::Ignored;
        }
        let Some(question) = self.draft.questions.get(index) else {
            return Selection::Ignored;
        };
        if option >= question.options.len() {
            return Selection::Ignored;
        }
        if self.draft.answers.contains_key(&index) {
            return Selection::AlreadyAnswered;
        }

        let correct = question.is_correct(option);
        self.draft.answers.insert(index, option);
        self.draft
            .results
            .insert(index, AnswerOutcome::from_correct(correct));
        self.cursor = index;
        self.state = SessionState::Locked { index };
        tracing::debug!(index, option, correct, "answer locked");
        Selection::Recorded { correct }
    }

    /// Answer the question under the cursor.
    pub fn answer_current(&mut self, option: usize) -> Selection {
        self.select_answer(self.cursor, option)
    }

    /// Move the cursor in a static session. Returns `false` if not allowed.
    pub fn navigate(&mut self, index: usize) -> bool {
        if self.is_continuous()
            || self.state != SessionState::Active
            || index >= self.draft.questions.len()
        {
            return false;
        }
        self.cursor = index;
        true
    }

    /// Finish the fade for `index`. Static sessions move on to the next unanswered question.
    pub fn complete_fade(&mut self, index: usize) {
        if self.state != (SessionState::Locked { index }) {
            return;
        }
        if !self.is_continuous() {
            if let Some(next) = self.next_unanswered(index) {
                self.cursor = next;
            }
        }
        self.state = SessionState::Active;
    }

    fn next_unanswered(&self, after: usize) -> Option<usize> {
        let len = self.draft.questions.len();
        (1..=len)
            .map(|step| (after + step) % len)
            .find(|i| !self.draft.answers.contains_key(i))
    }

    /// Enter `Loading` and build the generator request, unless a load is
    /// already running, generation is exhausted, or the session is static or over.
    pub fn begin_loading(&mut self) -> Option<GenerateQuestionRequest> {
        let SessionMode::Continuous { categories } = &self.config.mode else {
            return None;
        };
        if self.load_in_flight
            || self.exhausted
            || matches!(
                self.state,
                SessionState::Submitted | SessionState::Initializing
            )
        {
            return None;
        }

        self.load_in_flight = true;
        self.state = SessionState::Loading;
        Some(GenerateQuestionRequest {
            categories: categories.clone(),
            avoid_list: self.draft.avoid_list.texts().to_vec(),
            session_id: self.draft.session_id,
            question_number: self.draft.questions.len() as u32 + 1,
        })
    }

    /// Generator calls left under the session-wide cap.
    pub fn requests_remaining(&self) -> u32 {
        self.config
            .exam
            .max_generation_requests
            .saturating_sub(self.draft.generation_counter)
    }

    /// Append a sourced question and make it current. Ignored once submitted.
    pub fn append_question(
        &mut self,
        question: Question,
        origin: QuestionOrigin,
        requests_made: u32,
    ) -> bool {
        if self.state == SessionState::Submitted {
            tracing::debug!("discarding question that arrived after submission");
            return false;
        }
        self.draft.generation_counter += requests_made;
        self.load_in_flight = false;
        self.cursor = self.draft.push(question, origin);
        if !matches!(self.state, SessionState::Locked { .. }) {
            self.state = SessionState::Active;
        }
        true
    }

    /// No more questions can be sourced; the session stays submittable.
    pub fn mark_exhausted(&mut self, requests_made: u32) {
        self.draft.generation_counter += requests_made;
        self.load_in_flight = false;
        self.exhausted = true;
        if self.state == SessionState::Loading {
            self.state = SessionState::Active;
        }
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state == SessionState::Submitted {
            return TickOutcome::Ignored;
        }
        self.draft.remaining_secs = self.draft.remaining_secs.saturating_sub(1);
        if self.draft.remaining_secs == 0 {
            self.submit(SubmitReason::TimerExpired);
            return TickOutcome::Expired;
        }
        TickOutcome::Running {
            remaining_secs: self.draft.remaining_secs,
        }
    }

    /// Enter `Submitted`. Returns `None` if the session was already submitted.
    pub fn submit(&mut self, reason: SubmitReason) -> Option<SubmitReason> {
        if self.state == SessionState::Submitted {
            return None;
        }
        self.state = SessionState::Submitted;
        self.load_in_flight = false;
        self.submit_reason = Some(reason);
        tracing::debug!(
            session_id = %self.draft.session_id,
            ?reason,
            answered = self.draft.answers.len(),
            questions = self.draft.questions.len(),
            "session submitted"
        );
        Some(reason)
    }

    /// Answered questions over total questions, 0 with no questions.
    pub fn progress(&self) -> f64 {
        if self.draft.questions.is_empty() {
            return 0.0;
        }
        self.draft.answers.len() as f64 / self.draft.questions.len() as f64
    }

    /// Advisory flag for the last stretch of the countdown.
    pub fn is_time_warning(&self) -> bool {
        self.draft.initial_secs > 0
            && f64::from(self.draft.remaining_secs)
                <= f64::from(self.draft.initial_secs) * self.config.exam.time_warning_fraction
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_question(&self) -> Option<(usize, &Question)> {
        self.draft.questions.get(self.cursor).map(|q| (self.cursor, q))
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.draft.elapsed_secs()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn submit_reason(&self) -> Option<SubmitReason> {
        self.submit_reason
    }

    pub fn is_submitted(&self) -> bool {
        self.state == SessionState::Submitted
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self.config.mode, SessionMode::Continuous { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.draft.answers.contains_key(&index)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn draft(&self) -> &AttemptDraft {
        &self.draft
    }

    pub fn into_draft(self) -> AttemptDraft {
        self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, correct_index: usize) -> Question {
        Question {
            id: Some(format!("id-{text}")),
            text: text.into(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_index,
            category: "Numerical Ability".into(),
            difficulty: None,
            explanation: None,
        }
    }

    fn static_session(minutes: f64, count: usize) -> SessionController {
        let questions = (0..count).map(|i| question(&format!("q{i}"), 1)).collect();
        let mut controller = SessionController::new(SessionConfig {
            name: "Static".into(),
            time_limit_minutes: minutes,
            is_mock_exam: false,
            mode: SessionMode::Static(questions),
            exam: ExamConfig::default(),
        });
        controller.start();
        controller
    }

    fn continuous_session() -> SessionController {
        let mut controller = SessionController::new(SessionConfig {
            name: "Continuous".into(),
            time_limit_minutes: 5.0,
            is_mock_exam: false,
            mode: SessionMode::Continuous {
                categories: vec!["Verbal Ability".into()],
            },
            exam: ExamConfig::default(),
        });
        controller.start();
        controller
    }

    #[test]
    fn first_answer_is_final() {
        let mut s = static_session(10.0, 3);
        assert_eq!(s.select_answer(0, 1), Selection::Recorded { correct: true });
        assert_eq!(s.select_answer(0, 2), Selection::Ignored);
        s.complete_fade(0);
        assert_eq!(s.select_answer(0, 2), Selection::AlreadyAnswered);
        assert_eq!(s.draft().answers[&0], 1);
        assert_eq!(s.draft().results[&0], AnswerOutcome::Correct);
    }

    #[test]
    fn out_of_range_option_leaves_question_open() {
        let mut s = static_session(10.0, 2);
        assert_eq!(s.select_answer(0, 25), Selection::Ignored);
        assert_eq!(s.select_answer(0, 3), Selection::Ignored);
        assert!(!s.is_answered(0));
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.select_answer(0, 1), Selection::Recorded { correct: true });
        assert_eq!(s.draft().answers[&0], 1);
    }

    #[test]
    fn fade_advances_to_next_unanswered() {
        let mut s = static_session(10.0, 3);
        assert!(s.navigate(1));
        s.answer_current(0);
        s.complete_fade(1);
        assert_eq!(s.current_index(), 2);
        s.answer_current(1);
        s.complete_fade(2);
        assert_eq!(s.current_index(), 0);
        assert!((s.progress() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn timer_starts_from_whole_minutes() {
        let s = static_session(2.7, 1);
        assert_eq!(s.draft().initial_secs, 120);
        assert_eq!(s.draft().remaining_secs, 120);
    }

    #[test]
    fn expiry_submits_exactly_once() {
        let mut s = static_session(1.0, 2);
        for _ in 0..59 {
            assert!(matches!(s.tick(), TickOutcome::Running { .. }));
        }
        assert_eq!(s.tick(), TickOutcome::Expired);
        assert_eq!(s.tick(), TickOutcome::Ignored);
        assert_eq!(s.tick(), TickOutcome::Ignored);
        assert_eq!(s.submit_reason(), Some(SubmitReason::TimerExpired));
        assert_eq!(s.submit(SubmitReason::UserRequested), None);
        assert_eq!(s.elapsed_secs(), 60);
    }

    #[test]
    fn submitted_session_ignores_answers() {
        let mut s = static_session(5.0, 2);
        assert_eq!(
            s.submit(SubmitReason::UserRequested),
            Some(SubmitReason::UserRequested)
        );
        assert_eq!(s.select_answer(0, 1), Selection::Ignored);
        assert!(s.draft().answers.is_empty());
    }

    #[test]
    fn time_warning_at_a_third() {
        let mut s = static_session(1.0, 1);
        for _ in 0..40 {
            s.tick();
        }
        assert!(!s.is_time_warning());
        s.tick();
        s.tick();
        assert_eq!(s.draft().remaining_secs, 18);
        assert!(s.is_time_warning());
    }

    #[test]
    fn continuous_loading_cycle() {
        let mut s = continuous_session();
        assert_eq!(s.state(), SessionState::Loading);
        assert_eq!(s.progress(), 0.0);

        let request = s.begin_loading().expect("first load");
        assert_eq!(request.question_number, 1);
        assert!(request.avoid_list.is_empty());
        assert!(s.begin_loading().is_none());

        assert!(s.append_question(question("first", 0), QuestionOrigin::Generated, 2));
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.draft().generation_counter, 2);
        assert_eq!(s.requests_remaining(), 198);

        s.answer_current(0);
        let request = s.begin_loading().expect("second load");
        assert_eq!(request.question_number, 2);
        assert_eq!(request.avoid_list, vec!["first".to_string()]);
        s.complete_fade(0);
        assert_eq!(s.state(), SessionState::Loading);
    }

    #[test]
    fn late_question_is_discarded() {
        let mut s = continuous_session();
        s.begin_loading();
        s.submit(SubmitReason::TimerExpired);
        assert!(!s.append_question(question("late", 0), QuestionOrigin::Generated, 1));
        assert!(s.draft().questions.is_empty());
    }

    #[test]
    fn exhaustion_stops_loading() {
        let mut s = continuous_session();
        s.begin_loading();
        s.mark_exhausted(1);
        assert!(s.is_exhausted());
        assert_eq!(s.state(), SessionState::Active);
        assert!(s.begin_loading().is_none());
        assert!(s.submit(SubmitReason::UserRequested).is_some());
    }

    #[test]
    fn static_mode_does_not_load() {
        let mut s = static_session(1.0, 1);
        assert!(s.begin_loading().is_none());
        assert!(!s.navigate(5));
    }
}
