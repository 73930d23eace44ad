//! Attempt scoring.
//!
//! Turns a finished attempt's questions, answers, and per-question verdicts
//! into section percentages, an overall score, and a pass/fail result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::normalize_category;
use crate::model::{
    AnswerOutcome, AttemptResult, Question, QuestionTypeScores, Section, SectionScores,
};

/// `round(part / total * 100)`, or 0 when `total` is 0.
pub fn percentage(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

/// Scored view of a finished attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub score: u32,
    pub result: AttemptResult,
    pub section_scores: SectionScores,
    pub question_type_scores: QuestionTypeScores,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    pub total: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    correct: u32,
    total: u32,
}

/// Score an attempt.
///
/// A question counts as correct only when its verdict in `results` is
/// [`AnswerOutcome::Correct`]; questions without an entry in `answers` are
/// unanswered.
pub fn score_attempt(
    questions: &[Question],
    answers: &BTreeMap<usize, usize>,
    results: &BTreeMap<usize, AnswerOutcome>,
    pass_threshold: u32,
) -> ScoreSummary {
    let mut sections: BTreeMap<Section, Tally> = BTreeMap::new();
    let mut multiple_choice = Tally::default();
    let mut correct = 0u32;
    let mut incorrect = 0u32;

    for (index, question) in questions.iter().enumerate() {
        let is_correct = results.get(&index) == Some(&AnswerOutcome::Correct);
        let tally = sections
            .entry(normalize_category(&question.category))
            .or_default();
        tally.total += 1;
        if question.is_multiple_choice() {
            multiple_choice.total += 1;
        }

        if is_correct {
            correct += 1;
            tally.correct += 1;
            if question.is_multiple_choice() {
                multiple_choice.correct += 1;
            }
        } else if answers.contains_key(&index) {
            incorrect += 1;
        }
    }

    let mut section_scores = SectionScores::default();
    for (section, tally) in &sections {
        section_scores.set(*section, percentage(tally.correct, tally.total));
    }

    let total = questions.len() as u32;
    let score = percentage(correct, total);

    ScoreSummary {
        score,
        result: AttemptResult::from_score(score, pass_threshold),
        section_scores,
        question_type_scores: QuestionTypeScores {
            multiple_choice: percentage(multiple_choice.correct, multiple_choice.total),
            true_false: 0,
            fill_in_blank: 0,
        },
        correct,
        incorrect,
        unanswered: total - correct - incorrect,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(category: &str, correct_index: usize) -> Question {
        Question {
            id: None,
            text: format!("{category} #{correct_index}"),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index,
            category: category.into(),
            difficulty: None,
            explanation: None,
        }
    }

    fn answer_all(questions: &[Question], picks: &[usize]) -> ScoreSummary {
        let mut answers = BTreeMap::new();
        let mut results = BTreeMap::new();
        for (i, (q, pick)) in questions.iter().zip(picks).enumerate() {
            answers.insert(i, *pick);
            results.insert(i, AnswerOutcome::from_correct(q.is_correct(*pick)));
        }
        score_attempt(questions, &answers, &results, 70)
    }

    #[test]
    fn percentage_rounds_and_guards_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn verbal_wrong_numerical_right() {
        let questions = vec![
            question("Verbal Ability", 0),
            question("Verbal Ability", 0),
            question("Numerical Ability", 0),
            question("Numerical Ability", 0),
            question("Numerical Ability", 0),
        ];
        let summary = answer_all(&questions, &[1, 1, 0, 0, 0]);

        assert_eq!(summary.score, 60);
        assert_eq!(summary.result, AttemptResult::Failed);
        assert_eq!(summary.section_scores.verbal, 0);
        assert_eq!(summary.section_scores.numerical, 100);
        assert_eq!(summary.section_scores.clerical, 0);
        assert_eq!(summary.correct, 3);
        assert_eq!(summary.incorrect, 2);
        assert_eq!(summary.unanswered, 0);
        assert_eq!(summary.question_type_scores.multiple_choice, 60);
        assert_eq!(summary.question_type_scores.true_false, 0);
    }

    #[test]
    fn pass_at_threshold() {
        let questions: Vec<Question> = (0..10).map(|_| question("clerical", 2)).collect();
        let summary = answer_all(&questions, &[2, 2, 2, 2, 2, 2, 2, 0, 0, 0]);
        assert_eq!(summary.score, 70);
        assert_eq!(summary.result, AttemptResult::Passed);
        assert_eq!(summary.section_scores.clerical, 70);
    }

    #[test]
    fn unanswered_questions_count_against_score() {
        let questions = vec![
            question("Analytical Ability", 1),
            question("Analytical Ability", 1),
            question("Philippine Constitution", 3),
        ];
        let mut answers = BTreeMap::new();
        let mut results = BTreeMap::new();
        answers.insert(0, 1);
        results.insert(0, AnswerOutcome::Correct);

        let summary = score_attempt(&questions, &answers, &results, 70);
        assert_eq!(summary.score, 33);
        assert_eq!(summary.unanswered, 2);
        assert_eq!(summary.incorrect, 0);
        assert_eq!(summary.section_scores.analytical, 50);
        assert_eq!(summary.section_scores.constitution, 0);
    }

    #[test]
    fn empty_attempt_scores_zero() {
        let summary = score_attempt(&[], &BTreeMap::new(), &BTreeMap::new(), 70);
        assert_eq!(summary.score, 0);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.result, AttemptResult::Failed);
        assert!(summary.section_scores.iter().all(|(_, v)| v == 0));
    }

    #[test]
    fn single_option_question_is_not_multiple_choice() {
        let mut q = question("Verbal Ability", 0);
        q.options = vec!["only".into(), "  ".into()];
        let summary = answer_all(&[q], &[0]);
        assert_eq!(summary.score, 100);
        assert_eq!(summary.question_type_scores.multiple_choice, 0);
    }
}
