use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::content::Question;

/// Minimum percentage score that passes an exam and advances progress.
pub const PASS_THRESHOLD: f64 = 80.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("question {index} has no answer")]
    Unanswered { index: usize },

    #[error("expected {expected} answers, got {got}")]
    AnswerCountMismatch { expected: usize, got: usize },
}

/// A student's answer to one question, mirroring the question kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Selected option index (multiple choice and audio questions).
    Choice(usize),
    /// Free text for fill-in questions.
    Text(String),
    /// Chunk sequence for ordering questions.
    Order(Vec<String>),
}

/// Whether an answer is complete enough to count as "responded".
///
/// Choice needs a selection, text must be non-blank, and an ordering must
/// place every chunk.
#[must_use]
pub fn is_answered(question: &Question, answer: Option<&Answer>) -> bool {
    match (question, answer) {
        (Question::TranslationMc { .. } | Question::AudioMc { .. }, Some(Answer::Choice(_))) => {
            true
        }
        (Question::Fill { .. }, Some(Answer::Text(text))) => !text.trim().is_empty(),
        (Question::Order { chunks, .. }, Some(Answer::Order(seq))) => seq.len() == chunks.len(),
        _ => false,
    }
}

fn is_correct(question: &Question, answer: &Answer) -> bool {
    match (question, answer) {
        (
            Question::TranslationMc { correct_index, .. } | Question::AudioMc { correct_index, .. },
            Answer::Choice(picked),
        ) => picked == correct_index,
        (Question::Fill { answer: expected, .. }, Answer::Text(text)) => {
            text.trim().to_lowercase() == expected.trim().to_lowercase()
        }
        (Question::Order { answer: expected, .. }, Answer::Order(seq)) => {
            seq.len() == expected.len() && seq.iter().zip(expected).all(|(a, b)| a == b)
        }
        _ => false,
    }
}

/// Scores a finished exam.
///
/// # Errors
///
/// Returns `ExamError::AnswerCountMismatch` if the answer list length does
/// not match the question list, or `ExamError::Unanswered` for the first
/// incomplete answer.
pub fn score_exam(
    questions: &[Question],
    answers: &[Option<Answer>],
) -> Result<(u32, f64), ExamError> {
    if questions.len() != answers.len() {
        return Err(ExamError::AnswerCountMismatch {
            expected: questions.len(),
            got: answers.len(),
        });
    }

    for (index, (q, a)) in questions.iter().zip(answers).enumerate() {
        if !is_answered(q, a.as_ref()) {
            return Err(ExamError::Unanswered { index });
        }
    }

    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| a.as_ref().is_some_and(|a| is_correct(q, a)))
        .count();

    #[allow(clippy::cast_precision_loss)]
    let score = if questions.is_empty() {
        0.0
    } else {
        correct as f64 / questions.len() as f64 * 100.0
    };

    #[allow(clippy::cast_possible_truncation)]
    Ok((correct as u32, score))
}

/// Persisted outcome of an exam submission. Field names keep the camelCase
/// of the original stored blobs so old results still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    #[serde(default)]
    pub full_name: String,
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
}

impl ExamResult {
    /// Builds a result from a completed, validated exam.
    ///
    /// # Errors
    ///
    /// Propagates `ExamError` from [`score_exam`].
    pub fn from_answers(
        full_name: impl Into<String>,
        questions: &[Question],
        answers: &[Option<Answer>],
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ExamError> {
        let (correct_answers, score) = score_exam(questions, answers)?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self {
            full_name: full_name.into(),
            score,
            correct_answers,
            total_questions: questions.len() as u32,
            completed_at,
        })
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.score >= PASS_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn bank() -> Vec<Question> {
        vec![
            Question::TranslationMc {
                id: "q-1".into(),
                question: "What does 'pull over' mean?".into(),
                options: vec!["Orillarse".into(), "Acelerar".into()],
                correct_index: 0,
            },
            Question::Fill {
                id: "q-2".into(),
                question: "I ___ my license".into(),
                answer: "have".into(),
            },
            Question::Order {
                id: "q-3".into(),
                question: "Order the phrase".into(),
                chunks: vec!["I".into(), "understand".into(), "officer".into()],
                answer: vec!["I".into(), "understand".into(), "officer".into()],
            },
        ]
    }

    fn all_correct() -> Vec<Option<Answer>> {
        vec![
            Some(Answer::Choice(0)),
            Some(Answer::Text(" HAVE ".into())),
            Some(Answer::Order(vec![
                "I".into(),
                "understand".into(),
                "officer".into(),
            ])),
        ]
    }

    #[test]
    fn perfect_exam_scores_one_hundred() {
        let result =
            ExamResult::from_answers("Juan Pérez", &bank(), &all_correct(), fixed_now()).unwrap();
        assert_eq!(result.correct_answers, 3);
        assert_eq!(result.total_questions, 3);
        assert!((result.score - 100.0).abs() < f64::EPSILON);
        assert!(result.passed());
    }

    #[test]
    fn fill_comparison_is_case_insensitive_and_trimmed() {
        let questions = bank();
        let mut answers = all_correct();
        answers[1] = Some(Answer::Text("Have".into()));
        let (correct, _) = score_exam(&questions, &answers).unwrap();
        assert_eq!(correct, 3);
    }

    #[test]
    fn order_requires_exact_sequence() {
        let questions = bank();
        let mut answers = all_correct();
        answers[2] = Some(Answer::Order(vec![
            "officer".into(),
            "I".into(),
            "understand".into(),
        ]));
        let (correct, score) = score_exam(&questions, &answers).unwrap();
        assert_eq!(correct, 2);
        assert!(score < PASS_THRESHOLD);
    }

    #[test]
    fn unanswered_question_is_rejected() {
        let questions = bank();
        let mut answers = all_correct();
        answers[1] = Some(Answer::Text("   ".into()));
        assert_eq!(
            score_exam(&questions, &answers),
            Err(ExamError::Unanswered { index: 1 })
        );
    }

    #[test]
    fn incomplete_order_counts_as_unanswered() {
        let questions = bank();
        let mut answers = all_correct();
        answers[2] = Some(Answer::Order(vec!["I".into()]));
        assert_eq!(
            score_exam(&questions, &answers),
            Err(ExamError::Unanswered { index: 2 })
        );
    }

    #[test]
    fn stored_camel_case_blob_round_trips() {
        let json = r#"{"fullName":"Ana","score":80.0,"correctAnswers":4,"totalQuestions":5,"completedAt":"2023-11-14T22:13:20Z"}"#;
        let result: ExamResult = serde_json::from_str(json).unwrap();
        assert!(result.passed());
        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["correctAnswers"], 4);
    }
}
