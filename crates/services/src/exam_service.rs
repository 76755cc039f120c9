use tracing::info;

use coach_core::Clock;
use coach_core::model::{Answer, ExamResult, ProgressFlag, Question};
use storage::keys;
use storage::repository::ProgressStore;

use crate::error::ExamServiceError;
use crate::progress_service::ProgressService;

/// The three gated exams of the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamKind {
    /// Practice exam over the inspector-phrase module.
    Phrases,
    /// Practice exam over the signals module.
    Signals,
    /// The certifying final exam.
    Final,
}

impl ExamKind {
    #[must_use]
    pub fn storage_key(self) -> &'static str {
        match self {
            ExamKind::Phrases => keys::EXAM_M2_RESULT,
            ExamKind::Signals => keys::EXAM_SIGNALS_RESULT,
            ExamKind::Final => keys::EXAM_FINAL_RESULT,
        }
    }

    fn pass_flag(self) -> ProgressFlag {
        match self {
            ExamKind::Phrases => ProgressFlag::ExamPhrasesPassed,
            ExamKind::Signals => ProgressFlag::ExamSignalsPassed,
            ExamKind::Final => ProgressFlag::ExamCertPassed,
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            ExamKind::Phrases => "Examen de frases con el inspector",
            ExamKind::Signals => "Examen de señales",
            ExamKind::Final => "Examen certificable final",
        }
    }
}

/// Grades submissions, persists results, and advances progress flags.
#[derive(Clone)]
pub struct ExamService {
    store: ProgressStore,
    progress: ProgressService,
    clock: Clock,
}

impl ExamService {
    #[must_use]
    pub fn new(store: ProgressStore, progress: ProgressService, clock: Clock) -> Self {
        Self {
            store,
            progress,
            clock,
        }
    }

    /// Grades a completed exam, stores the result, and sets the pass flag
    /// when the score reaches the threshold.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Exam` if any question is unanswered, or
    /// `ExamServiceError::Storage` if persisting fails. A storage failure
    /// after grading loses the record, never the grading rules.
    pub async fn submit(
        &self,
        kind: ExamKind,
        full_name: &str,
        questions: &[Question],
        answers: &[Option<Answer>],
    ) -> Result<ExamResult, ExamServiceError> {
        let result = ExamResult::from_answers(full_name, questions, answers, self.clock.now())?;

        self.store
            .save_exam_result(kind.storage_key(), &result)
            .await?;
        info!(
            exam = kind.display_name(),
            score = result.score,
            passed = result.passed(),
            "exam submitted"
        );

        if result.passed() {
            self.progress.set_flag(kind.pass_flag(), true).await?;
        }

        Ok(result)
    }

    /// Stored result for an exam, if the student has taken it.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` on a backend failure.
    pub async fn latest_result(
        &self,
        kind: ExamKind,
    ) -> Result<Option<ExamResult>, ExamServiceError> {
        Ok(self.store.load_exam_result(kind.storage_key()).await?)
    }

    /// Re-asserts the pass flag from a stored passing result.
    ///
    /// The app may have been closed between storing the result and flag
    /// write; re-reading repairs that. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` on a backend failure.
    pub async fn reconcile(&self, kind: ExamKind) -> Result<Option<ExamResult>, ExamServiceError> {
        let stored = self.latest_result(kind).await?;
        if let Some(result) = &stored {
            if result.passed() {
                self.progress.set_flag(kind.pass_flag(), true).await?;
            }
        }
        Ok(stored)
    }
}
