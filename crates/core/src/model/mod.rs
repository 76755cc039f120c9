pub mod content;
pub mod exam;
pub mod progress;

pub use content::{
    ContentError, PhraseCard, Question, Roleplay, RoleplayStep, Signal, normalize_questions,
};
pub use exam::{Answer, ExamError, ExamResult, PASS_THRESHOLD, is_answered, score_exam};
pub use progress::{ProgressFlag, ProgressFlags};
