use serde::{Deserialize, Serialize};

//
// ─── COURSE PROGRESS FLAGS ─────────────────────────────────────────────────────
//

/// Flat record of course completion flags, persisted as one JSON blob.
///
/// Every field defaults to `false` and is marked `#[serde(default)]`, so a
/// blob written by an older build merges cleanly over the defaults when new
/// flags are added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProgressFlags {
    // Learning modules
    #[serde(default)]
    pub m1_phrases_completed: bool,
    #[serde(default)]
    pub m2_pronunciation_completed: bool,
    #[serde(default)]
    pub m3_signals_completed: bool,
    #[serde(default)]
    pub m4_roleplays_completed: bool,

    // Exams
    #[serde(default)]
    pub exam_phrases_passed: bool,
    #[serde(default)]
    pub exam_signals_passed: bool,
    #[serde(default)]
    pub exam_cert_passed: bool,
}

/// Names one flag so services can mutate a single key at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressFlag {
    M1PhrasesCompleted,
    M2PronunciationCompleted,
    M3SignalsCompleted,
    M4RoleplaysCompleted,
    ExamPhrasesPassed,
    ExamSignalsPassed,
    ExamCertPassed,
}

impl ProgressFlag {
    /// Storage-facing key, matching the persisted field names.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            ProgressFlag::M1PhrasesCompleted => "m1_phrases_completed",
            ProgressFlag::M2PronunciationCompleted => "m2_pronunciation_completed",
            ProgressFlag::M3SignalsCompleted => "m3_signals_completed",
            ProgressFlag::M4RoleplaysCompleted => "m4_roleplays_completed",
            ProgressFlag::ExamPhrasesPassed => "exam_phrases_passed",
            ProgressFlag::ExamSignalsPassed => "exam_signals_passed",
            ProgressFlag::ExamCertPassed => "exam_cert_passed",
        }
    }
}

impl ProgressFlags {
    /// Sets a single flag, leaving every other flag untouched.
    pub fn set(&mut self, flag: ProgressFlag, value: bool) {
        match flag {
            ProgressFlag::M1PhrasesCompleted => self.m1_phrases_completed = value,
            ProgressFlag::M2PronunciationCompleted => self.m2_pronunciation_completed = value,
            ProgressFlag::M3SignalsCompleted => self.m3_signals_completed = value,
            ProgressFlag::M4RoleplaysCompleted => self.m4_roleplays_completed = value,
            ProgressFlag::ExamPhrasesPassed => self.exam_phrases_passed = value,
            ProgressFlag::ExamSignalsPassed => self.exam_signals_passed = value,
            ProgressFlag::ExamCertPassed => self.exam_cert_passed = value,
        }
    }

    #[must_use]
    pub fn get(&self, flag: ProgressFlag) -> bool {
        match flag {
            ProgressFlag::M1PhrasesCompleted => self.m1_phrases_completed,
            ProgressFlag::M2PronunciationCompleted => self.m2_pronunciation_completed,
            ProgressFlag::M3SignalsCompleted => self.m3_signals_completed,
            ProgressFlag::M4RoleplaysCompleted => self.m4_roleplays_completed,
            ProgressFlag::ExamPhrasesPassed => self.exam_phrases_passed,
            ProgressFlag::ExamSignalsPassed => self.exam_signals_passed,
            ProgressFlag::ExamCertPassed => self.exam_cert_passed,
        }
    }

    /// True when all four learning modules are complete.
    #[must_use]
    pub fn learning_modules_completed(&self) -> bool {
        self.m1_phrases_completed
            && self.m2_pronunciation_completed
            && self.m3_signals_completed
            && self.m4_roleplays_completed
    }

    /// True when every prerequisite for the certifying exam is met:
    /// all learning modules plus both practice exams.
    #[must_use]
    pub fn can_take_cert_exam(&self) -> bool {
        self.learning_modules_completed() && self.exam_phrases_passed && self.exam_signals_passed
    }

    /// True when the whole course, including the final exam, is done.
    #[must_use]
    pub fn course_fully_completed(&self) -> bool {
        self.can_take_cert_exam() && self.exam_cert_passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_modules_done() -> ProgressFlags {
        ProgressFlags {
            m1_phrases_completed: true,
            m2_pronunciation_completed: true,
            m3_signals_completed: true,
            m4_roleplays_completed: true,
            ..ProgressFlags::default()
        }
    }

    #[test]
    fn defaults_are_all_false() {
        let p = ProgressFlags::default();
        assert!(!p.learning_modules_completed());
        assert!(!p.can_take_cert_exam());
        assert!(!p.course_fully_completed());
    }

    #[test]
    fn set_touches_only_one_flag() {
        let mut p = all_modules_done();
        p.set(ProgressFlag::ExamPhrasesPassed, true);
        assert!(p.exam_phrases_passed);
        assert!(!p.exam_signals_passed);
        assert!(!p.exam_cert_passed);
        assert!(p.m1_phrases_completed);
    }

    #[test]
    fn cert_exam_needs_all_six_prerequisites() {
        let mut p = all_modules_done();
        p.exam_phrases_passed = true;
        p.exam_signals_passed = false;
        assert!(!p.can_take_cert_exam());

        p.exam_signals_passed = true;
        assert!(p.can_take_cert_exam());

        // Any missing module breaks eligibility again.
        p.m3_signals_completed = false;
        assert!(!p.can_take_cert_exam());
    }

    #[test]
    fn full_completion_requires_final_pass() {
        let mut p = all_modules_done();
        p.exam_phrases_passed = true;
        p.exam_signals_passed = true;
        assert!(!p.course_fully_completed());
        p.set(ProgressFlag::ExamCertPassed, true);
        assert!(p.course_fully_completed());
    }

    #[test]
    fn partial_blob_merges_over_defaults() {
        let p: ProgressFlags = serde_json::from_str(r#"{"m1_phrases_completed":true}"#).unwrap();
        assert!(p.m1_phrases_completed);
        assert!(!p.m2_pronunciation_completed);
        assert!(!p.exam_cert_passed);
    }
}
