//! Fixed storage keys. Each blob lives under exactly one of these.

/// Course-wide completion flags (one JSON record of booleans).
pub const COURSE_PROGRESS: &str = "coach:course:progress:v1";

/// Per-card completion map for the phrase module.
pub const M2_PROGRESS: &str = "coach:m2:progress";

/// Furthest-step map for the roleplay module.
pub const ROLEPLAY_PROGRESS: &str = "coach:roleplays:progress";

/// Seen-signal map for the signals module.
pub const M3_SEEN: &str = "coach:m3:seen";

/// Stored result of the phrase practice exam.
pub const EXAM_M2_RESULT: &str = "coach:exam:m2:result";

/// Stored result of the signals practice exam.
pub const EXAM_SIGNALS_RESULT: &str = "coach:exam:signals:result";

/// Stored result of the certifying final exam.
pub const EXAM_FINAL_RESULT: &str = "coach:exam:final:result";
