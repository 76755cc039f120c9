use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

//
// ─── NORMALIZATION ─────────────────────────────────────────────────────────────
//

/// Normalizes free text for comparison: casefold, strip diacritics,
/// map non-alphanumerics to spaces, collapse runs of whitespace, trim.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
#[must_use]
pub fn normalize(s: &str) -> String {
    let stripped: String = s
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(s: &str) -> Vec<String> {
    normalize(s)
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

//
// ─── SIMILARITY ────────────────────────────────────────────────────────────────
//

const TOKEN_WEIGHT: f64 = 0.8;
const PREFIX_DIVISOR: f64 = 20.0;
const PREFIX_BONUS_CAP: f64 = 0.3;

/// Bag-of-words similarity between a spoken/typed answer and the
/// expected phrase, in `[0, 1]`.
///
/// Token overlap (hits over the longer side) carries 0.8 of the score;
/// a shared leading prefix of the normalized strings adds up to 0.3.
/// No edit distance and no phonetic matching.
#[must_use]
pub fn similarity(user: &str, expected: &str) -> f64 {
    let a = tokens(user);
    let b = tokens(expected);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let hits = a.iter().filter(|t| set_b.contains(t.as_str())).count();

    #[allow(clippy::cast_precision_loss)]
    let token_score = hits as f64 / a.len().max(b.len()) as f64;

    #[allow(clippy::cast_precision_loss)]
    let prefix = common_prefix_len(&normalize(user), &normalize(expected)) as f64;
    let prefix_score = (prefix / PREFIX_DIVISOR).min(PREFIX_BONUS_CAP);

    (token_score * TOKEN_WEIGHT + prefix_score).clamp(0.0, 1.0)
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Qualitative band for a similarity score. Display strings are the
/// Spanish coaching labels shown to the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeLabel {
    Excellent,
    VeryGood,
    AlmostRepeat,
    PracticeMore,
}

impl GradeLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GradeLabel::Excellent => "Excelente",
            GradeLabel::VeryGood => "Muy bien",
            GradeLabel::AlmostRepeat => "Casi. Repite",
            GradeLabel::PracticeMore => "Practica más",
        }
    }
}

impl std::fmt::Display for GradeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one grading call. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeResult {
    pub ok: bool,
    pub score: f64,
    pub label: GradeLabel,
}

/// Grades a user answer against the expected phrase.
///
/// Bands: >= 0.90 Excellent (pass), >= 0.75 Very good (pass),
/// >= 0.60 "Almost, repeat" (fail), else "Practice more" (fail).
#[must_use]
pub fn grade(user: &str, expected: &str) -> GradeResult {
    let score = similarity(user, expected);
    let (ok, label) = if score >= 0.90 {
        (true, GradeLabel::Excellent)
    } else if score >= 0.75 {
        (true, GradeLabel::VeryGood)
    } else if score >= 0.60 {
        (false, GradeLabel::AlmostRepeat)
    } else {
        (false, GradeLabel::PracticeMore)
    };

    GradeResult { ok, score, label }
}

//
// ─── TOKEN DIFF ────────────────────────────────────────────────────────────────
//

/// Which expected words the student missed and which extra words they said.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenDiff {
    pub missing: Vec<String>,
    pub excess: Vec<String>,
}

/// Order-preserving set difference of the normalized token bags.
#[must_use]
pub fn diff_tokens(user: &str, expected: &str) -> TokenDiff {
    let u = tokens(user);
    let e = tokens(expected);
    let set_u: HashSet<&str> = u.iter().map(String::as_str).collect();
    let set_e: HashSet<&str> = e.iter().map(String::as_str).collect();

    TokenDiff {
        missing: e
            .iter()
            .filter(|w| !set_u.contains(w.as_str()))
            .cloned()
            .collect(),
        excess: u
            .iter()
            .filter(|w| !set_e.contains(w.as_str()))
            .cloned()
            .collect(),
    }
}
