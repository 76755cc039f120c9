use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use coach_core::model::content::{
    ContentError, PhraseCard, Question, Roleplay, Signal, normalize_questions,
};

use crate::error::ContentStoreError;

const PHRASES_BANK: &str = "module2_phrases.json";
const SIGNALS_BANK: &str = "module3_signals.json";
const ROLEPLAYS_BANK: &str = "module4_roleplays.json";
const EXAM_M2_BANK: &str = "exam_m2.json";
const EXAM_SIGNALS_BANK: &str = "exam_signals.json";
const EXAM_FINAL_BANK: &str = "exam_final.json";

/// Reads the static JSON lesson banks from a content directory.
///
/// Banks are parsed defensively (missing fields get fallbacks), but an
/// empty or unreadable bank is a hard error: there is nothing to teach.
#[derive(Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_raw(&self, name: &str) -> Result<serde_json::Value, ContentStoreError> {
        let path = self.dir.join(name);
        debug!(path = %path.display(), "loading content bank");
        let raw = fs::read_to_string(&path).map_err(|source| ContentStoreError::Io {
            name: name.to_owned(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            ContentStoreError::Content(ContentError::Malformed {
                name: name.to_owned(),
                detail: err.to_string(),
            })
        })
    }

    fn parse_bank<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Vec<T>, ContentStoreError> {
        let raw = self.read_raw(name)?;
        let items: Vec<T> = serde_json::from_value(raw).map_err(|err| {
            ContentStoreError::Content(ContentError::Malformed {
                name: name.to_owned(),
                detail: err.to_string(),
            })
        })?;
        if items.is_empty() {
            return Err(ContentError::EmptyBank {
                name: name.to_owned(),
            }
            .into());
        }
        Ok(items)
    }

    fn question_bank(&self, name: &str) -> Result<Vec<Question>, ContentStoreError> {
        let raw = self.read_raw(name)?;
        let questions = normalize_questions(&raw);
        if questions.is_empty() {
            return Err(ContentError::EmptyBank {
                name: name.to_owned(),
            }
            .into());
        }
        Ok(questions)
    }

    /// Inspector/driver phrase cards for the phrase and pronunciation
    /// modules.
    ///
    /// # Errors
    ///
    /// Returns `ContentStoreError` if the bank is unreadable or empty.
    pub fn phrases(&self) -> Result<Vec<PhraseCard>, ContentStoreError> {
        self.parse_bank(PHRASES_BANK)
    }

    /// # Errors
    ///
    /// Returns `ContentStoreError` if the bank is unreadable or empty.
    pub fn signals(&self) -> Result<Vec<Signal>, ContentStoreError> {
        self.parse_bank(SIGNALS_BANK)
    }

    /// # Errors
    ///
    /// Returns `ContentStoreError` if the bank is unreadable or empty.
    pub fn roleplays(&self) -> Result<Vec<Roleplay>, ContentStoreError> {
        self.parse_bank(ROLEPLAYS_BANK)
    }

    /// Question bank for the phrase practice exam.
    ///
    /// # Errors
    ///
    /// Returns `ContentStoreError` if the bank is unreadable or empty.
    pub fn exam_m2(&self) -> Result<Vec<Question>, ContentStoreError> {
        self.question_bank(EXAM_M2_BANK)
    }

    /// Question bank for the signals practice exam.
    ///
    /// # Errors
    ///
    /// Returns `ContentStoreError` if the bank is unreadable or empty.
    pub fn exam_signals(&self) -> Result<Vec<Question>, ContentStoreError> {
        self.question_bank(EXAM_SIGNALS_BANK)
    }

    /// Question bank for the certifying final exam.
    ///
    /// # Errors
    ///
    /// Returns `ContentStoreError` if the bank is unreadable or empty.
    pub fn exam_final(&self) -> Result<Vec<Question>, ContentStoreError> {
        self.question_bank(EXAM_FINAL_BANK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_content_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("coach-content-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_and_normalizes_a_question_bank() {
        let dir = temp_content_dir("bank");
        fs::write(
            dir.join(EXAM_FINAL_BANK),
            r#"{ "questions": [ { "type": "fill", "question": "I ___ a license", "answer": "have" } ] }"#,
        )
        .unwrap();

        let store = ContentStore::new(&dir);
        let questions = store.exam_final().unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id(), "q-1");
    }

    #[test]
    fn empty_bank_is_an_error() {
        let dir = temp_content_dir("empty");
        fs::write(dir.join(EXAM_M2_BANK), "[]").unwrap();

        let store = ContentStore::new(&dir);
        match store.exam_m2() {
            Err(ContentStoreError::Content(ContentError::EmptyBank { name })) => {
                assert_eq!(name, EXAM_M2_BANK);
            }
            other => panic!("expected EmptyBank, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let store = ContentStore::new(temp_content_dir("missing"));
        assert!(matches!(
            store.phrases(),
            Err(ContentStoreError::Io { .. })
        ));
    }

    #[test]
    fn phrase_bank_tolerates_sparse_entries() {
        let dir = temp_content_dir("sparse");
        fs::write(
            dir.join(PHRASES_BANK),
            r#"[ { "id": "p1", "inspector_en": "License please" } ]"#,
        )
        .unwrap();

        let store = ContentStore::new(&dir);
        let cards = store.phrases().unwrap();
        assert_eq!(cards[0].inspector_en, "License please");
        assert!(cards[0].driver_en.is_empty());
    }
}
