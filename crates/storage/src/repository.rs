use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use coach_core::model::{ExamResult, ProgressFlags};

use crate::keys;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Key-value contract for persisted JSON blobs.
///
/// Every persisted record in the app is one JSON document under one fixed
/// key (see [`crate::keys`]); adapters only move opaque strings.
#[async_trait]
pub trait KvRepository: Send + Sync {
    /// Fetch the blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store (insert or overwrite) the blob under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the blob under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvRepository for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Connection("poisoned lock".into()))?;
        Ok(blobs.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Connection("poisoned lock".into()))?;
        blobs.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Connection("poisoned lock".into()))?;
        blobs.remove(key);
        Ok(())
    }
}

/// Aggregate handle the services layer receives.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KvRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryRepository::new()),
        }
    }
}

/// Typed view over the key-value store for progress and exam records.
///
/// Deserialization merges over defaults: fields missing from an old blob
/// come back as their `Default` values, so adding flags later is safe.
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KvRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KvRepository>) -> Self {
        Self { kv }
    }

    async fn get_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StorageError> {
        match self.kv.get(key).await? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|err| StorageError::Serialization(err.to_string()))
            }
            None => Ok(T::default()),
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.kv.put(key, &raw).await
    }

    /// Course flags merged over defaults; absent blob yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or parse failure.
    pub async fn load_course_progress(&self) -> Result<ProgressFlags, StorageError> {
        self.get_json(keys::COURSE_PROGRESS).await
    }

    /// Overwrites the whole flags blob.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_course_progress(&self, flags: &ProgressFlags) -> Result<(), StorageError> {
        self.put_json(keys::COURSE_PROGRESS, flags).await
    }

    /// Per-item boolean map for a module (completed phrase cards, seen signals).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or parse failure.
    pub async fn load_item_map(&self, key: &str) -> Result<HashMap<String, bool>, StorageError> {
        self.get_json(key).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_item_map(
        &self,
        key: &str,
        map: &HashMap<String, bool>,
    ) -> Result<(), StorageError> {
        self.put_json(key, map).await
    }

    /// Furthest-step-per-roleplay map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or parse failure.
    pub async fn load_step_map(&self) -> Result<HashMap<String, u32>, StorageError> {
        self.get_json(keys::ROLEPLAY_PROGRESS).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_step_map(&self, map: &HashMap<String, u32>) -> Result<(), StorageError> {
        self.put_json(keys::ROLEPLAY_PROGRESS, map).await
    }

    /// Stored exam result under a fixed per-exam key, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or parse failure.
    pub async fn load_exam_result(&self, key: &str) -> Result<Option<ExamResult>, StorageError> {
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| StorageError::Serialization(err.to_string())),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_exam_result(
        &self,
        key: &str,
        result: &ExamResult,
    ) -> Result<(), StorageError> {
        self.put_json(key, result).await
    }

    /// Full reset: removes every known progress and exam blob.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any delete fails.
    pub async fn reset(&self) -> Result<(), StorageError> {
        for key in [
            keys::COURSE_PROGRESS,
            keys::M2_PROGRESS,
            keys::ROLEPLAY_PROGRESS,
            keys::M3_SEEN,
            keys::EXAM_M2_RESULT,
            keys::EXAM_SIGNALS_RESULT,
            keys::EXAM_FINAL_RESULT,
        ] {
            self.kv.delete(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::model::ProgressFlag;

    #[tokio::test]
    async fn flags_round_trip_through_kv() {
        let store = ProgressStore::new(Arc::new(InMemoryRepository::new()));
        let mut flags = store.load_course_progress().await.unwrap();
        assert_eq!(flags, ProgressFlags::default());

        flags.set(ProgressFlag::M1PhrasesCompleted, true);
        store.save_course_progress(&flags).await.unwrap();

        let loaded = store.load_course_progress().await.unwrap();
        assert!(loaded.m1_phrases_completed);
        assert!(!loaded.exam_cert_passed);
    }

    #[tokio::test]
    async fn old_blob_with_subset_of_keys_merges_over_defaults() {
        let repo = InMemoryRepository::new();
        repo.put(keys::COURSE_PROGRESS, r#"{"m4_roleplays_completed":true}"#)
            .await
            .unwrap();

        let store = ProgressStore::new(Arc::new(repo));
        let flags = store.load_course_progress().await.unwrap();
        assert!(flags.m4_roleplays_completed);
        assert!(!flags.m1_phrases_completed);
    }

    #[tokio::test]
    async fn reset_clears_all_blobs() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = ProgressStore::new(repo.clone());

        let mut flags = ProgressFlags::default();
        flags.set(ProgressFlag::ExamCertPassed, true);
        store.save_course_progress(&flags).await.unwrap();
        store.reset().await.unwrap();

        assert!(repo.get(keys::COURSE_PROGRESS).await.unwrap().is_none());
        assert_eq!(
            store.load_course_progress().await.unwrap(),
            ProgressFlags::default()
        );
    }
}
