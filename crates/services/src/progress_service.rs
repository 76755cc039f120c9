use std::collections::HashMap;

use tracing::{info, warn};

use coach_core::model::{ProgressFlag, ProgressFlags};
use storage::keys;
use storage::repository::{ProgressStore, StorageError};

/// Load/merge/save cycle over the course progress blobs.
///
/// Reads degrade to defaults when storage misbehaves (the student keeps
/// practicing; they just lose the shortcut past completed modules), while
/// writes propagate their errors so the caller can tell the user.
#[derive(Clone)]
pub struct ProgressService {
    store: ProgressStore,
}

impl ProgressService {
    #[must_use]
    pub fn new(store: ProgressStore) -> Self {
        Self { store }
    }

    /// Current flags, merged over defaults. Never fails: a broken read
    /// logs and returns the defaults.
    pub async fn load(&self) -> ProgressFlags {
        match self.store.load_course_progress().await {
            Ok(flags) => flags,
            Err(err) => {
                warn!(error = %err, "failed to read course progress, using defaults");
                ProgressFlags::default()
            }
        }
    }

    /// Overwrites the stored blob.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save(&self, flags: &ProgressFlags) -> Result<(), StorageError> {
        self.store.save_course_progress(flags).await
    }

    /// Load, mutate one flag, save, return the updated snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn set_flag(
        &self,
        flag: ProgressFlag,
        value: bool,
    ) -> Result<ProgressFlags, StorageError> {
        let mut flags = self.load().await;
        flags.set(flag, value);
        self.save(&flags).await?;
        info!(flag = flag.key(), value, "progress flag updated");
        Ok(flags)
    }

    /// Clears every stored progress and exam blob (account reset path).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a delete fails.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.store.reset().await
    }

    //
    // ─── PER-MODULE ITEM PROGRESS ──────────────────────────────────────────────
    //

    /// Marks one item (phrase card, signal) done inside a module map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn mark_item(
        &self,
        map_key: &str,
        item_id: &str,
    ) -> Result<HashMap<String, bool>, StorageError> {
        let mut map = self.store.load_item_map(map_key).await.unwrap_or_default();
        map.insert(item_id.to_owned(), true);
        self.store.save_item_map(map_key, &map).await?;
        Ok(map)
    }

    /// Completion percentage for a module given its item map.
    #[must_use]
    pub fn completion_pct(map: &HashMap<String, bool>, total: usize) -> u32 {
        if total == 0 {
            return 0;
        }
        let done = map.values().filter(|v| **v).count();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            (done as f64 / total as f64 * 100.0).round() as u32
        }
    }

    /// Records the furthest step reached in a roleplay. Monotonic: a lower
    /// step never rolls progress back.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn record_roleplay_step(
        &self,
        roleplay_id: &str,
        step: u32,
    ) -> Result<HashMap<String, u32>, StorageError> {
        let mut map = self.store.load_step_map().await.unwrap_or_default();
        let entry = map.entry(roleplay_id.to_owned()).or_insert(0);
        *entry = (*entry).max(step);
        self.store.save_step_map(&map).await?;
        Ok(map)
    }

    /// Item map for a module key, defaulting to empty on a broken read.
    pub async fn item_map(&self, map_key: &str) -> HashMap<String, bool> {
        self.store.load_item_map(map_key).await.unwrap_or_default()
    }

    /// Phrase-module convenience wrapper around [`Self::mark_item`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn mark_phrase_done(
        &self,
        phrase_id: &str,
    ) -> Result<HashMap<String, bool>, StorageError> {
        self.mark_item(keys::M2_PROGRESS, phrase_id).await
    }

    /// Signals-module convenience wrapper around [`Self::mark_item`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn mark_signal_seen(
        &self,
        signal_id: &str,
    ) -> Result<HashMap<String, bool>, StorageError> {
        self.mark_item(keys::M3_SEEN, signal_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_pct_rounds_and_handles_empty() {
        let mut map = HashMap::new();
        assert_eq!(ProgressService::completion_pct(&map, 0), 0);

        map.insert("a".to_owned(), true);
        map.insert("b".to_owned(), false);
        assert_eq!(ProgressService::completion_pct(&map, 3), 33);

        map.insert("b".to_owned(), true);
        map.insert("c".to_owned(), true);
        assert_eq!(ProgressService::completion_pct(&map, 3), 100);
    }
}
