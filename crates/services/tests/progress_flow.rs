use std::sync::Arc;

use coach_core::model::ProgressFlag;
use services::ProgressService;
use storage::keys;
use storage::repository::{InMemoryRepository, KvRepository, ProgressStore};

fn service() -> (ProgressService, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    (
        ProgressService::new(ProgressStore::new(repo.clone())),
        repo,
    )
}

#[tokio::test]
async fn set_flag_is_a_pure_merge() {
    let (progress, _) = service();

    progress
        .set_flag(ProgressFlag::M1PhrasesCompleted, true)
        .await
        .unwrap();
    let flags = progress
        .set_flag(ProgressFlag::ExamPhrasesPassed, true)
        .await
        .unwrap();

    assert!(flags.m1_phrases_completed);
    assert!(flags.exam_phrases_passed);
    assert!(!flags.m2_pronunciation_completed);
    assert!(!flags.exam_cert_passed);
}

#[tokio::test]
async fn load_degrades_to_defaults_on_corrupt_blob() {
    let (progress, repo) = service();

    repo.put(keys::COURSE_PROGRESS, "{not json").await.unwrap();
    let flags = progress.load().await;
    assert!(!flags.m1_phrases_completed);
    assert!(!flags.course_fully_completed());
}

#[tokio::test]
async fn module_item_maps_accumulate() {
    let (progress, _) = service();

    progress.mark_phrase_done("p1").await.unwrap();
    let map = progress.mark_phrase_done("p2").await.unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(ProgressService::completion_pct(&map, 4), 50);

    let seen = progress.mark_signal_seen("s1").await.unwrap();
    assert_eq!(seen.len(), 1);

    // Phrase and signal maps live under different keys.
    assert_eq!(progress.item_map(keys::M2_PROGRESS).await.len(), 2);
    assert_eq!(progress.item_map(keys::M3_SEEN).await.len(), 1);
}

#[tokio::test]
async fn roleplay_step_progress_is_monotonic() {
    let (progress, _) = service();

    progress.record_roleplay_step("rp1", 3).await.unwrap();
    let map = progress.record_roleplay_step("rp1", 1).await.unwrap();
    assert_eq!(map.get("rp1"), Some(&3));

    let map = progress.record_roleplay_step("rp1", 5).await.unwrap();
    assert_eq!(map.get("rp1"), Some(&5));
}

#[tokio::test]
async fn reset_returns_everything_to_defaults() {
    let (progress, _) = service();

    progress
        .set_flag(ProgressFlag::ExamCertPassed, true)
        .await
        .unwrap();
    progress.mark_phrase_done("p1").await.unwrap();

    progress.reset().await.unwrap();
    assert!(!progress.load().await.exam_cert_passed);
    assert!(progress.item_map(keys::M2_PROGRESS).await.is_empty());
}
