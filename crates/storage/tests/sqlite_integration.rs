use std::sync::Arc;

use coach_core::model::{ExamResult, ProgressFlag, ProgressFlags};
use coach_core::time::fixed_now;
use storage::repository::{KvRepository, ProgressStore};
use storage::{SqliteRepository, keys};

#[tokio::test]
async fn sqlite_blob_round_trip_and_overwrite() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.get("missing").await.unwrap().is_none());

    repo.put("k", r#"{"a":1}"#).await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some(r#"{"a":1}"#));

    // Upsert overwrites in place.
    repo.put("k", r#"{"a":2}"#).await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some(r#"{"a":2}"#));

    repo.delete("k").await.unwrap();
    assert!(repo.get("k").await.unwrap().is_none());

    // Deleting a missing key is not an error.
    repo.delete("k").await.unwrap();
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    repo.put("k", "v").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn progress_store_merges_and_persists_over_sqlite() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    // A blob written by an older build, missing most keys.
    repo.put(keys::COURSE_PROGRESS, r#"{"m2_pronunciation_completed":true}"#)
        .await
        .unwrap();

    let store = ProgressStore::new(Arc::new(repo));
    let mut flags = store.load_course_progress().await.unwrap();
    assert!(flags.m2_pronunciation_completed);
    assert!(!flags.exam_phrases_passed);

    flags.set(ProgressFlag::ExamPhrasesPassed, true);
    store.save_course_progress(&flags).await.unwrap();

    let reloaded = store.load_course_progress().await.unwrap();
    assert!(reloaded.m2_pronunciation_completed);
    assert!(reloaded.exam_phrases_passed);
    assert_eq!(reloaded, flags);
}

#[tokio::test]
async fn exam_result_blob_round_trips() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_exam?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    let store = ProgressStore::new(Arc::new(repo));

    assert!(
        store
            .load_exam_result(keys::EXAM_FINAL_RESULT)
            .await
            .unwrap()
            .is_none()
    );

    let result = ExamResult {
        full_name: "Ana Díaz".into(),
        score: 85.0,
        correct_answers: 17,
        total_questions: 20,
        completed_at: fixed_now(),
    };
    store
        .save_exam_result(keys::EXAM_FINAL_RESULT, &result)
        .await
        .unwrap();

    let loaded = store
        .load_exam_result(keys::EXAM_FINAL_RESULT)
        .await
        .unwrap()
        .expect("stored result");
    assert_eq!(loaded, result);
    assert!(loaded.passed());
}

#[tokio::test]
async fn default_flags_when_store_is_empty() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_empty?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    let store = ProgressStore::new(Arc::new(repo));

    let flags = store.load_course_progress().await.unwrap();
    assert_eq!(flags, ProgressFlags::default());
}
