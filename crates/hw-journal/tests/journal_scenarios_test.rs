//! End-to-end journal flows over the in-memory store.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{account, codec, journal, RecordingAuth, CountingStore, TableEmbedder};
use hw_core::{DECRYPTION_FAILED_PLACEHOLDER, LIST_DECRYPTION_FAILED_PLACEHOLDER, NO_LOCATION_SAVED};
use hw_crypto::{content_hash, AccountKeySource, KeySource};
use hw_embed::EmbeddingClient;
use hw_journal::{AuthProvider, PendingState, SaveOutcome, TeardownGapDetector};
use hw_store::{JsonSlotStore, LocalStore, MemorySlotStore};

fn vectors() -> EmbeddingClient {
    let table: HashMap<String, Vec<f32>> = [
        ("one", vec![1.0, 0.0]),
        ("two", vec![1.0, 0.1]),
        ("three", vec![1.0, 0.2]),
        ("four", vec![1.0, 0.3]),
        ("five", vec![1.0, 0.4]),
        ("unrelated", vec![0.0, 1.0]),
        ("morning", vec![1.0, 0.0]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    EmbeddingClient::new(Arc::new(TableEmbedder(table)))
}

#[tokio::test]
async fn authenticated_save_without_location() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth, EmbeddingClient::disabled());
    j.on_session_changed(Some(account())).await;
    assert!(!j.location_enabled().unwrap());

    let SaveOutcome::Saved(entry) = j.save("Hello world", None).await.unwrap() else {
        panic!("expected save");
    };

    assert_eq!(store.inserts(), 1);
    assert_eq!(entry.location, NO_LOCATION_SAVED);
    assert_eq!(entry.word_count, 2);
    assert_eq!(entry.content_hash.as_deref(), Some(content_hash("Hello world").as_str()));
    assert!(!entry.encrypted_content.contains("Hello"));

    let secret = AccountKeySource.derive("user-1", "one@example.com");
    assert_eq!(codec().decrypt(&entry.encrypted_content, &secret).unwrap(), "Hello world");
}

#[tokio::test]
async fn search_tolerates_one_corrupted_row() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth, vectors());
    j.on_session_changed(Some(account())).await;

    let mut saved = Vec::new();
    for text in ["one", "two", "three", "four", "five", "unrelated"] {
        let SaveOutcome::Saved(e) = j.save(text, None).await.unwrap() else {
            panic!("expected save");
        };
        saved.push(e);
    }

    // row 3 now holds ciphertext under someone else's key
    let foreign = AccountKeySource.derive("intruder", "x@example.com");
    let mut corrupted = saved[2].clone();
    corrupted.encrypted_content = codec().encrypt("three", &foreign).unwrap();
    store.inner.put_raw(corrupted).unwrap();

    let hits = j.search("morning").await.unwrap();
    let contents: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["one", "two", DECRYPTION_FAILED_PLACEHOLDER, "four", "five"]
    );
    assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn list_marks_undecryptable_rows() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth, EmbeddingClient::disabled());
    j.on_session_changed(Some(account())).await;

    let SaveOutcome::Saved(good) = j.save("readable", None).await.unwrap() else {
        panic!("expected save");
    };
    let SaveOutcome::Saved(mut bad) = j.save("soon broken", None).await.unwrap() else {
        panic!("expected save");
    };
    bad.encrypted_content = "bm90IGEgcmVhbCBibG9i".into();
    store.inner.put_raw(bad.clone()).unwrap();

    let listed = j.load_entries().await.unwrap();
    assert_eq!(listed.len(), 2);
    let by_id = |id: uuid::Uuid| listed.iter().find(|h| h.entry.id == id).unwrap();
    assert_eq!(by_id(good.id).content, "readable");
    assert_eq!(by_id(bad.id).content, LIST_DECRYPTION_FAILED_PLACEHOLDER);
}

#[tokio::test]
async fn entries_are_scoped_to_owner() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth, vectors());

    j.on_session_changed(Some(account())).await;
    j.save("one", None).await.unwrap();

    j.on_session_changed(Some(hw_journal::Account {
        id: "user-2".into(),
        email: "two@example.com".into(),
    }))
    .await;
    assert!(j.load_entries().await.unwrap().is_empty());
    assert!(j.search("morning").await.unwrap().is_empty());
    assert_eq!(j.delete_all_entries().await.unwrap(), 0);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn draft_cleared_on_quick_reload_kept_on_fresh_visit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slots.json");
    let slots: Arc<dyn LocalStore> = Arc::new(JsonSlotStore::open(&path).unwrap());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let j = journal(Arc::new(CountingStore::default()), slots.clone(), auth, EmbeddingClient::disabled());

    j.edit("half a thought", None).unwrap();
    let detector = TeardownGapDetector::new(slots.clone());

    // fresh visit long after the last teardown
    detector.record_teardown_at(0).unwrap();
    assert_eq!(j.restore_draft(&detector).unwrap().as_deref(), Some("half a thought"));

    // immediate reload
    detector.record_teardown().unwrap();
    assert!(j.restore_draft(&detector).unwrap().is_none());

    let reopened = JsonSlotStore::open(&path).unwrap();
    assert!(reopened.get(hw_store::slots::DRAFT).unwrap().is_none());
}

#[tokio::test]
async fn signed_in_edit_inserts_and_leaves_original_intact() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth, EmbeddingClient::disabled());
    j.on_session_changed(Some(account())).await;

    let SaveOutcome::Saved(first) = j.save("first version", None).await.unwrap() else {
        panic!("expected save");
    };
    let opened = j.open_entry(first.id).await.unwrap();
    let SaveOutcome::Saved(second) = j.save("second version", Some(&opened)).await.unwrap() else {
        panic!("expected save");
    };

    assert_eq!(store.inserts(), 2);
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    assert_ne!(second.id, first.id);

    let rows = store.inner.all();
    assert_eq!(rows.len(), 2);
    let original = rows.iter().find(|r| r.id == first.id).unwrap();
    assert_eq!(original, &first, "written entry is never modified");
    assert_eq!(j.open_entry(first.id).await.unwrap().content, "first version");
}

#[tokio::test]
async fn delete_account_wipes_remote_and_local_state() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots.clone(), auth.clone(), EmbeddingClient::disabled());

    auth.inner.complete_sign_in(account()).unwrap();
    j.start().await;
    j.save("kept remotely", None).await.unwrap();
    j.set_location_enabled(true).unwrap();

    // leave a composition staged behind a failing write
    store.fail_writes.store(true, Ordering::SeqCst);
    j.on_session_changed(None).await;
    j.save("staged offline", None).await.unwrap();
    j.on_session_changed(Some(account())).await;
    assert!(matches!(j.pending_state(), PendingState::Staged(_)));
    store.fail_writes.store(false, Ordering::SeqCst);

    j.edit("unsaved words", None).unwrap();

    assert_eq!(j.delete_account().await.unwrap(), 1);

    assert!(store.inner.is_empty());
    for slot in [
        hw_store::slots::PENDING_ENTRY,
        hw_store::slots::DRAFT,
        hw_store::slots::LOCATION_ENABLED,
        hw_store::slots::SESSION,
    ] {
        assert!(slots.get(slot).unwrap().is_none(), "slot {slot} survived");
    }
    assert_eq!(j.pending_state(), PendingState::Idle);
    assert!(j.session().is_none());
    assert!(auth.inner.current_account().is_none());
}
