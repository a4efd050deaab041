//! Pre-authentication compositions: staging, exactly-once flush, failure.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{account, codec, journal, RecordingAuth, CountingLocator, CountingStore};
use hw_core::NO_LOCATION_SAVED;
use hw_embed::EmbeddingClient;
use hw_journal::{AuthProvider, FlushOutcome, OpenedEntry, PendingEntry, PendingState, SaveOutcome};
use hw_store::{slots, JsonSlotStore, LocalStore, MemorySlotStore};

#[tokio::test]
async fn unauthenticated_save_stages_then_flushes_once() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots.clone(), auth.clone(), EmbeddingClient::disabled());

    let outcome = j.save("Draft text", None).await.unwrap();
    assert!(matches!(outcome, SaveOutcome::Staged));
    assert_eq!(auth.sign_ins(), 1, "sign-in initiated");
    assert_eq!(store.inserts(), 0, "no remote write while signed out");
    assert_eq!(j.pending_state(), PendingState::Staged(PendingEntry::new("Draft text")));
    assert!(slots.get(slots::PENDING_ENTRY).unwrap().is_some());

    auth.inner.complete_sign_in(account()).unwrap();
    let flushed = j.on_session_changed(auth.inner.current_account()).await;

    let Some(FlushOutcome::Flushed(entry)) = flushed else {
        panic!("expected flush, got {flushed:?}");
    };
    assert_eq!(store.inserts(), 1);
    assert_eq!(entry.location, NO_LOCATION_SAVED);
    assert_eq!(entry.word_count, 2);
    let session = j.session().unwrap();
    assert_eq!(codec().decrypt(&entry.encrypted_content, session.secret()).unwrap(), "Draft text");
    assert_eq!(j.pending_state(), PendingState::Idle);
    assert!(slots.get(slots::PENDING_ENTRY).unwrap().is_none());
}

#[tokio::test]
async fn session_watch_triggers_flush() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = Arc::new(journal(store.clone(), slots, auth.clone(), EmbeddingClient::disabled()));

    j.save("Draft text", None).await.unwrap();
    let watcher = tokio::spawn(j.clone().watch_sessions());
    tokio::task::yield_now().await;

    auth.inner.complete_sign_in(account()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.inserts() == 0 || j.pending_state() != PendingState::Idle {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("flush after sign-in");

    assert_eq!(store.inserts(), 1);
    watcher.abort();
}

#[tokio::test]
async fn concurrent_triggers_write_at_most_once() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::slow(Duration::from_millis(100)));
    let j = journal(store.clone(), slots, auth.clone(), EmbeddingClient::disabled());

    j.save("only once", None).await.unwrap();

    let (a, b, c) = tokio::join!(
        j.on_session_changed(Some(account())),
        j.on_session_changed(Some(account())),
        j.on_session_changed(Some(account())),
    );

    let flushed = [a, b, c]
        .into_iter()
        .flatten()
        .filter(|o| matches!(o, FlushOutcome::Flushed(_)))
        .count();
    assert_eq!(flushed, 1);
    assert_eq!(store.inserts(), 1);

    // a later trigger finds nothing staged
    let later = j.on_session_changed(Some(account())).await;
    assert!(matches!(later, Some(FlushOutcome::NothingStaged)));
    assert_eq!(store.inserts(), 1);
}

#[tokio::test]
async fn failed_flush_restages_without_retry() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    store.fail_writes.store(true, Ordering::SeqCst);
    let j = journal(store.clone(), slots.clone(), auth.clone(), EmbeddingClient::disabled());

    j.save("keep me", None).await.unwrap();
    let outcome = j.on_session_changed(Some(account())).await;
    assert!(matches!(outcome, Some(FlushOutcome::Failed(_))));
    assert_eq!(j.pending_state(), PendingState::Staged(PendingEntry::new("keep me")));
    assert!(slots.get(slots::PENDING_ENTRY).unwrap().is_some(), "slot kept on failure");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.inserts(), 1, "no automatic retry");

    store.fail_writes.store(false, Ordering::SeqCst);
    let retried = j.flush_pending().await.unwrap();
    assert!(matches!(retried, FlushOutcome::Flushed(_)));
    assert_eq!(store.inner.len(), 1);
    assert!(slots.get(slots::PENDING_ENTRY).unwrap().is_none());
}

#[tokio::test]
async fn reconciled_entry_never_carries_location() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let locator = Arc::new(CountingLocator::new("Lisbon"));
    let j = journal(store.clone(), slots, auth.clone(), EmbeddingClient::disabled())
        .with_locator(locator.clone(), Duration::from_secs(5));
    j.set_location_enabled(true).unwrap();

    j.save("before sign-in", None).await.unwrap();
    let Some(FlushOutcome::Flushed(entry)) = j.on_session_changed(Some(account())).await else {
        panic!("expected flush");
    };
    assert_eq!(entry.location, NO_LOCATION_SAVED);
    assert_eq!(locator.calls(), 0, "no lookup for reconciled entries");

    // a regular save with the preference on does record it
    let SaveOutcome::Saved(direct) = j.save("after sign-in", None).await.unwrap() else {
        panic!("expected save");
    };
    assert_eq!(direct.location, "Lisbon");
    assert_eq!(locator.calls(), 1);
}

#[tokio::test]
async fn staged_edit_updates_in_place() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth.clone(), EmbeddingClient::disabled());

    j.on_session_changed(Some(account())).await;
    let SaveOutcome::Saved(original) = j.save("first version", None).await.unwrap() else {
        panic!("expected save");
    };
    j.on_session_changed(None).await;

    let opened = OpenedEntry {
        id: original.id,
        content: "first version".into(),
    };
    assert!(matches!(j.save("second version", Some(&opened)).await.unwrap(), SaveOutcome::Staged));

    j.on_session_changed(Some(account())).await;
    assert_eq!(store.inserts(), 1);
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);

    let listed = j.load_entries().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "second version");
}

#[tokio::test]
async fn staged_entry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slots.json");
    let store = Arc::new(CountingStore::default());

    {
        let slots: Arc<dyn LocalStore> = Arc::new(JsonSlotStore::open(&path).unwrap());
        let auth = Arc::new(RecordingAuth::open(slots.clone()));
        let j = journal(store.clone(), slots, auth, EmbeddingClient::disabled());
        j.save("written offline", None).await.unwrap();
    }

    let slots: Arc<dyn LocalStore> = Arc::new(JsonSlotStore::open(&path).unwrap());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    auth.inner.complete_sign_in(account()).unwrap();
    let j = journal(store.clone(), slots, auth, EmbeddingClient::disabled());
    assert_eq!(j.pending_state(), PendingState::Staged(PendingEntry::new("written offline")));

    let started = j.start().await;
    assert!(matches!(started, Some(FlushOutcome::Flushed(_))));
    assert_eq!(store.inserts(), 1);
}

#[tokio::test]
async fn new_entry_discards_staged() {
    let slots: Arc<dyn LocalStore> = Arc::new(MemorySlotStore::new());
    let auth = Arc::new(RecordingAuth::open(slots.clone()));
    let store = Arc::new(CountingStore::default());
    let j = journal(store.clone(), slots, auth, EmbeddingClient::disabled());

    j.save("never mind", None).await.unwrap();
    j.new_entry().unwrap();

    let outcome = j.on_session_changed(Some(account())).await;
    assert!(matches!(outcome, Some(FlushOutcome::NothingStaged)));
    assert_eq!(store.inserts(), 0);
}
