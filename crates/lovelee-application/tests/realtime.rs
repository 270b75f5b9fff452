mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use lovelee_application::{NoteFilter, StateCache};
use lovelee_core::couple::Couple;
use lovelee_core::note::{NewNote, Note};

use common::harness;

const WAIT: Duration = Duration::from_secs(2);

fn contents(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|n| n.content.as_str()).collect()
}

#[tokio::test]
async fn test_note_feed_delivers_full_result_sets() {
    let h = harness();
    let couple = h.couple().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = h
        .app
        .notes
        .subscribe(&couple.id, NoteFilter::All, move |notes| {
            let _ = tx.send(notes);
        })
        .await
        .unwrap();

    let initial = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert!(initial.is_empty());

    h.app
        .notes
        .send(&couple.id, "a", "b", NewNote::text("first"))
        .await
        .unwrap();
    let snapshot = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(contents(&snapshot), ["first"]);

    h.app
        .notes
        .send(&couple.id, "b", "a", NewNote::text("second"))
        .await
        .unwrap();
    let snapshot = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(contents(&snapshot), ["second", "first"]);
}

#[tokio::test]
async fn test_unread_feed_drains_on_read() {
    let h = harness();
    let couple = h.couple().await;
    let note = h
        .app
        .notes
        .send(&couple.id, "a", "b", NewNote::text("ping"))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = h
        .app
        .notes
        .subscribe(&couple.id, NoteFilter::UnreadFor("b".into()), move |notes| {
            let _ = tx.send(notes.len());
        })
        .await
        .unwrap();
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(1));

    h.app.notes.mark_read(&couple.id, "b", &note.id).await.unwrap();
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let h = harness();
    let couple = h.couple().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = h
        .app
        .notes
        .subscribe(&couple.id, NoteFilter::All, move |notes| {
            let _ = tx.send(notes.len());
        })
        .await
        .unwrap();
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(0));

    subscription.unsubscribe();
    h.app
        .notes
        .send(&couple.id, "a", "b", NewNote::text("unheard"))
        .await
        .unwrap();

    let next = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(!matches!(next, Ok(Some(_))));
}

#[tokio::test]
async fn test_cache_follows_subscription() {
    let h = harness();
    let couple = h.couple().await;

    let cache: StateCache<Vec<Note>> = StateCache::new(Vec::new());
    let _subscription = h
        .app
        .notes
        .subscribe(&couple.id, NoteFilter::All, cache.sink())
        .await
        .unwrap();
    let mut changes = cache.changed();
    assert!(cache.current().is_empty());

    h.app
        .notes
        .send(&couple.id, "a", "b", NewNote::text("hello"))
        .await
        .unwrap();
    timeout(WAIT, changes.changed()).await.unwrap().unwrap();
    assert_eq!(contents(&cache.current()), ["hello"]);
    assert!(!cache.is_optimistic());

    // Local edit shows until the store's next delivery replaces it.
    cache.apply_optimistic(|notes| notes.clear());
    assert!(cache.is_optimistic());
    assert!(cache.current().is_empty());
    changes.borrow_and_update();

    h.app
        .notes
        .send(&couple.id, "b", "a", NewNote::text("hi back"))
        .await
        .unwrap();
    timeout(WAIT, changes.changed()).await.unwrap().unwrap();
    assert_eq!(contents(&cache.current()), ["hi back", "hello"]);
    assert!(!cache.is_optimistic());
}

#[tokio::test]
async fn test_couple_watch_sees_disconnect() {
    let h = harness();
    let couple = h.couple().await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Option<Couple>>();
    let _subscription = h
        .app
        .pairing
        .subscribe_couple(&couple.id, move |couple| {
            let _ = tx.send(couple);
        })
        .await
        .unwrap();

    let initial = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(initial.map(|c| c.id), Some(couple.id.clone()));

    h.app.pairing.disconnect(&couple.id).await.unwrap();
    let after = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert!(after.is_none());

    let a = h.profile("a").await;
    let b = h.profile("b").await;
    assert!(a.couple_id.is_none() && b.couple_id.is_none());
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    use lovelee_application::Lovelee;
    use lovelee_core::config::LoveleeConfig;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    {
        let app = Lovelee::open(LoveleeConfig::default(), path.clone())
            .await
            .unwrap();
        app.profiles
            .create_profile("a", common::new_profile("Alice"))
            .await
            .unwrap();
    }

    let reopened = Lovelee::open(LoveleeConfig::default(), path)
        .await
        .unwrap();
    let alice = reopened.profiles.get_profile("a").await.unwrap().unwrap();
    assert_eq!(alice.display_name, "Alice");
    let found = reopened
        .profiles
        .find_by_invite_code(&alice.invite_code)
        .await
        .unwrap();
    assert_eq!(found.map(|p| p.id), Some("a".to_string()));
}

#[tokio::test]
async fn test_bootstrap_reads_config_and_snapshot() {
    use lovelee_application::Lovelee;
    use lovelee_core::config::LoveleeConfig;
    use lovelee_infrastructure::{ConfigService, LoveleePaths};

    let dir = tempfile::tempdir().unwrap();
    let paths = LoveleePaths::new(Some(dir.path())).unwrap();
    let mut config = LoveleeConfig::default();
    config.economy.starting_hearts = 50;
    ConfigService::from_paths(&paths).save(&config).unwrap();

    {
        let app = Lovelee::bootstrap(Some(dir.path())).await.unwrap();
        let alice = app
            .profiles
            .create_profile("a", common::new_profile("Alice"))
            .await
            .unwrap();
        assert_eq!(alice.hearts, 50);
    }

    assert!(paths.snapshot_file().exists());
    let app = Lovelee::bootstrap(Some(dir.path())).await.unwrap();
    assert_eq!(app.ledger.balance("a").await.unwrap(), 50);
}
