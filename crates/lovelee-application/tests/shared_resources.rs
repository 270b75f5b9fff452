mod common;

use chrono::NaiveDate;

use lovelee_application::special_dates::{days_until, years_together};
use lovelee_application::NoteFilter;
use lovelee_core::config::LoveleeConfig;
use lovelee_core::gift::{GiftTransactionStatus, NewGift};
use lovelee_core::note::NewNote;
use lovelee_core::store::{collections, DocumentStore, Query};

use common::{harness, harness_with};

fn gift(hearts: i64) -> NewGift {
    NewGift {
        gift_id: "bear".into(),
        emoji: "🧸".into(),
        label: "Teddy".into(),
        hearts,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_hearts_never_negative() {
    let h = harness();
    h.register("a", "Alice").await;

    let deltas = [-30, -200, 15, -16, 0, 1_000, -2_000, 7];
    let mut expected = 100i64;
    for delta in deltas {
        expected = (expected + delta).max(0);
        let balance = h.app.ledger.adjust_hearts("a", delta).await.unwrap();
        assert!(balance >= 0);
        assert_eq!(balance, expected);
    }
    assert_eq!(h.profile("a").await.hearts, expected);

    let err = h.app.ledger.adjust_hearts("ghost", 5).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_concurrent_adjustments_are_not_lost() {
    let h = harness();
    h.register("a", "Alice").await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let ledger = h.app.ledger.clone();
            tokio::spawn(async move { ledger.adjust_hearts("a", 5).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }
    assert_eq!(h.app.ledger.balance("a").await.unwrap(), 200);
}

#[tokio::test]
async fn test_gift_with_insufficient_balance_writes_nothing() {
    let h = harness();
    let couple = h.couple().await;
    h.app.ledger.adjust_hearts("a", -95).await.unwrap();

    let err = h
        .app
        .gifts
        .send(&couple.id, "a", "b", gift(10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InsufficientHearts");

    assert_eq!(h.app.ledger.balance("a").await.unwrap(), 5);
    assert_eq!(h.app.ledger.balance("b").await.unwrap(), 100);
    assert!(h.app.gifts.received(&couple.id, "b").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_successful_gift_moves_hearts() {
    let h = harness();
    let couple = h.couple().await;

    let receipt = h
        .app
        .gifts
        .send(&couple.id, "a", "b", gift(25))
        .await
        .unwrap();
    assert_eq!(receipt.gift.hearts, 25);
    assert_eq!(h.app.ledger.balance("a").await.unwrap(), 75);
    assert_eq!(h.app.ledger.balance("b").await.unwrap(), 112);

    let inbox = h.app.notifications.list("b", None).await.unwrap();
    assert_eq!(inbox[0].body, "Alice sent you 🧸 Teddy");
    assert_eq!(inbox[0].related_id.as_deref(), Some(receipt.gift.id.as_str()));
}

#[tokio::test]
async fn test_gift_record_failure_refunds_sender() {
    let h = harness();
    let couple = h.couple().await;

    h.store.faults().fail_next_write_to(collections::GIFTS);
    let err = h
        .app
        .gifts
        .send(&couple.id, "a", "b", gift(40))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DataAccess");

    assert_eq!(h.app.ledger.balance("a").await.unwrap(), 100);
    assert_eq!(h.app.ledger.balance("b").await.unwrap(), 100);
    assert!(h.app.gifts.received(&couple.id, "b").await.unwrap().is_empty());

    let transactions = h
        .store
        .query(&Query::collection(collections::GIFT_TRANSACTIONS))
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(
        transactions[0].field("status").and_then(|v| v.as_str()),
        Some(GiftTransactionStatus::RolledBack.as_ref())
    );
}

#[tokio::test]
async fn test_custom_bonus_ratio() {
    let mut config = LoveleeConfig::default();
    config.economy.gift_bonus_ratio = 0.25;
    let h = harness_with(config);
    let couple = h.couple().await;

    let receipt = h
        .app
        .gifts
        .send(&couple.id, "b", "a", gift(10))
        .await
        .unwrap();
    assert_eq!(receipt.receiver_bonus, 2);
    assert_eq!(h.app.ledger.balance("a").await.unwrap(), 102);
}

#[test]
fn test_days_until_and_years_together() {
    let today = date(2024, 6, 15);
    assert_eq!(days_until(date(2020, 6, 15), today), 0);
    assert_eq!(days_until(date(2020, 6, 10), today), 360);
    assert_eq!(days_until(date(2020, 6, 16), today), 1);

    assert_eq!(years_together(date(2020, 6, 15), today), 4);
    assert_eq!(years_together(date(2020, 6, 16), today), 3);
}

#[tokio::test]
async fn test_note_read_lifecycle() {
    let h = harness();
    let couple = h.couple().await;

    let note = h
        .app
        .notes
        .send(&couple.id, "a", "b", NewNote::text("dinner at 8?"))
        .await
        .unwrap();

    let unread = h
        .app
        .notes
        .list(&couple.id, NoteFilter::UnreadFor("b".into()), None)
        .await
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, note.id);

    h.app.notes.mark_read(&couple.id, "b", &note.id).await.unwrap();

    let unread = h
        .app
        .notes
        .list(&couple.id, NoteFilter::UnreadFor("b".into()), None)
        .await
        .unwrap();
    assert!(unread.is_empty());
    let all = h
        .app
        .notes
        .list(&couple.id, NoteFilter::All, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_read);
}

#[tokio::test]
async fn test_concurrent_pet_care_is_not_lost() {
    let h = harness();
    let couple = h.couple().await;

    // Play lowers hunger by 5 each; interleaved commits must all apply.
    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let pet = h.app.pet.clone();
            let couple_id = couple.id.clone();
            let member = if i % 2 == 0 { "a" } else { "b" };
            tokio::spawn(async move { pet.play(&couple_id, member).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let pet = h.app.pet.get_pet(&couple.id).await.unwrap();
    assert_eq!(pet.hunger, 20);
    assert_eq!(pet.happiness, 100);
}

#[tokio::test]
async fn test_unlock_and_gift_share_one_balance() {
    let h = harness();
    let couple = h.couple().await;

    h.app
        .love_zone
        .unlock_item(&couple.id, "a", "lamp", 60)
        .await
        .unwrap();
    let err = h
        .app
        .gifts
        .send(&couple.id, "a", "b", gift(50))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InsufficientHearts");
    assert_eq!(h.app.ledger.balance("a").await.unwrap(), 40);
}

#[tokio::test]
async fn test_notifications_read_state() {
    let h = harness();
    let couple = h.couple().await;
    h.app
        .notes
        .send(&couple.id, "b", "a", NewNote::text("hi"))
        .await
        .unwrap();

    // "a" has the pairing notification plus the note.
    assert_eq!(h.app.notifications.unread_count("a").await.unwrap(), 2);
    let first = h.app.notifications.list("a", Some(1)).await.unwrap();
    h.app.notifications.mark_read("a", &first[0].id).await.unwrap();
    assert_eq!(h.app.notifications.unread_count("a").await.unwrap(), 1);

    assert_eq!(h.app.notifications.mark_all_read("a").await.unwrap(), 1);
    assert_eq!(h.app.notifications.unread_count("a").await.unwrap(), 0);
}
