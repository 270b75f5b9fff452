//! Gifts.
//!
//! Sending runs as a two-step transaction recorded in `giftTransactions`:
//!
//! 1. debit the sender (rejecting below zero) and write the transaction as
//!    `pending`, in one batch;
//! 2. write the gift record and mark the transaction `committed`, in one batch.
//!
//! If step 2 fails the sender is refunded and the transaction marked
//! `rolledBack`, again in one batch. Both follow-ups are guarded by the
//! transaction version, so a refund and a commit can never both happen. A
//! transaction left `pending` by a crash is rolled back by
//! [`GiftService::recover_pending`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::gift::{
    Gift, GiftCount, GiftReceipt, GiftTransaction, GiftTransactionStatus, NewGift,
};
use lovelee_core::notification::NotificationKind;
use lovelee_core::store::{collections, encode, fields, Floor, Query, Subscription, Versioned, WriteBatch};

use crate::context::{new_id, CoreContext};
use crate::ledger::{debit, insufficient_or, HEARTS_FIELD};
use crate::notes::ensure_partner;
use crate::notifications::NotificationService;

const TIMED_OUT: &str = "timed out while pending";

#[derive(Clone)]
pub struct GiftService {
    ctx: CoreContext,
    notifications: NotificationService,
}

impl GiftService {
    pub fn new(ctx: CoreContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    /// Sends `gift` from `sender_id` to their partner.
    ///
    /// The sender pays the full cost; the receiver is credited
    /// `floor(cost * ratio)` once the gift is recorded. A failure to credit
    /// the receiver is logged and reported as a zero bonus.
    pub async fn send(
        &self,
        couple_id: &str,
        sender_id: &str,
        receiver_id: &str,
        gift: NewGift,
    ) -> Result<GiftReceipt> {
        gift.validate()?;
        let couple = self.ctx.require_member(couple_id, sender_id).await?;
        ensure_partner(&couple, sender_id, receiver_id)?;

        let transaction = GiftTransaction {
            id: new_id(),
            couple_id: couple_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            gift_record_id: new_id(),
            gift: gift.clone(),
            status: GiftTransactionStatus::Pending,
            failure: None,
            created_at: None,
            updated_at: None,
        };

        let sender_balance = self.begin(&transaction).await?;

        let record = Gift {
            id: transaction.gift_record_id.clone(),
            couple_id: couple_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            gift_id: gift.gift_id.clone(),
            emoji: gift.emoji.clone(),
            label: gift.label.clone(),
            hearts: gift.hearts,
            created_at: None,
        };
        let commit = WriteBatch::new()
            .create(collections::GIFTS, &record.id, encode(&record)?)
            .update_if_version(
                collections::GIFT_TRANSACTIONS,
                &transaction.id,
                1,
                status_fields(GiftTransactionStatus::Committed, None),
            );

        if let Err(e) = self.ctx.store.commit(commit).await {
            tracing::warn!(
                transaction_id = %transaction.id,
                error = %e,
                "Gift write failed after debit, refunding sender"
            );
            self.roll_back(&transaction, 1, &e.to_string()).await;
            return Err(e);
        }
        tracing::info!(
            couple_id,
            sender_id,
            receiver_id,
            gift_id = %gift.gift_id,
            hearts = gift.hearts,
            "Gift sent"
        );

        let receiver_bonus = self.credit_receiver(receiver_id, &gift).await;

        self.notifications
            .notify_from(
                sender_id,
                receiver_id,
                NotificationKind::Gift {
                    emoji: gift.emoji.clone(),
                    label: gift.label.clone(),
                    hearts: gift.hearts,
                },
                Some(record.id.clone()),
                None,
            )
            .await;

        let gift = self
            .ctx
            .require::<Gift>(collections::GIFTS, "Gift", &record.id)
            .await?
            .value;
        Ok(GiftReceipt {
            gift,
            sender_balance,
            receiver_bonus,
        })
    }

    /// Rolls back every transaction still pending after the configured
    /// timeout, refunding its sender. Returns how many were rolled back.
    pub async fn recover_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::seconds(self.ctx.config.gifts.pending_timeout_secs);
        let query = Query::collection(collections::GIFT_TRANSACTIONS)
            .where_eq("status", GiftTransactionStatus::Pending.as_ref());
        let pending = self.ctx.store.query(&query).await?;

        let mut recovered = 0;
        for document in pending {
            let transaction: Versioned<GiftTransaction> = document.decode_versioned()?;
            let stale = transaction
                .value
                .created_at
                .is_none_or(|created_at| created_at <= cutoff);
            if !stale {
                continue;
            }
            if self
                .roll_back(&transaction.value, transaction.version, TIMED_OUT)
                .await
            {
                recovered += 1;
            }
        }

        if recovered > 0 {
            tracing::info!(recovered, "Rolled back stale gift transactions");
        }
        Ok(recovered)
    }

    /// Gifts `user_id` received in the couple, newest first.
    pub async fn received(&self, couple_id: &str, user_id: &str) -> Result<Vec<Gift>> {
        self.ctx
            .list(&self.query(couple_id).where_eq("receiverId", user_id))
            .await
    }

    /// Gifts `user_id` sent in the couple, newest first.
    pub async fn sent(&self, couple_id: &str, user_id: &str) -> Result<Vec<Gift>> {
        self.ctx
            .list(&self.query(couple_id).where_eq("senderId", user_id))
            .await
    }

    /// Live feed of the couple's gifts.
    pub async fn subscribe_gifts<F>(&self, couple_id: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<Gift>) + Send + Sync + 'static,
    {
        self.ctx.subscribe_typed(self.query(couple_id), callback).await
    }

    /// Number of gifts of each kind exchanged in the couple, most frequent first.
    pub async fn gift_counts(&self, couple_id: &str) -> Result<Vec<GiftCount>> {
        let query = Query::collection(collections::GIFTS).where_eq("coupleId", couple_id);
        let gifts: Vec<Gift> = self.ctx.list(&query).await?;

        let mut counts: HashMap<&str, GiftCount> = HashMap::new();
        for gift in &gifts {
            counts
                .entry(gift.gift_id.as_str())
                .or_insert_with(|| GiftCount {
                    gift_id: gift.gift_id.clone(),
                    emoji: gift.emoji.clone(),
                    count: 0,
                })
                .count += 1;
        }
        let mut counts: Vec<GiftCount> = counts.into_values().collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.gift_id.cmp(&b.gift_id)));
        Ok(counts)
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Option<GiftTransaction>> {
        Ok(
            lovelee_core::store::fetch::<GiftTransaction>(
                self.ctx.store.as_ref(),
                collections::GIFT_TRANSACTIONS,
                transaction_id,
            )
            .await?
            .map(|t| t.value),
        )
    }

    /// Debits the sender and records the pending transaction.
    async fn begin(&self, transaction: &GiftTransaction) -> Result<i64> {
        let cost = transaction.gift.hearts;
        let batch = debit(WriteBatch::new(), &transaction.sender_id, cost).create(
            collections::GIFT_TRANSACTIONS,
            &transaction.id,
            encode(transaction)?,
        );
        let outcome = match self.ctx.store.commit(batch).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(insufficient_or(&self.ctx, e, &transaction.sender_id, cost).await),
        };
        tracing::debug!(transaction_id = %transaction.id, cost, "Gift transaction pending");
        outcome
            .incremented(0)
            .ok_or_else(|| LoveleeError::internal("increment reported no value"))
    }

    /// Refunds the sender and marks the transaction rolled back, provided it
    /// is still at `version`. Returns whether the refund was applied.
    async fn roll_back(&self, transaction: &GiftTransaction, version: u64, reason: &str) -> bool {
        let batch = WriteBatch::new()
            .increment(
                collections::USERS,
                &transaction.sender_id,
                HEARTS_FIELD,
                transaction.gift.hearts,
                None,
            )
            .update_if_version(
                collections::GIFT_TRANSACTIONS,
                &transaction.id,
                version,
                status_fields(GiftTransactionStatus::RolledBack, Some(reason)),
            );
        match self.ctx.store.commit(batch).await {
            Ok(_) => {
                tracing::info!(
                    transaction_id = %transaction.id,
                    sender_id = %transaction.sender_id,
                    refund = transaction.gift.hearts,
                    "Refunded gift"
                );
                true
            }
            Err(e) if e.is_version_mismatch() => {
                tracing::debug!(transaction_id = %transaction.id, "Transaction already settled");
                false
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "Refund failed, transaction stays pending"
                );
                false
            }
        }
    }

    async fn credit_receiver(&self, receiver_id: &str, gift: &NewGift) -> i64 {
        let bonus = gift.receiver_bonus(self.ctx.config.economy.gift_bonus_ratio);
        if bonus <= 0 {
            return 0;
        }
        let batch = WriteBatch::new().increment(
            collections::USERS,
            receiver_id,
            HEARTS_FIELD,
            bonus,
            Some(Floor::Clamp(0)),
        );
        match self.ctx.store.commit(batch).await {
            Ok(_) => bonus,
            Err(e) => {
                tracing::warn!(receiver_id, bonus, error = %e, "Failed to credit gift bonus");
                0
            }
        }
    }

    fn query(&self, couple_id: &str) -> Query {
        Query::collection(collections::GIFTS)
            .where_eq("coupleId", couple_id)
            .order_by_desc("createdAt")
            .limit(self.ctx.config.feeds.page_size)
    }
}

fn status_fields(status: GiftTransactionStatus, failure: Option<&str>) -> Map<String, Value> {
    fields([
        ("status", json!(status.as_ref())),
        ("failure", json!(failure)),
    ])
}
