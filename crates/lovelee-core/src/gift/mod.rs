//! Virtual gifts paid for with hearts.
//!
//! A gift send is tracked by a [`GiftTransaction`] that survives a crash
//! between the debit and the gift write: it is created `pending` together with
//! the sender debit and is later either `committed` (with the gift record) or
//! `rolledBack` (with the refund).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::error::{LoveleeError, Result};

/// Record stored at `gifts/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: String,
    pub couple_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub gift_id: String,
    pub emoji: String,
    pub label: String,
    pub hearts: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGift {
    pub gift_id: String,
    pub emoji: String,
    pub label: String,
    /// Cost debited from the sender.
    pub hearts: i64,
}

impl NewGift {
    pub fn validate(&self) -> Result<()> {
        if self.gift_id.trim().is_empty() {
            return Err(LoveleeError::validation("giftId must not be empty"));
        }
        if self.hearts <= 0 {
            return Err(LoveleeError::validation("gift cost must be positive"));
        }
        Ok(())
    }

    /// Hearts credited to the receiver: `floor(hearts * ratio)`.
    pub fn receiver_bonus(&self, ratio: f64) -> i64 {
        (self.hearts as f64 * ratio).floor() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum GiftTransactionStatus {
    Pending,
    Committed,
    RolledBack,
}

/// Record stored at `giftTransactions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftTransaction {
    pub id: String,
    pub couple_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Id the gift record is written under once committed.
    pub gift_record_id: String,
    pub gift: NewGift,
    pub status: GiftTransactionStatus,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftReceipt {
    pub gift: Gift,
    pub sender_balance: i64,
    /// Bonus actually credited; `0` if crediting the receiver failed.
    pub receiver_bonus: i64,
}

/// Number of gifts of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftCount {
    pub gift_id: String,
    pub emoji: String,
    pub count: usize,
}
