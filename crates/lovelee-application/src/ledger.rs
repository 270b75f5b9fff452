//! Hearts ledger.
//!
//! The balance lives on the profile as `hearts` and is only ever changed
//! through the store's atomic increment, so concurrent adjustments never lose
//! an update. Plain adjustments clamp at zero; purchases reject instead.

use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::store::{collections, Floor, WriteBatch};
use lovelee_core::user::UserProfile;

use crate::context::{missing_as_not_found, CoreContext};

pub(crate) const HEARTS_FIELD: &str = "hearts";

#[derive(Clone)]
pub struct HeartsLedger {
    ctx: CoreContext,
}

impl HeartsLedger {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Current balance of `user_id`.
    pub async fn balance(&self, user_id: &str) -> Result<i64> {
        let profile = self
            .ctx
            .require::<UserProfile>(collections::USERS, "UserProfile", user_id)
            .await?;
        Ok(profile.value.hearts)
    }

    /// Adds `delta` to the balance, clamping the result at zero.
    ///
    /// Returns the resulting balance.
    pub async fn adjust_hearts(&self, user_id: &str, delta: i64) -> Result<i64> {
        let batch = WriteBatch::new().increment(
            collections::USERS,
            user_id,
            HEARTS_FIELD,
            delta,
            Some(Floor::Clamp(0)),
        );
        let outcome = self
            .ctx
            .store
            .commit(batch)
            .await
            .map_err(|e| missing_as_not_found(e, "UserProfile"))?;
        let balance = outcome
            .incremented(0)
            .ok_or_else(|| LoveleeError::internal("increment reported no value"))?;
        tracing::debug!(user_id, delta, balance, "Adjusted hearts");
        Ok(balance)
    }

    /// Removes `amount` hearts, failing with `InsufficientHearts` instead of
    /// going below zero.
    pub async fn spend(&self, user_id: &str, amount: i64) -> Result<i64> {
        if amount < 0 {
            return Err(LoveleeError::validation("amount must not be negative"));
        }
        let batch = debit(WriteBatch::new(), user_id, amount);
        match self.ctx.store.commit(batch).await {
            Ok(outcome) => outcome
                .incremented(0)
                .ok_or_else(|| LoveleeError::internal("increment reported no value")),
            Err(e) => Err(insufficient_or(&self.ctx, e, user_id, amount).await),
        }
    }
}

/// Appends a rejecting debit of `amount` on `user_id` to `batch`.
pub(crate) fn debit(batch: WriteBatch, user_id: &str, amount: i64) -> WriteBatch {
    batch.increment(
        collections::USERS,
        user_id,
        HEARTS_FIELD,
        -amount,
        Some(Floor::Reject(0)),
    )
}

/// Maps a rejected debit to `InsufficientHearts` with the balance seen now.
pub(crate) async fn insufficient_or(
    ctx: &CoreContext,
    err: LoveleeError,
    user_id: &str,
    amount: i64,
) -> LoveleeError {
    if !err.is_below_floor() {
        return missing_as_not_found(err, "UserProfile");
    }
    let available = match ctx
        .require::<UserProfile>(collections::USERS, "UserProfile", user_id)
        .await
    {
        Ok(profile) => profile.value.hearts,
        Err(_) => 0,
    };
    tracing::debug!(user_id, amount, available, "Rejected debit");
    LoveleeError::InsufficientHearts {
        required: amount,
        available,
    }
}
