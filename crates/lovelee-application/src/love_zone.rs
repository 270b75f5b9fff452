//! Love zone: decorations bought with hearts and placed in the couple's room.

use lovelee_core::couple::{Couple, LoveZone};
use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::store::{collections, encode, fields, WriteBatch};

use crate::context::CoreContext;
use crate::ledger::{debit, insufficient_or};

#[derive(Clone)]
pub struct LoveZoneService {
    ctx: CoreContext,
}

impl LoveZoneService {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    pub async fn get_love_zone(&self, couple_id: &str) -> Result<LoveZone> {
        let couple = self
            .ctx
            .require::<Couple>(collections::COUPLES, "Couple", couple_id)
            .await?;
        Ok(couple.value.love_zone)
    }

    /// Buys `item_id` for the couple with `user_id`'s hearts.
    ///
    /// The debit and the unlock commit together, so a rejected debit leaves
    /// the item locked and a lost race on the couple leaves the hearts alone.
    pub async fn unlock_item(
        &self,
        couple_id: &str,
        user_id: &str,
        item_id: &str,
        cost: i64,
    ) -> Result<LoveZone> {
        if cost < 0 {
            return Err(LoveleeError::validation("cost must not be negative"));
        }
        let result = self
            .update_zone(couple_id, user_id, |zone| zone.unlock(item_id), |batch| {
                if cost > 0 {
                    debit(batch, user_id, cost)
                } else {
                    batch
                }
            })
            .await;

        match result {
            Ok(zone) => {
                tracing::info!(couple_id, user_id, item_id, cost, level = zone.level, "Unlocked item");
                Ok(zone)
            }
            Err(e) if e.is_below_floor() => Err(insufficient_or(&self.ctx, e, user_id, cost).await),
            Err(e) => Err(e),
        }
    }

    /// Places an unlocked item at `(x, y)`, moving it if already placed.
    pub async fn place_item(
        &self,
        couple_id: &str,
        user_id: &str,
        item_id: &str,
        x: f64,
        y: f64,
    ) -> Result<LoveZone> {
        self.update_zone(couple_id, user_id, |zone| zone.place(item_id, x, y), |b| b)
            .await
    }

    pub async fn remove_placed_item(
        &self,
        couple_id: &str,
        user_id: &str,
        item_id: &str,
    ) -> Result<LoveZone> {
        self.update_zone(
            couple_id,
            user_id,
            |zone| {
                if zone.remove_placed(item_id) {
                    Ok(())
                } else {
                    Err(LoveleeError::not_found("PlacedItem", item_id))
                }
            },
            |b| b,
        )
        .await
    }

    async fn update_zone<F, B>(
        &self,
        couple_id: &str,
        user_id: &str,
        mut change: F,
        extra: B,
    ) -> Result<LoveZone>
    where
        F: FnMut(&mut LoveZone) -> Result<()>,
        B: Fn(WriteBatch) -> WriteBatch,
    {
        let couple = self
            .ctx
            .modify::<Couple, _>(collections::COUPLES, "Couple", couple_id, |couple| {
                couple.ensure_member(user_id)?;
                let mut zone = couple.love_zone.clone();
                change(&mut zone)?;
                Ok((
                    fields([("loveZone", encode(&zone)?)]),
                    extra(WriteBatch::new()),
                ))
            })
            .await?;
        Ok(couple.love_zone)
    }
}
