//! Special dates.
//!
//! The anniversary is a singleton stored under `{coupleId}_anniversary` and
//! mirrored onto the couple document in the same batch. Custom dates are
//! ordinary records.

use chrono::NaiveDate;
use serde_json::json;

use lovelee_core::couple::Couple;
use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::notification::NotificationKind;
use lovelee_core::special_date::calendar;
use lovelee_core::special_date::{
    NewSpecialDate, SpecialDate, SpecialDateKind, SpecialDatePatch, UpcomingDate,
};
use lovelee_core::store::{
    collections, encode, fetch, fields, Precondition, Query, Subscription, Versioned, WriteBatch,
};

use crate::context::{missing_as_not_found, new_id, CoreContext};
use crate::notifications::NotificationService;

pub use lovelee_core::special_date::calendar::{days_until, years_together};

const ANNIVERSARY_TITLE: &str = "Anniversary";

#[derive(Clone)]
pub struct SpecialDateService {
    ctx: CoreContext,
    notifications: NotificationService,
}

impl SpecialDateService {
    pub fn new(ctx: CoreContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    /// Creates or replaces the couple's anniversary.
    pub async fn set_anniversary(
        &self,
        couple_id: &str,
        user_id: &str,
        input: NewSpecialDate,
    ) -> Result<SpecialDate> {
        input.validate()?;
        self.ctx.require_member(couple_id, user_id).await?;
        let id = SpecialDate::anniversary_id(couple_id);
        let attempts = self.ctx.config.concurrency.max_retries.max(1);

        for attempt in 1..=attempts {
            let existing =
                fetch::<SpecialDate>(self.ctx.store.as_ref(), collections::SPECIAL_DATES, &id).await?;
            let batch = match existing {
                Some(_) => WriteBatch::new().update(
                    collections::SPECIAL_DATES,
                    &id,
                    fields([
                        ("title", json!(input.title)),
                        ("date", serde_json::to_value(input.date)?),
                        ("emoji", json!(input.emoji)),
                    ]),
                ),
                None => {
                    let record = SpecialDate {
                        id: id.clone(),
                        couple_id: couple_id.to_string(),
                        kind: SpecialDateKind::Anniversary,
                        title: input.title.clone(),
                        date: input.date,
                        emoji: input.emoji.clone(),
                        created_by: user_id.to_string(),
                        created_at: None,
                        updated_at: None,
                    };
                    WriteBatch::new().create(collections::SPECIAL_DATES, &id, encode(&record)?)
                }
            }
            .update(
                collections::COUPLES,
                couple_id,
                fields([("anniversary", serde_json::to_value(input.date)?)]),
            );

            match self.ctx.store.commit(batch).await {
                Ok(_) => {
                    tracing::debug!(couple_id, date = %input.date, "Saved anniversary");
                    return self.require(&id).await;
                }
                Err(e) if e.is_already_exists() => {
                    tracing::debug!(couple_id, attempt, "Anniversary created concurrently, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(LoveleeError::ConcurrentModification {
            entity_type: "SpecialDate",
            id,
            attempts,
        })
    }

    pub async fn get_anniversary(&self, couple_id: &str) -> Result<Option<SpecialDate>> {
        let id = SpecialDate::anniversary_id(couple_id);
        Ok(
            fetch::<SpecialDate>(self.ctx.store.as_ref(), collections::SPECIAL_DATES, &id)
                .await?
                .map(|d| d.value),
        )
    }

    /// Adds a custom date and tells the partner about it.
    pub async fn add(
        &self,
        couple_id: &str,
        user_id: &str,
        input: NewSpecialDate,
    ) -> Result<SpecialDate> {
        input.validate()?;
        let couple = self.ctx.require_member(couple_id, user_id).await?;

        let id = new_id();
        let record = SpecialDate {
            id: id.clone(),
            couple_id: couple_id.to_string(),
            kind: SpecialDateKind::Custom,
            title: input.title,
            date: input.date,
            emoji: input.emoji,
            created_by: user_id.to_string(),
            created_at: None,
            updated_at: None,
        };
        self.ctx
            .store
            .commit(WriteBatch::new().create(collections::SPECIAL_DATES, &id, encode(&record)?))
            .await?;
        tracing::debug!(couple_id, date_id = %id, "Added special date");

        if let Some(partner) = couple.partner_of(user_id) {
            let today = self.ctx.clock.today();
            self.notifications
                .notify_from(
                    user_id,
                    partner,
                    NotificationKind::SpecialDate {
                        title: record.title.clone(),
                        days_until: calendar::days_until(record.date, today),
                    },
                    Some(id.clone()),
                    None,
                )
                .await;
        }

        self.require(&id).await
    }

    pub async fn update(
        &self,
        couple_id: &str,
        user_id: &str,
        date_id: &str,
        patch: SpecialDatePatch,
    ) -> Result<SpecialDate> {
        let new_date = patch.date;
        let changes = patch.into_fields()?;
        let current = self.owned(couple_id, user_id, date_id).await?;
        let mut batch = WriteBatch::new().update_if_version(
            collections::SPECIAL_DATES,
            date_id,
            current.version,
            changes,
        );
        if let (SpecialDateKind::Anniversary, Some(date)) = (current.value.kind, new_date) {
            batch = batch.update(
                collections::COUPLES,
                couple_id,
                fields([("anniversary", serde_json::to_value(date)?)]),
            );
        }
        self.ctx.store.commit(batch).await?;
        self.require(date_id).await
    }

    pub async fn delete(&self, couple_id: &str, user_id: &str, date_id: &str) -> Result<()> {
        let current = self.owned(couple_id, user_id, date_id).await?;
        let mut batch = WriteBatch::new().delete(
            collections::SPECIAL_DATES,
            date_id,
            Precondition::Version(current.version),
        );
        if current.value.kind == SpecialDateKind::Anniversary {
            batch = batch.update(
                collections::COUPLES,
                couple_id,
                fields([("anniversary", serde_json::Value::Null)]),
            );
        }
        self.ctx
            .store
            .commit(batch)
            .await
            .map_err(|e| missing_as_not_found(e, "SpecialDate"))?;
        tracing::debug!(couple_id, date_id, "Deleted special date");
        Ok(())
    }

    /// All dates of the couple, newest first.
    pub async fn list(&self, couple_id: &str) -> Result<Vec<SpecialDate>> {
        self.ctx.list(&self.query(couple_id)).await
    }

    /// Dates whose next occurrence is at most `within_days` after `today`,
    /// soonest first.
    pub async fn upcoming(
        &self,
        couple_id: &str,
        today: NaiveDate,
        within_days: i64,
    ) -> Result<Vec<UpcomingDate>> {
        let dates = self.list(couple_id).await?;
        let mut upcoming: Vec<UpcomingDate> = dates
            .into_iter()
            .map(|date| {
                let next_occurrence = calendar::next_occurrence(date.date, today);
                UpcomingDate {
                    days_until: (next_occurrence - today).num_days(),
                    next_occurrence,
                    date,
                }
            })
            .filter(|u| u.days_until <= within_days)
            .collect();
        upcoming.sort_by(|a, b| {
            a.days_until
                .cmp(&b.days_until)
                .then_with(|| a.date.title.cmp(&b.date.title))
        });
        Ok(upcoming)
    }

    /// Live feed of the couple's dates.
    pub async fn subscribe<F>(&self, couple_id: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<SpecialDate>) + Send + Sync + 'static,
    {
        self.ctx.subscribe_typed(self.query(couple_id), callback).await
    }

    /// Reads a date, checking that it belongs to a couple `user_id` is in.
    async fn owned(
        &self,
        couple_id: &str,
        user_id: &str,
        date_id: &str,
    ) -> Result<Versioned<SpecialDate>> {
        self.ctx.require_member(couple_id, user_id).await?;
        let current: Versioned<SpecialDate> = self
            .ctx
            .require(collections::SPECIAL_DATES, "SpecialDate", date_id)
            .await?;
        if current.value.couple_id != couple_id {
            return Err(LoveleeError::not_found("SpecialDate", date_id));
        }
        Ok(current)
    }

    fn query(&self, couple_id: &str) -> Query {
        Query::collection(collections::SPECIAL_DATES)
            .where_eq("coupleId", couple_id)
            .order_by_desc("createdAt")
            .limit(self.ctx.config.feeds.page_size)
    }

    async fn require(&self, date_id: &str) -> Result<SpecialDate> {
        self.ctx
            .require(collections::SPECIAL_DATES, "SpecialDate", date_id)
            .await
            .map(|d| d.value)
    }
}

/// Brings the anniversary record in line with a new `couple.anniversary`
/// value written in the same batch. `exists` says whether the record is
/// currently stored.
pub(crate) fn mirror_anniversary(
    batch: WriteBatch,
    couple: &Couple,
    exists: bool,
    date: Option<NaiveDate>,
) -> Result<WriteBatch> {
    let id = SpecialDate::anniversary_id(&couple.id);
    let batch = match (date, exists) {
        (Some(date), true) => batch.update(
            collections::SPECIAL_DATES,
            &id,
            fields([("date", serde_json::to_value(date)?)]),
        ),
        (Some(date), false) => {
            let record = SpecialDate {
                id: id.clone(),
                couple_id: couple.id.clone(),
                kind: SpecialDateKind::Anniversary,
                title: ANNIVERSARY_TITLE.to_string(),
                date,
                emoji: None,
                created_by: couple.user1_id.clone(),
                created_at: None,
                updated_at: None,
            };
            batch.create(collections::SPECIAL_DATES, &id, encode(&record)?)
        }
        (None, true) => batch.delete(collections::SPECIAL_DATES, &id, Precondition::None),
        (None, false) => batch,
    };
    Ok(batch)
}
