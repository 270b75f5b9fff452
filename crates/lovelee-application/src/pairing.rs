//! Pairing protocol.
//!
//! Connecting creates the couple and cross-links both profiles in one batch.
//! Both profile patches are guarded by the versions the preconditions were
//! checked against, so two pairings racing for the same person cannot both
//! commit: the loser re-runs the checks and reports what changed.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use lovelee_core::couple::{Couple, CoupleDetailsPatch, Pet};
use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::notification::NotificationKind;
use lovelee_core::special_date::SpecialDate;
use lovelee_core::store::{
    collections, encode, fetch, fields, Precondition, Subscription, Versioned, WriteBatch,
};
use lovelee_core::user::UserProfile;

use crate::context::{is_version_mismatch_on, new_id, CoreContext};
use crate::notifications::NotificationService;
use crate::profile::ProfileStore;
use crate::special_dates::mirror_anniversary;

#[derive(Clone)]
pub struct PairingService {
    ctx: CoreContext,
    profiles: ProfileStore,
    notifications: NotificationService,
}

impl PairingService {
    pub fn new(ctx: CoreContext, profiles: ProfileStore, notifications: NotificationService) -> Self {
        Self {
            ctx,
            profiles,
            notifications,
        }
    }

    /// Pairs `user_id` with the owner of `invite_code`.
    ///
    /// Checks, in order: the code resolves, it is not the caller's own, its
    /// owner is unpaired, the caller is unpaired.
    pub async fn connect_with_partner(&self, user_id: &str, invite_code: &str) -> Result<Couple> {
        let attempts = self.ctx.config.concurrency.max_retries.max(1);

        for attempt in 1..=attempts {
            let (caller, partner) = self.check_preconditions(user_id, invite_code).await?;

            let couple_id = new_id();
            let couple = Couple::new(
                couple_id.clone(),
                caller.value.id.clone(),
                partner.value.id.clone(),
                self.default_pet(),
            );

            let batch = WriteBatch::new()
                .create(collections::COUPLES, &couple_id, encode(&couple)?)
                .update_if_version(
                    collections::USERS,
                    &caller.value.id,
                    caller.version,
                    link_fields(&couple_id, &partner.value.id),
                )
                .update_if_version(
                    collections::USERS,
                    &partner.value.id,
                    partner.version,
                    link_fields(&couple_id, &caller.value.id),
                );

            match self.ctx.store.commit(batch).await {
                Ok(_) => {
                    tracing::info!(
                        couple_id = %couple_id,
                        user1 = %caller.value.id,
                        user2 = %partner.value.id,
                        "Paired"
                    );
                    self.notifications
                        .notify_from(
                            &caller.value.id,
                            &partner.value.id,
                            NotificationKind::PartnerConnected {
                                partner_name: caller.value.display_name.clone(),
                            },
                            Some(couple_id.clone()),
                            None,
                        )
                        .await;
                    return self.require(&couple_id).await.map(|c| c.value);
                }
                Err(e)
                    if is_version_mismatch_on(&e, collections::USERS, &caller.value.id)
                        || is_version_mismatch_on(&e, collections::USERS, &partner.value.id) =>
                {
                    tracing::debug!(user_id, attempt, "Profile changed during pairing, rechecking");
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Pairing commit failed, nothing applied");
                    return Err(e);
                }
            }
        }

        Err(LoveleeError::ConcurrentModification {
            entity_type: "UserProfile",
            id: user_id.to_string(),
            attempts,
        })
    }

    /// Dissolves the couple: both profiles are unlinked and the couple is
    /// deleted in one batch.
    pub async fn disconnect(&self, couple_id: &str) -> Result<()> {
        let couple = self.require(couple_id).await?;
        let batch = unlink(&self.ctx, WriteBatch::new(), &couple, None).await?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(couple_id, "Disconnected");
        Ok(())
    }

    /// `Ok(None)` when the couple does not exist.
    pub async fn get_couple(&self, couple_id: &str) -> Result<Option<Couple>> {
        Ok(fetch::<Couple>(self.ctx.store.as_ref(), collections::COUPLES, couple_id)
            .await?
            .map(|c| c.value))
    }

    /// Live view of the couple document; `None` once it is dissolved.
    pub async fn subscribe_couple<F>(&self, couple_id: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Option<Couple>) + Send + Sync + 'static,
    {
        self.ctx
            .subscribe_one(collections::COUPLES, couple_id, callback)
            .await
    }

    /// Sets the couple name and/or anniversary. The anniversary record is
    /// created, moved or removed in the same batch.
    pub async fn update_couple_details(
        &self,
        couple_id: &str,
        patch: CoupleDetailsPatch,
    ) -> Result<Couple> {
        let anniversary = patch.anniversary;
        let changes = patch.into_fields()?;
        let record_exists = match anniversary {
            Some(_) => fetch::<SpecialDate>(
                self.ctx.store.as_ref(),
                collections::SPECIAL_DATES,
                &SpecialDate::anniversary_id(couple_id),
            )
            .await?
            .is_some(),
            None => false,
        };

        self.ctx
            .modify::<Couple, _>(collections::COUPLES, "Couple", couple_id, |couple| {
                let batch = match anniversary {
                    Some(date) => mirror_anniversary(WriteBatch::new(), couple, record_exists, date)?,
                    None => WriteBatch::new(),
                };
                Ok((changes.clone(), batch))
            })
            .await
    }

    /// Whole days since the couple was created, rounded up.
    pub fn calculate_days_together(&self, couple: &Couple, now: DateTime<Utc>) -> i64 {
        couple.days_together(now)
    }

    /// Days together as of the service clock.
    pub async fn days_together(&self, couple_id: &str) -> Result<i64> {
        let couple = self.require(couple_id).await?;
        Ok(couple.value.days_together(self.ctx.clock.now()))
    }

    async fn check_preconditions(
        &self,
        user_id: &str,
        invite_code: &str,
    ) -> Result<(Versioned<UserProfile>, Versioned<UserProfile>)> {
        let owner = self
            .profiles
            .find_by_invite_code(invite_code)
            .await?
            .ok_or_else(|| LoveleeError::InvalidInviteCode(invite_code.to_string()))?;

        if owner.id == user_id {
            return Err(LoveleeError::SelfPairing);
        }

        let partner: Versioned<UserProfile> = self
            .ctx
            .require(collections::USERS, "UserProfile", &owner.id)
            .await?;
        if partner.value.is_paired() {
            return Err(LoveleeError::PartnerAlreadyPaired);
        }

        let caller: Versioned<UserProfile> = self
            .ctx
            .require(collections::USERS, "UserProfile", user_id)
            .await?;
        if caller.value.is_paired() {
            return Err(LoveleeError::CallerAlreadyPaired);
        }

        Ok((caller, partner))
    }

    fn default_pet(&self) -> Pet {
        let pet = &self.ctx.config.pet;
        Pet::new(
            &pet.default_name,
            &pet.default_skin,
            pet.initial_happiness,
            pet.initial_hunger,
        )
    }

    async fn require(&self, couple_id: &str) -> Result<Versioned<Couple>> {
        self.ctx
            .require(collections::COUPLES, "Couple", couple_id)
            .await
    }
}

fn link_fields(couple_id: &str, partner_id: &str) -> serde_json::Map<String, Value> {
    fields([("coupleId", json!(couple_id)), ("partnerId", json!(partner_id))])
}

/// Appends the operations that dissolve `couple` to `batch`.
///
/// Members whose profile no longer exists are skipped, as is `departing`,
/// whose profile the caller removes itself.
pub(crate) async fn unlink(
    ctx: &CoreContext,
    mut batch: WriteBatch,
    couple: &Versioned<Couple>,
    departing: Option<&str>,
) -> Result<WriteBatch> {
    for member in couple.value.members() {
        if Some(member) == departing {
            continue;
        }
        if ctx.store.get(collections::USERS, member).await?.is_some() {
            batch = batch.update(
                collections::USERS,
                member,
                fields([("coupleId", Value::Null), ("partnerId", Value::Null)]),
            );
        }
    }
    Ok(batch.delete(
        collections::COUPLES,
        &couple.value.id,
        Precondition::Version(couple.version),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, register};

    async fn anniversary_record(ctx: &CoreContext, couple_id: &str) -> Option<SpecialDate> {
        fetch::<SpecialDate>(
            ctx.store.as_ref(),
            collections::SPECIAL_DATES,
            &SpecialDate::anniversary_id(couple_id),
        )
        .await
        .unwrap()
        .map(|r| r.value)
    }

    fn pairing(ctx: &CoreContext) -> PairingService {
        PairingService::new(
            ctx.clone(),
            ProfileStore::new(ctx.clone()),
            NotificationService::new(ctx.clone()),
        )
    }

    #[tokio::test]
    async fn test_connect_links_both_profiles() {
        let (ctx, _) = context();
        let a = register(&ctx, "a", "Alice").await;
        register(&ctx, "b", "Bob").await;

        let couple = pairing(&ctx)
            .connect_with_partner("b", &a.invite_code)
            .await
            .unwrap();
        assert!(couple.is_member("a") && couple.is_member("b"));
        assert_eq!(couple.pet.happiness, 80);
        assert_eq!(couple.pet.hunger, 50);
        assert_eq!(couple.love_zone.level, 1);

        let profiles = ProfileStore::new(ctx.clone());
        let a = profiles.get_profile("a").await.unwrap().unwrap();
        let b = profiles.get_profile("b").await.unwrap().unwrap();
        assert_eq!(a.couple_id.as_deref(), Some(couple.id.as_str()));
        assert_eq!(a.partner_id.as_deref(), Some("b"));
        assert_eq!(b.partner_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_precondition_order() {
        let (ctx, _) = context();
        let a = register(&ctx, "a", "Alice").await;
        let b = register(&ctx, "b", "Bob").await;
        let c = register(&ctx, "c", "Cam").await;
        let service = pairing(&ctx);

        let err = service.connect_with_partner("a", "ZZZZZZ").await.unwrap_err();
        assert_eq!(err.code(), "InvalidInviteCode");

        let err = service
            .connect_with_partner("a", &a.invite_code)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SelfPairing");

        service.connect_with_partner("b", &a.invite_code).await.unwrap();

        let err = service
            .connect_with_partner("c", &a.invite_code)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PartnerAlreadyPaired");

        let err = service
            .connect_with_partner("b", &c.invite_code)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CallerAlreadyPaired");

        // Self-pairing wins over "already paired" for a paired caller.
        let err = service
            .connect_with_partner("b", &b.invite_code)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SelfPairing");
    }

    #[tokio::test]
    async fn test_disconnect_unlinks_and_deletes() {
        let (ctx, _) = context();
        let a = register(&ctx, "a", "Alice").await;
        register(&ctx, "b", "Bob").await;
        let service = pairing(&ctx);
        let couple = service.connect_with_partner("b", &a.invite_code).await.unwrap();

        service.disconnect(&couple.id).await.unwrap();
        assert!(service.get_couple(&couple.id).await.unwrap().is_none());

        let profiles = ProfileStore::new(ctx.clone());
        for id in ["a", "b"] {
            let profile = profiles.get_profile(id).await.unwrap().unwrap();
            assert!(profile.couple_id.is_none());
            assert!(profile.partner_id.is_none());
        }

        let err = service.disconnect(&couple.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_couple_details() {
        let (ctx, _) = context();
        let a = register(&ctx, "a", "Alice").await;
        register(&ctx, "b", "Bob").await;
        let service = pairing(&ctx);
        let couple = service.connect_with_partner("b", &a.invite_code).await.unwrap();

        let anniversary = chrono::NaiveDate::from_ymd_opt(2023, 2, 14).unwrap();
        let updated = service
            .update_couple_details(
                &couple.id,
                CoupleDetailsPatch {
                    couple_name: Some("  A & B ".into()),
                    anniversary: Some(Some(anniversary)),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.couple_name, "A & B");
        assert_eq!(updated.anniversary, Some(anniversary));
        assert_eq!(updated.pet, couple.pet);
    }

    #[tokio::test]
    async fn test_couple_anniversary_keeps_record_in_step() {
        let (ctx, _) = context();
        let a = register(&ctx, "a", "Alice").await;
        register(&ctx, "b", "Bob").await;
        let service = pairing(&ctx);
        let couple = service.connect_with_partner("b", &a.invite_code).await.unwrap();
        let set = |date: Option<chrono::NaiveDate>| CoupleDetailsPatch {
            couple_name: None,
            anniversary: Some(date),
        };

        let first = chrono::NaiveDate::from_ymd_opt(2019, 7, 7).unwrap();
        let updated = service.update_couple_details(&couple.id, set(Some(first))).await.unwrap();
        let created = anniversary_record(&ctx, &couple.id).await.unwrap();
        assert_eq!(Some(created.date), updated.anniversary);
        assert_eq!(created.created_by, couple.user1_id);

        let moved = chrono::NaiveDate::from_ymd_opt(2020, 2, 14).unwrap();
        let updated = service.update_couple_details(&couple.id, set(Some(moved))).await.unwrap();
        assert_eq!(anniversary_record(&ctx, &couple.id).await.map(|r| r.date), updated.anniversary);

        let cleared = service.update_couple_details(&couple.id, set(None)).await.unwrap();
        assert!(cleared.anniversary.is_none());
        assert!(anniversary_record(&ctx, &couple.id).await.is_none());
    }

    #[tokio::test]
    async fn test_partner_is_notified() {
        let (ctx, _) = context();
        let a = register(&ctx, "a", "Alice").await;
        register(&ctx, "b", "Bob").await;
        pairing(&ctx)
            .connect_with_partner("b", &a.invite_code)
            .await
            .unwrap();

        let notifications = NotificationService::new(ctx.clone())
            .list("a", None)
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].body, "You and Bob are now a couple");
    }
}
