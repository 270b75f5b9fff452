//! Profile store.
//!
//! Owns the per-user record and its invite code. Codes are unique by
//! construction: each one is reserved as `inviteCodes/{code}` in the same
//! batch that creates the profile, and a collision on the reservation retries
//! with a fresh code.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use lovelee_core::couple::Couple;
use lovelee_core::error::{LoveleeError, Result, WriteConflict};
use lovelee_core::store::{
    collections, encode, fetch, fields, Precondition, Query, Subscription, Versioned, WriteBatch,
};
use lovelee_core::user::{invite_code, NewProfile, ProfilePatch, UserProfile};

use crate::context::{missing_as_not_found, CoreContext};
use crate::pairing::unlink;

#[derive(Clone)]
pub struct ProfileStore {
    ctx: CoreContext,
}

impl ProfileStore {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Registers `user_id` with a fresh invite code and the starting grant.
    pub async fn create_profile(&self, user_id: &str, input: NewProfile) -> Result<UserProfile> {
        input.validate()?;
        let invites = &self.ctx.config.invites;

        for attempt in 1..=invites.max_attempts {
            let code = invite_code::generate(&mut rand::thread_rng(), invites.code_length);
            let profile = UserProfile {
                id: user_id.to_string(),
                email: input.email.clone(),
                display_name: input.display_name.clone(),
                photo_url: input.photo_url.clone(),
                invite_code: code.clone(),
                couple_id: None,
                partner_id: None,
                hearts: self.ctx.config.economy.starting_hearts,
                is_premium: false,
                premium_expiry: None,
                created_at: None,
                updated_at: None,
            };

            let batch = WriteBatch::new()
                .create(collections::USERS, user_id, encode(&profile)?)
                .create(collections::INVITE_CODES, &code, json!({ "userId": user_id }));

            match self.ctx.store.commit(batch).await {
                Ok(_) => {
                    tracing::info!(user_id, "Created profile");
                    return self.require(user_id).await.map(|p| p.value);
                }
                Err(LoveleeError::Conflict(WriteConflict::AlreadyExists { collection, .. }))
                    if collection == collections::INVITE_CODES =>
                {
                    tracing::debug!(user_id, attempt, "Invite code taken, drawing another");
                }
                Err(e) => return Err(e),
            }
        }

        Err(LoveleeError::InviteCodeExhausted(invites.max_attempts))
    }

    /// `Ok(None)` when the profile does not exist.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(fetch::<UserProfile>(self.ctx.store.as_ref(), collections::USERS, user_id)
            .await?
            .map(|p| p.value))
    }

    /// Looks up the owner of an invite code, ignoring case.
    pub async fn find_by_invite_code(&self, code: &str) -> Result<Option<UserProfile>> {
        let code = invite_code::normalize(code);
        if !invite_code::is_well_formed(&code, self.ctx.config.invites.code_length) {
            return Ok(None);
        }
        let query = Query::collection(collections::USERS)
            .where_eq("inviteCode", code)
            .limit(1);
        Ok(self.ctx.list::<UserProfile>(&query).await?.into_iter().next())
    }

    /// Applies a merge patch to the user-editable fields. `updatedAt` is
    /// refreshed even when the patch is empty.
    pub async fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<UserProfile> {
        let fields = patch.into_fields()?;
        self.ctx
            .store
            .commit(WriteBatch::new().update(collections::USERS, user_id, fields))
            .await
            .map_err(|e| missing_as_not_found(e, "UserProfile"))?;
        tracing::debug!(user_id, "Updated profile");
        self.require(user_id).await.map(|p| p.value)
    }

    /// Grants premium until `expiry`, or for life when `None`.
    pub async fn set_premium(
        &self,
        user_id: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<UserProfile> {
        let patch = fields([
            ("isPremium", Value::Bool(true)),
            ("premiumExpiry", serde_json::to_value(expiry)?),
        ]);
        self.write_premium(user_id, patch).await
    }

    pub async fn clear_premium(&self, user_id: &str) -> Result<UserProfile> {
        let patch = fields([("isPremium", Value::Bool(false)), ("premiumExpiry", Value::Null)]);
        self.write_premium(user_id, patch).await
    }

    /// Whether `user_id` has premium right now.
    pub async fn is_premium_active(&self, user_id: &str) -> Result<bool> {
        let profile = self.require(user_id).await?;
        Ok(profile.value.is_premium_active(self.ctx.clock.now()))
    }

    /// The partner's profile, `None` while unpaired.
    pub async fn get_partner_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let profile = self.require(user_id).await?;
        match profile.value.partner_id {
            Some(partner_id) => self.get_profile(&partner_id).await,
            None => Ok(None),
        }
    }

    /// Removes the account. A paired user is disconnected in the same batch,
    /// and the invite code reservation is released.
    pub async fn delete_account(&self, user_id: &str) -> Result<()> {
        let profile = self.require(user_id).await?;

        let mut batch = WriteBatch::new();
        if let Some(couple_id) = &profile.value.couple_id {
            if let Some(couple) =
                fetch::<Couple>(self.ctx.store.as_ref(), collections::COUPLES, couple_id).await?
            {
                batch = unlink(&self.ctx, batch, &couple, Some(user_id)).await?;
            }
        }

        let batch = batch
            .delete(
                collections::USERS,
                user_id,
                Precondition::Version(profile.version),
            )
            .delete(
                collections::INVITE_CODES,
                &profile.value.invite_code,
                Precondition::None,
            );
        self.ctx.store.commit(batch).await?;
        tracing::info!(user_id, "Deleted account");
        Ok(())
    }

    /// Live view of one profile; `None` once it is deleted.
    pub async fn subscribe_profile<F>(&self, user_id: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Option<UserProfile>) + Send + Sync + 'static,
    {
        self.ctx
            .subscribe_one(collections::USERS, user_id, callback)
            .await
    }

    async fn write_premium(
        &self,
        user_id: &str,
        patch: serde_json::Map<String, Value>,
    ) -> Result<UserProfile> {
        self.ctx
            .store
            .commit(WriteBatch::new().update(collections::USERS, user_id, patch))
            .await
            .map_err(|e| missing_as_not_found(e, "UserProfile"))?;
        self.require(user_id).await.map(|p| p.value)
    }

    async fn require(&self, user_id: &str) -> Result<Versioned<UserProfile>> {
        self.ctx
            .require(collections::USERS, "UserProfile", user_id)
            .await
    }
}
