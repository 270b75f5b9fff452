//! The couple's shared pet.
//!
//! The pet is a sub-document of the couple. Every action reads the couple,
//! computes the new pet and commits it guarded by the version it read, so
//! two members caring for the pet at the same moment both take effect.

use serde_json::Map;

use lovelee_core::couple::{Couple, Pet, PetAction, PetMood};
use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::notification::NotificationKind;
use lovelee_core::store::{collections, encode, fields, WriteBatch};

use crate::context::CoreContext;
use crate::notifications::NotificationService;

const PET_FIELD: &str = "pet";

#[derive(Clone)]
pub struct PetService {
    ctx: CoreContext,
    notifications: NotificationService,
}

impl PetService {
    pub fn new(ctx: CoreContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    pub async fn get_pet(&self, couple_id: &str) -> Result<Pet> {
        let couple = self
            .ctx
            .require::<Couple>(collections::COUPLES, "Couple", couple_id)
            .await?;
        Ok(couple.value.pet)
    }

    pub async fn pet_mood(&self, couple_id: &str) -> Result<PetMood> {
        Ok(self.get_pet(couple_id).await?.mood())
    }

    pub async fn feed(&self, couple_id: &str, user_id: &str) -> Result<Pet> {
        self.perform(couple_id, user_id, PetAction::Feed).await
    }

    pub async fn play(&self, couple_id: &str, user_id: &str) -> Result<Pet> {
        self.perform(couple_id, user_id, PetAction::Play).await
    }

    pub async fn bathe(&self, couple_id: &str, user_id: &str) -> Result<Pet> {
        self.perform(couple_id, user_id, PetAction::Bathe).await
    }

    pub async fn sleep(&self, couple_id: &str, user_id: &str) -> Result<Pet> {
        self.perform(couple_id, user_id, PetAction::Sleep).await
    }

    /// Applies a care action on behalf of `user_id`.
    pub async fn perform(&self, couple_id: &str, user_id: &str, action: PetAction) -> Result<Pet> {
        let now = self.ctx.clock.now();
        let couple = self
            .update_pet(couple_id, Some(user_id), |pet| Ok(pet.apply(action, now)))
            .await?;
        tracing::debug!(couple_id, user_id, action = %action, "Pet action");
        Ok(couple.pet)
    }

    /// Periodic decay. Both members are told when the pet tips into needing
    /// care.
    pub async fn decrease_stats_tick(&self, couple_id: &str) -> Result<Pet> {
        let decay = PetAction::DecayTick {
            happiness: self.ctx.config.pet.tick_happiness_decay,
            hunger: self.ctx.config.pet.tick_hunger_decay,
        };
        let now = self.ctx.clock.now();

        let mut needed_care_before = false;
        let couple = self
            .update_pet(couple_id, None, |pet| {
                needed_care_before = pet.needs_care();
                Ok(pet.apply(decay, now))
            })
            .await?;

        let pet = couple.pet.clone();
        if pet.needs_care() && !needed_care_before {
            tracing::debug!(couple_id, mood = %pet.mood(), "Pet needs care");
            for member in couple.members() {
                let kind = NotificationKind::PetNeedsCare {
                    pet_name: pet.name.clone(),
                    mood: pet.mood(),
                };
                if let Err(e) = self
                    .notifications
                    .notify(member, kind, &pet.name, Some(couple.id.clone()), None)
                    .await
                {
                    tracing::warn!(member, error = %e, "Failed to record notification");
                }
            }
        }
        Ok(pet)
    }

    pub async fn rename_pet(&self, couple_id: &str, user_id: &str, name: &str) -> Result<Pet> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LoveleeError::validation("pet name must not be empty"));
        }
        let couple = self
            .update_pet(couple_id, Some(user_id), |pet| {
                Ok(Pet {
                    name: name.to_string(),
                    ..pet.clone()
                })
            })
            .await?;
        Ok(couple.pet)
    }

    pub async fn change_skin(&self, couple_id: &str, user_id: &str, skin: &str) -> Result<Pet> {
        if skin.trim().is_empty() {
            return Err(LoveleeError::validation("skin must not be empty"));
        }
        let couple = self
            .update_pet(couple_id, Some(user_id), |pet| {
                Ok(Pet {
                    skin: skin.to_string(),
                    ..pet.clone()
                })
            })
            .await?;
        Ok(couple.pet)
    }

    async fn update_pet<F>(&self, couple_id: &str, member: Option<&str>, mut next: F) -> Result<Couple>
    where
        F: FnMut(&Pet) -> Result<Pet>,
    {
        self.ctx
            .modify::<Couple, _>(collections::COUPLES, "Couple", couple_id, |couple| {
                if let Some(user_id) = member {
                    couple.ensure_member(user_id)?;
                }
                let pet = next(&couple.pet)?;
                Ok((pet_fields(&pet)?, WriteBatch::new()))
            })
            .await
    }
}

fn pet_fields(pet: &Pet) -> Result<Map<String, serde_json::Value>> {
    Ok(fields([(PET_FIELD, encode(pet)?)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, paired};

    fn service(ctx: &CoreContext) -> PetService {
        PetService::new(ctx.clone(), NotificationService::new(ctx.clone()))
    }

    #[tokio::test]
    async fn test_actions_adjust_and_clamp() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let pets = service(&ctx);

        let fed = pets.feed(&couple.id, "a").await.unwrap();
        assert_eq!(fed.hunger, 70);
        assert_eq!(fed.happiness, 85);
        assert!(fed.last_fed.is_some());

        let played = pets.play(&couple.id, "b").await.unwrap();
        assert_eq!(played.happiness, 100);
        assert_eq!(played.hunger, 65);

        let bathed = pets.bathe(&couple.id, "a").await.unwrap();
        assert_eq!(bathed.happiness, 100);
        assert!(bathed.last_bathed.is_some());
    }

    #[tokio::test]
    async fn test_outsider_cannot_care() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let err = service(&ctx).feed(&couple.id, "mallory").await.unwrap_err();
        assert_eq!(err.code(), "NotCoupleMember");
    }

    #[tokio::test]
    async fn test_decay_notifies_once_when_care_needed() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let pets = service(&ctx);
        let notifications = NotificationService::new(ctx.clone());
        let before = notifications.list("a", None).await.unwrap().len();

        // Hunger 50 drops by 5 per tick: below 30 after five ticks.
        for _ in 0..4 {
            pets.decrease_stats_tick(&couple.id).await.unwrap();
        }
        assert_eq!(pets.pet_mood(&couple.id).await.unwrap(), PetMood::Content);
        assert_eq!(notifications.list("a", None).await.unwrap().len(), before);

        let pet = pets.decrease_stats_tick(&couple.id).await.unwrap();
        assert_eq!(pet.hunger, 25);
        assert_eq!(pet.mood(), PetMood::Hungry);
        assert_eq!(notifications.list("a", None).await.unwrap().len(), before + 1);
        assert_eq!(notifications.list("b", None).await.unwrap().len(), 1);

        pets.decrease_stats_tick(&couple.id).await.unwrap();
        assert_eq!(notifications.list("b", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_and_skin() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let pets = service(&ctx);

        let pet = pets.rename_pet(&couple.id, "a", "  Bao ").await.unwrap();
        assert_eq!(pet.name, "Bao");
        let pet = pets.change_skin(&couple.id, "b", "panda").await.unwrap();
        assert_eq!(pet.skin, "panda");
        assert_eq!(pet.name, "Bao");
        assert!(pets.rename_pet(&couple.id, "a", " ").await.is_err());
    }
}
