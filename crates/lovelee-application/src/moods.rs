//! Mood check-ins.

use std::collections::HashMap;

use lovelee_core::error::Result;
use lovelee_core::mood::{MoodCount, MoodEntry, NewMood};
use lovelee_core::notification::NotificationKind;
use lovelee_core::store::{collections, encode, Query, Subscription, WriteBatch};

use crate::context::{new_id, CoreContext};
use crate::notifications::NotificationService;

#[derive(Clone)]
pub struct MoodService {
    ctx: CoreContext,
    notifications: NotificationService,
}

impl MoodService {
    pub fn new(ctx: CoreContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    /// Records a new mood for `user_id`; it becomes their current mood.
    pub async fn set(&self, couple_id: &str, user_id: &str, mood: NewMood) -> Result<MoodEntry> {
        mood.validate()?;
        let couple = self.ctx.require_member(couple_id, user_id).await?;

        let id = new_id();
        let entry = MoodEntry {
            id: id.clone(),
            couple_id: couple_id.to_string(),
            user_id: user_id.to_string(),
            mood_id: mood.mood_id,
            emoji: mood.emoji,
            label: mood.label,
            created_at: None,
        };
        self.ctx
            .store
            .commit(WriteBatch::new().create(collections::MOODS, &id, encode(&entry)?))
            .await?;
        tracing::debug!(couple_id, user_id, mood_id = %entry.mood_id, "Set mood");

        if let Some(partner) = couple.partner_of(user_id) {
            self.notifications
                .notify_from(
                    user_id,
                    partner,
                    NotificationKind::Mood {
                        emoji: entry.emoji.clone(),
                        label: entry.label.clone(),
                    },
                    Some(id.clone()),
                    None,
                )
                .await;
        }

        Ok(self
            .ctx
            .require::<MoodEntry>(collections::MOODS, "MoodEntry", &id)
            .await?
            .value)
    }

    /// Latest mood of `user_id`, `None` before their first check-in.
    pub async fn current_mood(&self, couple_id: &str, user_id: &str) -> Result<Option<MoodEntry>> {
        let query = self.user_query(couple_id, user_id).limit(1);
        Ok(self.ctx.list::<MoodEntry>(&query).await?.into_iter().next())
    }

    /// Latest mood of the partner of `user_id`.
    pub async fn partner_current_mood(
        &self,
        couple_id: &str,
        user_id: &str,
    ) -> Result<Option<MoodEntry>> {
        let couple = self.ctx.require_member(couple_id, user_id).await?;
        match couple.partner_of(user_id) {
            Some(partner) => self.current_mood(couple_id, partner).await,
            None => Ok(None),
        }
    }

    /// Recent moods of the couple, or of one member, newest first.
    ///
    /// `limit` defaults to the configured history length and is capped at
    /// the configured maximum.
    pub async fn history(
        &self,
        couple_id: &str,
        user_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<MoodEntry>> {
        let query = match user_id {
            Some(user_id) => self.user_query(couple_id, user_id),
            None => self.couple_query(couple_id),
        };
        self.ctx.list(&query.limit(self.history_limit(limit))).await
    }

    /// How often each mood appears among the last `limit` entries of
    /// `user_id`, most frequent first.
    pub async fn mood_counts(
        &self,
        couple_id: &str,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MoodCount>> {
        let entries = self.history(couple_id, Some(user_id), limit).await?;
        Ok(count_moods(&entries))
    }

    /// Live feed of the couple's recent moods.
    pub async fn subscribe<F>(&self, couple_id: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<MoodEntry>) + Send + Sync + 'static,
    {
        let query = self.couple_query(couple_id).limit(self.history_limit(None));
        self.ctx.subscribe_typed(query, callback).await
    }

    fn history_limit(&self, limit: Option<usize>) -> usize {
        let feeds = &self.ctx.config.feeds;
        limit
            .unwrap_or(feeds.mood_history_default)
            .min(feeds.mood_history_max)
    }

    fn couple_query(&self, couple_id: &str) -> Query {
        Query::collection(collections::MOODS)
            .where_eq("coupleId", couple_id)
            .order_by_desc("createdAt")
    }

    fn user_query(&self, couple_id: &str, user_id: &str) -> Query {
        self.couple_query(couple_id).where_eq("userId", user_id)
    }
}

fn count_moods(entries: &[MoodEntry]) -> Vec<MoodCount> {
    let mut counts: HashMap<&str, MoodCount> = HashMap::new();
    for entry in entries {
        counts
            .entry(entry.mood_id.as_str())
            .or_insert_with(|| MoodCount {
                mood_id: entry.mood_id.clone(),
                emoji: entry.emoji.clone(),
                count: 0,
            })
            .count += 1;
    }
    let mut counts: Vec<MoodCount> = counts.into_values().collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.mood_id.cmp(&b.mood_id)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, paired};

    fn mood(id: &str, emoji: &str) -> NewMood {
        NewMood {
            mood_id: id.into(),
            emoji: emoji.into(),
            label: id.into(),
        }
    }

    fn service(ctx: &CoreContext) -> MoodService {
        MoodService::new(ctx.clone(), NotificationService::new(ctx.clone()))
    }

    #[tokio::test]
    async fn test_current_mood_is_latest_entry() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let moods = service(&ctx);

        assert!(moods.current_mood(&couple.id, "a").await.unwrap().is_none());

        // Same clock tick: the commit sequence decides.
        moods.set(&couple.id, "a", mood("happy", "😊")).await.unwrap();
        moods.set(&couple.id, "a", mood("tired", "😴")).await.unwrap();
        moods.set(&couple.id, "b", mood("loved", "🥰")).await.unwrap();

        let current = moods.current_mood(&couple.id, "a").await.unwrap().unwrap();
        assert_eq!(current.mood_id, "tired");
        let partner = moods
            .partner_current_mood(&couple.id, "b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(partner.mood_id, "tired");
    }

    #[tokio::test]
    async fn test_history_limits() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let moods = service(&ctx);
        for _ in 0..3 {
            moods.set(&couple.id, "a", mood("happy", "😊")).await.unwrap();
        }
        moods.set(&couple.id, "a", mood("sad", "😢")).await.unwrap();

        assert_eq!(moods.history(&couple.id, None, None).await.unwrap().len(), 4);
        assert_eq!(
            moods.history(&couple.id, Some("a"), Some(2)).await.unwrap().len(),
            2
        );

        let counts = moods.mood_counts(&couple.id, "a", None).await.unwrap();
        assert_eq!(counts[0].mood_id, "happy");
        assert_eq!(counts[0].count, 3);
        assert_eq!(counts[1].count, 1);
    }

    #[tokio::test]
    async fn test_empty_mood_id_rejected() {
        let (ctx, _) = context();
        let couple = paired(&ctx).await;
        let err = service(&ctx)
            .set(&couple.id, "a", mood(" ", "?"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Validation");
    }
}
