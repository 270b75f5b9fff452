//! In-app notifications.
//!
//! Services record a notification for the partner whenever a shared event
//! warrants it. Recording is best effort: a failed notification never fails
//! the action that triggered it.

use serde_json::{json, Value};

use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::notification::{Notification, NotificationKind};
use lovelee_core::store::{
    collections, encode, fields, Precondition, Query, Subscription, Versioned, WriteBatch,
};
use lovelee_core::user::UserProfile;

use crate::context::{missing_as_not_found, new_id, CoreContext};

const FALLBACK_ACTOR: &str = "Your partner";

#[derive(Clone)]
pub struct NotificationService {
    ctx: CoreContext,
}

impl NotificationService {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Records a notification for `user_id`.
    pub async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        actor: &str,
        related_id: Option<String>,
        full_message: Option<String>,
    ) -> Result<Notification> {
        let id = new_id();
        let notification =
            Notification::new(id.clone(), user_id.to_string(), kind, actor, related_id, full_message);
        self.ctx
            .store
            .commit(WriteBatch::new().create(collections::NOTIFICATIONS, &id, encode(&notification)?))
            .await?;
        tracing::debug!(user_id, kind = ?notification.kind, "Recorded notification");

        let stored = self
            .ctx
            .require::<Notification>(collections::NOTIFICATIONS, "Notification", &id)
            .await?;
        Ok(stored.value)
    }

    /// Notifies `recipient` about something `actor_id` did, logging instead of
    /// failing.
    pub(crate) async fn notify_from(
        &self,
        actor_id: &str,
        recipient: &str,
        kind: NotificationKind,
        related_id: Option<String>,
        full_message: Option<String>,
    ) {
        let actor = match self
            .ctx
            .require::<UserProfile>(collections::USERS, "UserProfile", actor_id)
            .await
        {
            Ok(profile) => profile.value.display_name,
            Err(_) => FALLBACK_ACTOR.to_string(),
        };
        if let Err(e) = self
            .notify(recipient, kind, &actor, related_id, full_message)
            .await
        {
            tracing::warn!(recipient, error = %e, "Failed to record notification");
        }
    }

    /// Most recent notifications of `user_id`, newest first.
    pub async fn list(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<Notification>> {
        self.ctx.list(&self.query(user_id, limit)).await
    }

    /// Marks one of `user_id`'s notifications read.
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        self.owned(user_id, notification_id).await?;
        let batch = WriteBatch::new().update(
            collections::NOTIFICATIONS,
            notification_id,
            fields([("isRead", Value::Bool(true))]),
        );
        self.ctx
            .store
            .commit(batch)
            .await
            .map_err(|e| missing_as_not_found(e, "Notification"))?;
        Ok(())
    }

    /// Marks every unread notification of `user_id` as read in one batch.
    ///
    /// Returns how many were marked.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        let unread = self.ctx.store.query(&self.unread_query(user_id)).await?;
        if unread.is_empty() {
            return Ok(0);
        }
        let batch = unread.iter().fold(WriteBatch::new(), |batch, doc| {
            batch.update(
                collections::NOTIFICATIONS,
                &doc.id,
                fields([("isRead", Value::Bool(true))]),
            )
        });
        self.ctx.store.commit(batch).await?;
        Ok(unread.len())
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.ctx.store.query(&self.unread_query(user_id)).await?.len())
    }

    pub async fn delete(&self, user_id: &str, notification_id: &str) -> Result<()> {
        let current = self.owned(user_id, notification_id).await?;
        self.ctx
            .store
            .commit(WriteBatch::new().delete(
                collections::NOTIFICATIONS,
                notification_id,
                Precondition::Version(current.version),
            ))
            .await
            .map_err(|e| missing_as_not_found(e, "Notification"))?;
        Ok(())
    }

    /// Live feed of the most recent notifications of `user_id`.
    pub async fn subscribe<F>(&self, user_id: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<Notification>) + Send + Sync + 'static,
    {
        self.ctx
            .subscribe_typed(self.query(user_id, None), callback)
            .await
    }

    fn query(&self, user_id: &str, limit: Option<usize>) -> Query {
        Query::collection(collections::NOTIFICATIONS)
            .where_eq("userId", user_id)
            .order_by_desc("createdAt")
            .limit(self.ctx.page(limit))
    }

    /// Reads a notification, hiding those addressed to someone else.
    async fn owned(&self, user_id: &str, notification_id: &str) -> Result<Versioned<Notification>> {
        let current: Versioned<Notification> = self
            .ctx
            .require(collections::NOTIFICATIONS, "Notification", notification_id)
            .await?;
        if current.value.user_id != user_id {
            return Err(LoveleeError::not_found("Notification", notification_id));
        }
        Ok(current)
    }

    fn unread_query(&self, user_id: &str) -> Query {
        Query::collection(collections::NOTIFICATIONS)
            .where_eq("userId", user_id)
            .where_eq("isRead", json!(false))
    }
}
