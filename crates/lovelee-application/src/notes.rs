//! Love notes.

use serde_json::{json, Value};

use lovelee_core::couple::Couple;
use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::note::{NewNote, Note, NoteType};
use lovelee_core::notification::NotificationKind;
use lovelee_core::store::{
    collections, encode, fields, Precondition, Query, Subscription, Versioned, WriteBatch,
};

use crate::context::{missing_as_not_found, new_id, CoreContext};
use crate::notifications::NotificationService;

/// Which notes of a couple to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteFilter {
    All,
    SentBy(String),
    ReceivedBy(String),
    /// Notes addressed to the user that they have not read yet.
    UnreadFor(String),
}

#[derive(Clone)]
pub struct NoteService {
    ctx: CoreContext,
    notifications: NotificationService,
}

impl NoteService {
    pub fn new(ctx: CoreContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    /// Sends a note from `sender_id` to their partner `receiver_id`.
    pub async fn send(
        &self,
        couple_id: &str,
        sender_id: &str,
        receiver_id: &str,
        note: NewNote,
    ) -> Result<Note> {
        note.validate()?;
        let couple = self.ctx.require_member(couple_id, sender_id).await?;
        ensure_partner(&couple, sender_id, receiver_id)?;

        let id = new_id();
        let record = Note {
            id: id.clone(),
            couple_id: couple_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            note_type: note.note_type,
            content: note.content,
            is_read: false,
            is_liked: false,
            created_at: None,
        };
        self.ctx
            .store
            .commit(WriteBatch::new().create(collections::NOTES, &id, encode(&record)?))
            .await?;
        tracing::debug!(couple_id, note_id = %id, note_type = %record.note_type, "Sent note");

        let preview = match record.note_type {
            NoteType::Text => Some(record.content.clone()),
            NoteType::Doodle => None,
        };
        self.notifications
            .notify_from(
                sender_id,
                receiver_id,
                NotificationKind::Note {
                    note_type: record.note_type,
                },
                Some(id.clone()),
                preview,
            )
            .await;

        self.require(&id).await
    }

    /// Marks a note read. Only its receiver may do so.
    pub async fn mark_read(&self, couple_id: &str, user_id: &str, note_id: &str) -> Result<Note> {
        let note = self.owned(couple_id, user_id, note_id).await?;
        if note.value.receiver_id != user_id {
            return Err(LoveleeError::validation("only the receiver can mark a note read"));
        }
        self.ctx
            .store
            .commit(WriteBatch::new().update(
                collections::NOTES,
                note_id,
                fields([("isRead", Value::Bool(true))]),
            ))
            .await
            .map_err(|e| missing_as_not_found(e, "Note"))?;
        self.require(note_id).await
    }

    /// Flips `isLiked`. Two members toggling at once both take effect.
    pub async fn toggle_like(&self, couple_id: &str, user_id: &str, note_id: &str) -> Result<Note> {
        self.owned(couple_id, user_id, note_id).await?;
        self.ctx
            .modify::<Note, _>(collections::NOTES, "Note", note_id, |note| {
                Ok((
                    fields([("isLiked", Value::Bool(!note.is_liked))]),
                    WriteBatch::new(),
                ))
            })
            .await
    }

    pub async fn delete(&self, couple_id: &str, user_id: &str, note_id: &str) -> Result<()> {
        let note = self.owned(couple_id, user_id, note_id).await?;
        self.ctx
            .store
            .commit(WriteBatch::new().delete(
                collections::NOTES,
                note_id,
                Precondition::Version(note.version),
            ))
            .await
            .map_err(|e| missing_as_not_found(e, "Note"))?;
        tracing::debug!(couple_id, note_id, "Deleted note");
        Ok(())
    }

    /// Notes of the couple matching `filter`, newest first.
    pub async fn list(
        &self,
        couple_id: &str,
        filter: NoteFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Note>> {
        self.ctx
            .list(&self.query(couple_id, &filter).limit(self.ctx.page(limit)))
            .await
    }

    pub async fn unread_count(&self, couple_id: &str, receiver_id: &str) -> Result<usize> {
        let query = self.query(couple_id, &NoteFilter::UnreadFor(receiver_id.to_string()));
        Ok(self.ctx.store.query(&query).await?.len())
    }

    /// Live feed of the couple's notes matching `filter`.
    pub async fn subscribe<F>(
        &self,
        couple_id: &str,
        filter: NoteFilter,
        callback: F,
    ) -> Result<Subscription>
    where
        F: Fn(Vec<Note>) + Send + Sync + 'static,
    {
        let query = self
            .query(couple_id, &filter)
            .limit(self.ctx.config.feeds.page_size);
        self.ctx.subscribe_typed(query, callback).await
    }

    fn query(&self, couple_id: &str, filter: &NoteFilter) -> Query {
        let query = Query::collection(collections::NOTES)
            .where_eq("coupleId", couple_id)
            .order_by_desc("createdAt");
        match filter {
            NoteFilter::All => query,
            NoteFilter::SentBy(user) => query.where_eq("senderId", user.as_str()),
            NoteFilter::ReceivedBy(user) => query.where_eq("receiverId", user.as_str()),
            NoteFilter::UnreadFor(user) => query
                .where_eq("receiverId", user.as_str())
                .where_eq("isRead", json!(false)),
        }
    }

    /// Reads a note of `couple_id` on behalf of one of its members.
    async fn owned(
        &self,
        couple_id: &str,
        user_id: &str,
        note_id: &str,
    ) -> Result<Versioned<Note>> {
        self.ctx.require_member(couple_id, user_id).await?;
        let note: Versioned<Note> = self.ctx.require(collections::NOTES, "Note", note_id).await?;
        if note.value.couple_id != couple_id {
            return Err(LoveleeError::not_found("Note", note_id));
        }
        Ok(note)
    }

    async fn require(&self, note_id: &str) -> Result<Note> {
        self.ctx
            .require(collections::NOTES, "Note", note_id)
            .await
            .map(|n| n.value)
    }
}

/// `receiver_id` must be the sender's partner in `couple`.
pub(crate) fn ensure_partner(couple: &Couple, sender_id: &str, receiver_id: &str) -> Result<()> {
    if couple.partner_of(sender_id) == Some(receiver_id) {
        Ok(())
    } else {
        Err(LoveleeError::NotCoupleMember {
            couple_id: couple.id.clone(),
            user_id: receiver_id.to_string(),
        })
    }
}
