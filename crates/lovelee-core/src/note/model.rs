use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{LoveleeError, Result};

/// Longest accepted text note, in characters.
pub const MAX_TEXT_LEN: usize = 2000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoteType {
    Text,
    /// `content` holds the encoded drawing.
    Doodle,
}

/// Record stored at `notes/{id}`. Only `isRead` and `isLiked` ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub couple_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub content: String,
}

impl NewNote {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            note_type: NoteType::Text,
            content: content.into(),
        }
    }

    pub fn doodle(content: impl Into<String>) -> Self {
        Self {
            note_type: NoteType::Doodle,
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(LoveleeError::validation("note content must not be empty"));
        }
        if self.note_type == NoteType::Text && self.content.chars().count() > MAX_TEXT_LEN {
            return Err(LoveleeError::validation(format!(
                "text notes are limited to {} characters",
                MAX_TEXT_LEN
            )));
        }
        Ok(())
    }
}
