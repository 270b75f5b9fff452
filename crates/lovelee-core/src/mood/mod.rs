//! Mood check-ins. Moods are append-only; the current mood of a user is their
//! most recent entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoveleeError, Result};

/// Record stored at `moods/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: String,
    pub couple_id: String,
    pub user_id: String,
    pub mood_id: String,
    pub emoji: String,
    pub label: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMood {
    pub mood_id: String,
    pub emoji: String,
    pub label: String,
}

impl NewMood {
    pub fn validate(&self) -> Result<()> {
        if self.mood_id.trim().is_empty() {
            return Err(LoveleeError::validation("moodId must not be empty"));
        }
        Ok(())
    }
}

/// How often one mood was picked within a window of recent entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodCount {
    pub mood_id: String,
    pub emoji: String,
    pub count: usize,
}
