use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LoveleeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialDateKind {
    Anniversary,
    Custom,
}

/// Record stored at `specialDates/{id}`.
///
/// The anniversary lives under a key derived from the couple id, so saving it
/// twice overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialDate {
    pub id: String,
    pub couple_id: String,
    #[serde(rename = "type")]
    pub kind: SpecialDateKind,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub emoji: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SpecialDate {
    pub fn anniversary_id(couple_id: &str) -> String {
        format!("{}_anniversary", couple_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpecialDate {
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub emoji: Option<String>,
}

impl NewSpecialDate {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LoveleeError::validation("title must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialDatePatch {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    /// `Some(None)` clears the emoji.
    pub emoji: Option<Option<String>>,
}

impl SpecialDatePatch {
    pub fn into_fields(self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        if let Some(title) = self.title {
            if title.trim().is_empty() {
                return Err(LoveleeError::validation("title must not be empty"));
            }
            fields.insert("title".to_string(), Value::String(title));
        }
        if let Some(date) = self.date {
            fields.insert("date".to_string(), serde_json::to_value(date)?);
        }
        if let Some(emoji) = self.emoji {
            fields.insert("emoji".to_string(), emoji.map(Value::String).unwrap_or(Value::Null));
        }
        if fields.is_empty() {
            return Err(LoveleeError::validation("nothing to update"));
        }
        Ok(fields)
    }
}

/// A special date together with how far away its next occurrence is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDate {
    pub date: SpecialDate,
    pub next_occurrence: NaiveDate,
    pub days_until: i64,
}
