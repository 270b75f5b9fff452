//! UserProfile domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LoveleeError, Result};

/// Per-user record stored at `users/{id}`.
///
/// `couple_id` and `partner_id` are either both set or both null; they are
/// only ever written by the pairing commit and by disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    pub invite_code: String,
    #[serde(default)]
    pub couple_id: Option<String>,
    #[serde(default)]
    pub partner_id: Option<String>,
    pub hearts: i64,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub premium_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn is_paired(&self) -> bool {
        self.couple_id.is_some()
    }

    /// Premium without an expiry never lapses.
    pub fn is_premium_active(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expiry.is_none_or(|expiry| expiry > now)
    }
}

/// Registration input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

impl NewProfile {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(LoveleeError::validation("email must not be empty"));
        }
        if self.display_name.trim().is_empty() {
            return Err(LoveleeError::validation("displayName must not be empty"));
        }
        Ok(())
    }
}

/// Merge patch for the user-editable part of a profile.
///
/// Pairing fields, the invite code and the hearts balance are deliberately
/// absent: they have their own write paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// `Some(None)` clears the photo.
    pub photo_url: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none() && self.photo_url.is_none()
    }

    /// Converts the patch into persisted field names.
    pub fn into_fields(self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        if let Some(email) = self.email {
            if email.trim().is_empty() {
                return Err(LoveleeError::validation("email must not be empty"));
            }
            fields.insert("email".to_string(), Value::String(email));
        }
        if let Some(name) = self.display_name {
            if name.trim().is_empty() {
                return Err(LoveleeError::validation("displayName must not be empty"));
            }
            fields.insert("displayName".to_string(), Value::String(name));
        }
        if let Some(photo) = self.photo_url {
            fields.insert(
                "photoURL".to_string(),
                photo.map(Value::String).unwrap_or(Value::Null),
            );
        }
        Ok(fields)
    }
}
