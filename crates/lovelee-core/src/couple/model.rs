//! Couple domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::love_zone::LoveZone;
use super::pet::Pet;
use crate::error::{LoveleeError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Shared record stored at `couples/{id}`.
///
/// The two member slots are fixed at pairing time. A couple document only
/// exists while both member profiles point at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Couple {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    #[serde(default)]
    pub couple_name: String,
    #[serde(default)]
    pub anniversary: Option<NaiveDate>,
    pub pet: Pet,
    #[serde(default)]
    pub love_zone: LoveZone,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Couple {
    pub fn new(id: String, user1_id: String, user2_id: String, pet: Pet) -> Self {
        Self {
            id,
            user1_id,
            user2_id,
            couple_name: String::new(),
            anniversary: None,
            pet,
            love_zone: LoveZone::default(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn members(&self) -> [&str; 2] {
        [&self.user1_id, &self.user2_id]
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The other member, `None` if `user_id` is not a member.
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user1_id == user_id {
            Some(&self.user2_id)
        } else if self.user2_id == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }

    /// Fails with `NotCoupleMember` unless `user_id` belongs to this couple.
    pub fn ensure_member(&self, user_id: &str) -> Result<()> {
        if self.is_member(user_id) {
            Ok(())
        } else {
            Err(LoveleeError::NotCoupleMember {
                couple_id: self.id.clone(),
                user_id: user_id.to_string(),
            })
        }
    }

    /// Whole days since the couple was created, rounded up.
    ///
    /// Zero when the creation stamp is missing or in the future.
    pub fn days_together(&self, now: DateTime<Utc>) -> i64 {
        let Some(created_at) = self.created_at else {
            return 0;
        };
        let elapsed = (now - created_at).num_milliseconds();
        if elapsed <= 0 {
            return 0;
        }
        (elapsed + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }
}

/// Merge patch for the couple's editable details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoupleDetailsPatch {
    pub couple_name: Option<String>,
    /// `Some(None)` clears the anniversary.
    pub anniversary: Option<Option<NaiveDate>>,
}

impl CoupleDetailsPatch {
    pub fn into_fields(self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        if let Some(name) = self.couple_name {
            fields.insert("coupleName".to_string(), Value::String(name.trim().to_string()));
        }
        if let Some(anniversary) = self.anniversary {
            fields.insert("anniversary".to_string(), serde_json::to_value(anniversary)?);
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn couple() -> Couple {
        Couple::new("c1".into(), "a".into(), "b".into(), Pet::new("Mochi", "default", 80, 50))
    }

    #[test]
    fn test_partner_of() {
        let c = couple();
        assert_eq!(c.partner_of("a"), Some("b"));
        assert_eq!(c.partner_of("b"), Some("a"));
        assert_eq!(c.partner_of("z"), None);
        assert!(c.ensure_member("z").is_err());
    }

    #[test]
    fn test_days_together_rounds_up() {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut c = couple();
        assert_eq!(c.days_together(created), 0);

        c.created_at = Some(created);
        assert_eq!(c.days_together(created), 0);
        assert_eq!(c.days_together(created + Duration::minutes(1)), 1);
        assert_eq!(c.days_together(created + Duration::days(1)), 1);
        assert_eq!(c.days_together(created + Duration::days(1) + Duration::seconds(1)), 2);
        assert_eq!(c.days_together(created - Duration::days(3)), 0);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(couple()).unwrap();
        assert_eq!(value["user1Id"], "a");
        assert_eq!(value["pet"]["happiness"], 80);
        assert_eq!(value["loveZone"]["level"], 1);
        assert!(value["loveZone"]["unlockedItems"].as_array().unwrap().is_empty());
    }
}
