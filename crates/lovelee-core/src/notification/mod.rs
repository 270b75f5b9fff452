//! In-app notification records.
//!
//! Each shared-resource event that the partner should hear about produces one
//! immutable record in `notifications`; an external function turns new
//! records into push messages. [`NotificationKind`] is a closed set, so every
//! presentation lookup is an exhaustive match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::couple::PetMood;
use crate::note::NoteType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NotificationKind {
    Gift {
        emoji: String,
        label: String,
        hearts: i64,
    },
    Note {
        note_type: NoteType,
    },
    Mood {
        emoji: String,
        label: String,
    },
    SpecialDate {
        title: String,
        days_until: i64,
    },
    PartnerConnected {
        partner_name: String,
    },
    PetNeedsCare {
        pet_name: String,
        mood: PetMood,
    },
}

impl NotificationKind {
    /// Screen the client opens when the notification is tapped.
    pub fn route(&self) -> &'static str {
        match self {
            NotificationKind::Gift { .. } => "/gifts",
            NotificationKind::Note { .. } => "/notes",
            NotificationKind::Mood { .. } => "/mood",
            NotificationKind::SpecialDate { .. } => "/dates",
            NotificationKind::PartnerConnected { .. } => "/home",
            NotificationKind::PetNeedsCare { .. } => "/pet",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            NotificationKind::Gift { .. } => "gift",
            NotificationKind::Note { .. } => "mail",
            NotificationKind::Mood { .. } => "happy",
            NotificationKind::SpecialDate { .. } => "calendar",
            NotificationKind::PartnerConnected { .. } => "heart",
            NotificationKind::PetNeedsCare { .. } => "paw",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            NotificationKind::Gift { .. } => "#FF6B9D",
            NotificationKind::Note { .. } => "#9B59B6",
            NotificationKind::Mood { .. } => "#F39C12",
            NotificationKind::SpecialDate { .. } => "#3498DB",
            NotificationKind::PartnerConnected { .. } => "#E74C3C",
            NotificationKind::PetNeedsCare { .. } => "#27AE60",
        }
    }

    pub fn title(&self) -> String {
        match self {
            NotificationKind::Gift { .. } => "New gift 🎁".to_string(),
            NotificationKind::Note { .. } => "New love note 💌".to_string(),
            NotificationKind::Mood { .. } => "Mood update".to_string(),
            NotificationKind::SpecialDate { .. } => "Special date 📅".to_string(),
            NotificationKind::PartnerConnected { .. } => "You're connected! 💕".to_string(),
            NotificationKind::PetNeedsCare { pet_name, .. } => format!("{} needs you", pet_name),
        }
    }

    /// Short body line; `actor` is the display name of whoever caused it.
    pub fn body(&self, actor: &str) -> String {
        match self {
            NotificationKind::Gift { emoji, label, .. } => {
                format!("{} sent you {} {}", actor, emoji, label)
            }
            NotificationKind::Note { note_type } => match note_type {
                NoteType::Text => format!("{} left you a note", actor),
                NoteType::Doodle => format!("{} drew you a doodle", actor),
            },
            NotificationKind::Mood { emoji, label } => {
                format!("{} is feeling {} {}", actor, emoji, label)
            }
            NotificationKind::SpecialDate { title, days_until } => match days_until {
                0 => format!("{} is today!", title),
                1 => format!("{} is tomorrow", title),
                n => format!("{} is in {} days", title, n),
            },
            NotificationKind::PartnerConnected { partner_name } => {
                format!("You and {} are now a couple", partner_name)
            }
            NotificationKind::PetNeedsCare { pet_name, mood } => {
                format!("{} is feeling {}", pet_name, mood)
            }
        }
    }
}

/// Record stored at `notifications/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub full_message: Option<String>,
    #[serde(default)]
    pub related_id: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(
        id: String,
        user_id: String,
        kind: NotificationKind,
        actor: &str,
        related_id: Option<String>,
        full_message: Option<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            title: kind.title(),
            body: kind.body(actor),
            kind,
            full_message,
            related_id,
            is_read: false,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shape_and_round_trip() {
        let notification = Notification::new(
            "n1".into(),
            "u2".into(),
            NotificationKind::Gift {
                emoji: "🌹".into(),
                label: "Rose".into(),
                hearts: 10,
            },
            "Alex",
            Some("g1".into()),
            None,
        );
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "gift");
        assert_eq!(value["userId"], "u2");
        assert_eq!(value["relatedId"], "g1");
        assert_eq!(value["body"], "Alex sent you 🌹 Rose");

        let back: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(back, notification);
    }

    #[test]
    fn test_variant_fields_are_camel_case() {
        let value = serde_json::to_value(NotificationKind::SpecialDate {
            title: "Anniversary".into(),
            days_until: 3,
        })
        .unwrap();
        assert_eq!(value["type"], "specialDate");
        assert_eq!(value["daysUntil"], 3);
    }

    #[test]
    fn test_presentation_lookups() {
        let kind = NotificationKind::Note {
            note_type: NoteType::Doodle,
        };
        assert_eq!(kind.route(), "/notes");
        assert_eq!(kind.icon(), "mail");
        assert_eq!(kind.body("Sam"), "Sam drew you a doodle");
    }
}
