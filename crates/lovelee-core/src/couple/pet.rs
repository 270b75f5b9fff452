//! Pet sub-document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

pub const STAT_MAX: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub name: String,
    pub skin: String,
    pub happiness: u8,
    pub hunger: u8,
    #[serde(default)]
    pub last_fed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_bathed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_slept: Option<DateTime<Utc>>,
}

/// Care actions. Stat deltas are fixed per action; decay deltas come from
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PetAction {
    Feed,
    Play,
    Bathe,
    Sleep,
    DecayTick { happiness: u8, hunger: u8 },
}

/// Mood derived from the current stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PetMood {
    Happy,
    Content,
    Hungry,
    Sad,
}

fn shift(stat: u8, delta: i16) -> u8 {
    (stat as i16 + delta).clamp(0, STAT_MAX as i16) as u8
}

impl Pet {
    pub fn new(name: &str, skin: &str, happiness: u8, hunger: u8) -> Self {
        Self {
            name: name.to_string(),
            skin: skin.to_string(),
            happiness: happiness.min(STAT_MAX),
            hunger: hunger.min(STAT_MAX),
            last_fed: None,
            last_played: None,
            last_bathed: None,
            last_slept: None,
        }
    }

    /// Returns the pet after `action`, with both stats clamped to `0..=100`.
    pub fn apply(&self, action: PetAction, now: DateTime<Utc>) -> Pet {
        let mut next = self.clone();
        match action {
            PetAction::Feed => {
                next.hunger = shift(self.hunger, 20);
                next.happiness = shift(self.happiness, 5);
                next.last_fed = Some(now);
            }
            PetAction::Play => {
                next.happiness = shift(self.happiness, 15);
                next.hunger = shift(self.hunger, -5);
                next.last_played = Some(now);
            }
            PetAction::Bathe => {
                next.happiness = shift(self.happiness, 10);
                next.last_bathed = Some(now);
            }
            PetAction::Sleep => {
                next.happiness = shift(self.happiness, 8);
                next.last_slept = Some(now);
            }
            PetAction::DecayTick { happiness, hunger } => {
                next.happiness = shift(self.happiness, -(happiness as i16));
                next.hunger = shift(self.hunger, -(hunger as i16));
            }
        }
        next
    }

    pub fn mood(&self) -> PetMood {
        if self.hunger < 30 {
            PetMood::Hungry
        } else if self.happiness < 30 {
            PetMood::Sad
        } else if self.happiness >= 70 {
            PetMood::Happy
        } else {
            PetMood::Content
        }
    }

    pub fn needs_care(&self) -> bool {
        matches!(self.mood(), PetMood::Hungry | PetMood::Sad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_feed_and_play_deltas() {
        let pet = Pet::new("Mochi", "default", 80, 50);
        let fed = pet.apply(PetAction::Feed, now());
        assert_eq!((fed.happiness, fed.hunger), (85, 70));
        assert_eq!(fed.last_fed, Some(now()));

        let played = pet.apply(PetAction::Play, now());
        assert_eq!((played.happiness, played.hunger), (95, 45));
        assert_eq!(played.last_played, Some(now()));
    }

    #[test]
    fn test_stats_clamp_at_bounds() {
        let pet = Pet::new("Mochi", "default", 98, 95);
        let fed = pet.apply(PetAction::Feed, now());
        assert_eq!((fed.happiness, fed.hunger), (100, 100));

        let tired = Pet::new("Mochi", "default", 2, 3).apply(
            PetAction::DecayTick {
                happiness: 3,
                hunger: 5,
            },
            now(),
        );
        assert_eq!((tired.happiness, tired.hunger), (0, 0));
    }

    #[test]
    fn test_bathe_and_sleep_stamp_markers() {
        let pet = Pet::new("Mochi", "default", 50, 50);
        let bathed = pet.apply(PetAction::Bathe, now());
        assert_eq!(bathed.happiness, 60);
        assert!(bathed.last_bathed.is_some());
        let slept = pet.apply(PetAction::Sleep, now());
        assert_eq!(slept.happiness, 58);
        assert!(slept.last_slept.is_some());
    }

    #[test]
    fn test_mood() {
        assert_eq!(Pet::new("p", "s", 80, 50).mood(), PetMood::Happy);
        assert_eq!(Pet::new("p", "s", 50, 50).mood(), PetMood::Content);
        assert_eq!(Pet::new("p", "s", 80, 10).mood(), PetMood::Hungry);
        assert_eq!(Pet::new("p", "s", 10, 50).mood(), PetMood::Sad);
        assert!(Pet::new("p", "s", 10, 50).needs_care());
        assert_eq!(PetAction::Feed.to_string(), "feed");
    }
}
