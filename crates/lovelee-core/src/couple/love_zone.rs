//! Love-zone sub-document: decorations a couple unlocks with hearts and
//! places in their shared room.

use serde::{Deserialize, Serialize};

use crate::error::{LoveleeError, Result};

/// Unlocks needed per love-zone level.
pub const ITEMS_PER_LEVEL: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedItem {
    pub item_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoveZone {
    pub level: u32,
    #[serde(default)]
    pub unlocked_items: Vec<String>,
    #[serde(default)]
    pub placed_items: Vec<PlacedItem>,
}

impl Default for LoveZone {
    fn default() -> Self {
        Self {
            level: 1,
            unlocked_items: Vec::new(),
            placed_items: Vec::new(),
        }
    }
}

impl LoveZone {
    pub fn is_unlocked(&self, item_id: &str) -> bool {
        self.unlocked_items.iter().any(|i| i == item_id)
    }

    pub fn unlock(&mut self, item_id: &str) -> Result<()> {
        if self.is_unlocked(item_id) {
            return Err(LoveleeError::validation(format!(
                "item '{}' is already unlocked",
                item_id
            )));
        }
        self.unlocked_items.push(item_id.to_string());
        self.level = 1 + (self.unlocked_items.len() / ITEMS_PER_LEVEL) as u32;
        Ok(())
    }

    /// Places an unlocked item, moving it if already placed.
    pub fn place(&mut self, item_id: &str, x: f64, y: f64) -> Result<()> {
        if !self.is_unlocked(item_id) {
            return Err(LoveleeError::validation(format!(
                "item '{}' is not unlocked",
                item_id
            )));
        }
        match self.placed_items.iter_mut().find(|p| p.item_id == item_id) {
            Some(placed) => {
                placed.x = x;
                placed.y = y;
            }
            None => self.placed_items.push(PlacedItem {
                item_id: item_id.to_string(),
                x,
                y,
            }),
        }
        Ok(())
    }

    /// Returns whether anything was removed.
    pub fn remove_placed(&mut self, item_id: &str) -> bool {
        let before = self.placed_items.len();
        self.placed_items.retain(|p| p.item_id != item_id);
        before != self.placed_items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_grows_with_unlocks() {
        let mut zone = LoveZone::default();
        for i in 0..ITEMS_PER_LEVEL {
            assert_eq!(zone.level, 1);
            zone.unlock(&format!("item-{i}")).unwrap();
        }
        assert_eq!(zone.level, 2);
        assert!(zone.unlock("item-0").is_err());
    }

    #[test]
    fn test_place_requires_unlock_and_moves_existing() {
        let mut zone = LoveZone::default();
        assert!(zone.place("sofa", 1.0, 2.0).is_err());

        zone.unlock("sofa").unwrap();
        zone.place("sofa", 1.0, 2.0).unwrap();
        zone.place("sofa", 3.0, 4.0).unwrap();
        assert_eq!(zone.placed_items.len(), 1);
        assert_eq!(zone.placed_items[0].x, 3.0);

        assert!(zone.remove_placed("sofa"));
        assert!(!zone.remove_placed("sofa"));
    }
}
