//! Couple domain module.
//!
//! # Module Structure
//!
//! - `model`: the shared couple document and its patches
//! - `pet`: the embedded pet sub-document and its actions
//! - `love_zone`: the embedded love-zone sub-document

mod love_zone;
mod model;
mod pet;

pub use love_zone::{LoveZone, PlacedItem, ITEMS_PER_LEVEL};
pub use model::{Couple, CoupleDetailsPatch};
pub use pet::{Pet, PetAction, PetMood};
