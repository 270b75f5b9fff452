//! Special dates: the couple's anniversary plus any number of custom dates.
//!
//! # Module Structure
//!
//! - `model`: stored records
//! - `calendar`: yearly-recurrence arithmetic

pub mod calendar;
mod model;

pub use model::{NewSpecialDate, SpecialDate, SpecialDateKind, SpecialDatePatch, UpcomingDate};
