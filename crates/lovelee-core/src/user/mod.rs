//! User domain module.
//!
//! # Module Structure
//!
//! - `model`: the per-user profile record and its patches
//! - `invite_code`: invite code generation and normalisation

pub mod invite_code;
mod model;

pub use model::{NewProfile, ProfilePatch, UserProfile};
