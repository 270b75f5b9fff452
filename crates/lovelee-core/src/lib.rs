//! Domain layer of the Lovelee couple core.
//!
//! This crate holds the pure parts of the system: domain records with their
//! persisted field names, the error type, the document-store contract the
//! services are written against, configuration and time.

pub mod clock;
pub mod config;
pub mod couple;
pub mod error;
pub mod gift;
pub mod mood;
pub mod note;
pub mod notification;
pub mod response;
pub mod special_date;
pub mod store;
pub mod user;

// Re-export common error type
pub use error::{LoveleeError, Result};
pub use response::ServiceResponse;
