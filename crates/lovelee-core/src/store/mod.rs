//! Document store abstraction.
//!
//! The couple core rides on a flat, collection-based document store. This
//! module defines the contract every backend must honour:
//!
//! - `commit` applies a [`WriteBatch`] atomically: either every operation is
//!   visible afterwards or none is.
//! - every document carries a version that changes on each write, which the
//!   services use for optimistic concurrency.
//! - subscriptions deliver the full current result set of a standing query on
//!   every change that touches the queried collection, in commit order.
//!
//! # Module Structure
//!
//! - `document`: [`Document`] and typed decoding helpers
//! - `query`: [`Query`] filtering and ordering
//! - `batch`: [`WriteBatch`] operations and commit outcomes

mod batch;
mod document;
mod query;

pub use batch::{
    fields, CommitOutcome, Floor, Precondition, Stamp, WriteBatch, WriteOp, WriteResult,
};
pub use document::{decode_all, encode, Document, Versioned};
pub use query::{compare_values, Direction, Filter, OrderBy, Query};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Collection names shared with the existing client screens.
pub mod collections {
    pub const USERS: &str = "users";
    pub const COUPLES: &str = "couples";
    pub const NOTES: &str = "notes";
    pub const MOODS: &str = "moods";
    pub const GIFTS: &str = "gifts";
    pub const SPECIAL_DATES: &str = "specialDates";
    pub const NOTIFICATIONS: &str = "notifications";
    /// One document per allocated invite code; keeps codes unique.
    pub const INVITE_CODES: &str = "inviteCodes";
    pub const GIFT_TRANSACTIONS: &str = "giftTransactions";
}

/// Receives the full result set of a standing query.
pub type SnapshotCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Receives the current state of a single watched document.
pub type DocumentCallback = Arc<dyn Fn(Option<Document>) + Send + Sync>;

/// Handle to a live subscription.
///
/// Dropping the handle cancels the subscription; [`Subscription::unsubscribe`]
/// does the same explicitly.
pub struct Subscription {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(id: u64, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Backend contract for the couple core.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup. `Ok(None)` when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// One-shot query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Applies every operation of `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome>;

    /// Registers a standing query. The callback fires once with the current
    /// result set and again after every commit touching the collection.
    async fn subscribe(&self, query: Query, callback: SnapshotCallback) -> Result<Subscription>;

    /// Watches one document. The callback fires once immediately and after
    /// every commit that writes it; `None` means it does not exist.
    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> Result<Subscription>;
}

/// Reads and decodes one document.
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<Versioned<T>>> {
    match store.get(collection, id).await? {
        Some(document) => Ok(Some(document.decode_versioned()?)),
        None => Ok(None),
    }
}

/// Runs a query and decodes every result.
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<T>> {
    let documents = store.query(query).await?;
    decode_all(&documents)
}
