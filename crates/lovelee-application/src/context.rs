//! Shared handles every service is built from.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use lovelee_core::clock::Clock;
use lovelee_core::config::LoveleeConfig;
use lovelee_core::couple::Couple;
use lovelee_core::error::{LoveleeError, Result, WriteConflict};
use lovelee_core::store::{
    collections, decode_all, fetch, Document, DocumentStore, Query, Subscription, Versioned,
    WriteBatch,
};

/// Generates a fresh document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Store, clock and configuration shared by the services.
#[derive(Clone)]
pub struct CoreContext {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<LoveleeConfig>,
}

impl CoreContext {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: LoveleeConfig) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
        }
    }

    /// Reads one document, failing with `NotFound` when it is absent.
    pub(crate) async fn require<T: DeserializeOwned>(
        &self,
        collection: &str,
        entity_type: &'static str,
        id: &str,
    ) -> Result<Versioned<T>> {
        fetch(self.store.as_ref(), collection, id)
            .await?
            .ok_or_else(|| LoveleeError::not_found(entity_type, id))
    }

    /// Reads a couple and checks that `user_id` belongs to it.
    pub(crate) async fn require_member(&self, couple_id: &str, user_id: &str) -> Result<Couple> {
        let couple: Versioned<Couple> = self.require(collections::COUPLES, "Couple", couple_id).await?;
        couple.value.ensure_member(user_id)?;
        Ok(couple.value)
    }

    /// Read, compute, commit-if-unchanged, retried while the document keeps
    /// moving underneath.
    ///
    /// `compute` returns the merge patch for the document plus any further
    /// operations that must commit in the same batch; the patch is guarded by
    /// the version that was read.
    pub(crate) async fn modify<T, F>(
        &self,
        collection: &str,
        entity_type: &'static str,
        id: &str,
        mut compute: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> Result<(Map<String, Value>, WriteBatch)>,
    {
        let attempts = self.config.concurrency.max_retries.max(1);
        for attempt in 1..=attempts {
            let current: Versioned<T> = self.require(collection, entity_type, id).await?;
            let (fields, batch) = compute(&current.value)?;
            let batch = batch.update_if_version(collection, id, current.version, fields);

            match self.store.commit(batch).await {
                Ok(_) => {
                    let updated: Versioned<T> = self.require(collection, entity_type, id).await?;
                    return Ok(updated.value);
                }
                Err(e) if is_version_mismatch_on(&e, collection, id) => {
                    tracing::debug!(collection, id, attempt, "Version moved, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(collection, id, attempts, "Giving up after repeated conflicts");
        Err(LoveleeError::ConcurrentModification {
            entity_type,
            id: id.to_string(),
            attempts,
        })
    }

    /// Runs a query and decodes the results.
    pub(crate) async fn list<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        let documents = self.store.query(query).await?;
        decode_all(&documents)
    }

    /// Registers a standing query whose result sets are decoded to `T`.
    ///
    /// A result set that fails to decode is logged and dropped.
    pub(crate) async fn subscribe_typed<T, F>(&self, query: Query, callback: F) -> Result<Subscription>
    where
        T: DeserializeOwned + 'static,
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        let collection = query.collection.clone();
        self.store
            .subscribe(
                query,
                Arc::new(move |documents: Vec<Document>| match decode_all(&documents) {
                    Ok(values) => callback(values),
                    Err(e) => {
                        tracing::warn!(collection = %collection, error = %e, "Dropping undecodable snapshot");
                    }
                }),
            )
            .await
    }

    /// Watches one document, decoded to `T`.
    pub(crate) async fn subscribe_one<T, F>(
        &self,
        collection: &str,
        id: &str,
        callback: F,
    ) -> Result<Subscription>
    where
        T: DeserializeOwned + 'static,
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        self.store
            .subscribe_document(
                collection,
                id,
                Arc::new(move |document: Option<Document>| match document {
                    None => callback(None),
                    Some(document) => match document.decode() {
                        Ok(value) => callback(Some(value)),
                        Err(e) => tracing::warn!(error = %e, "Dropping undecodable document"),
                    },
                }),
            )
            .await
    }

    /// The configured page size, or `limit` when smaller.
    pub(crate) fn page(&self, limit: Option<usize>) -> usize {
        let page_size = self.config.feeds.page_size;
        limit.map_or(page_size, |l| l.min(page_size))
    }
}

/// Whether `err` is a version conflict on exactly `collection/id`.
pub(crate) fn is_version_mismatch_on(err: &LoveleeError, collection: &str, id: &str) -> bool {
    matches!(
        err,
        LoveleeError::Conflict(WriteConflict::VersionMismatch { collection: c, id: i, .. })
            if c == collection && i == id
    )
}

/// Turns a store-level "document missing" into the domain `NotFound`.
pub(crate) fn missing_as_not_found(err: LoveleeError, entity_type: &'static str) -> LoveleeError {
    match err {
        LoveleeError::Conflict(WriteConflict::Missing { id, .. }) => {
            LoveleeError::not_found(entity_type, id)
        }
        other => other,
    }
}
