//! In-process document store.
//!
//! Implements the full [`DocumentStore`] contract: atomic batches, per-document
//! versions, server-side timestamps, and standing-query subscriptions. When
//! opened with a snapshot path, every commit is persisted to a JSON file
//! before it becomes visible, and the file is reloaded on the next open.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;

use lovelee_core::clock::{Clock, SystemClock};
use lovelee_core::error::{LoveleeError, Result, WriteConflict};
use lovelee_core::store::{
    CommitOutcome, Document, DocumentCallback, DocumentStore, Floor, Precondition, Query,
    SnapshotCallback, Stamp, Subscription, WriteBatch, WriteOp, WriteResult,
};

use crate::fault::FaultInjector;
use crate::storage::{AtomicFile, FileFormat};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

type Key = (String, String);

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

/// Keys written by one commit, broadcast to subscribers.
#[derive(Debug, Clone)]
struct ChangeSet {
    keys: Vec<Key>,
}

impl ChangeSet {
    fn touches_collection(&self, collection: &str) -> bool {
        self.keys.iter().any(|(c, _)| c == collection)
    }

    fn touches(&self, collection: &str, id: &str) -> bool {
        self.keys.iter().any(|(c, i)| c == collection && i == id)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    sequence: u64,
    documents: Vec<Document>,
}

#[derive(Debug, Default)]
struct StoreState {
    documents: BTreeMap<Key, Document>,
    sequence: u64,
}

impl StoreState {
    fn run(&self, query: &Query) -> Vec<Document> {
        query.apply(
            self.documents
                .iter()
                .filter(|((collection, _), _)| collection == &query.collection)
                .map(|(_, doc)| doc.clone()),
        )
    }
}

/// Document store held in memory, optionally mirrored to a JSON snapshot.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<StoreState>>,
    changes: broadcast::Sender<ChangeSet>,
    clock: Arc<dyn Clock>,
    faults: FaultInjector,
    snapshot: Option<Arc<AtomicFile<StoreSnapshot>>>,
    next_subscription: Arc<AtomicU64>,
}

impl InMemoryDocumentStore {
    /// Creates an empty, non-persistent store stamping times from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            changes,
            clock,
            faults: FaultInjector::new(),
            snapshot: None,
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Creates an empty, non-persistent store on the wall clock.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Opens a store persisted at `path`, loading any existing snapshot.
    pub async fn open(path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self> {
        let file = Arc::new(AtomicFile::<StoreSnapshot>::new(path, FileFormat::Json));
        let loader = file.clone();
        let snapshot = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| LoveleeError::internal(format!("Failed to join task: {}", e)))??
            .unwrap_or_default();

        tracing::info!(
            path = ?file.path(),
            documents = snapshot.documents.len(),
            sequence = snapshot.sequence,
            "Opened document store snapshot"
        );

        let mut store = Self::new(clock);
        {
            let mut state = store.state.write().await;
            state.sequence = snapshot.sequence;
            for doc in snapshot.documents {
                state.documents.insert(key(&doc.collection, &doc.id), doc);
            }
        }
        store.snapshot = Some(file);
        Ok(store)
    }

    /// Failure injection hooks shared by all clones of this store.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Number of documents currently in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        let state = self.state.read().await;
        state
            .documents
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    async fn persist(&self, snapshot: StoreSnapshot) -> Result<()> {
        let Some(file) = self.snapshot.clone() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || file.save(&snapshot))
            .await
            .map_err(|e| LoveleeError::internal(format!("Failed to join task: {}", e)))?
            .map_err(|e| LoveleeError::data_access(format!("Failed to persist commit: {}", e)))
    }

    fn next_subscription_id(&self) -> u64 {
        self.next_subscription.fetch_add(1, Ordering::Relaxed)
    }
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn apply_stamp(data: &mut Value, stamp: Stamp, now: DateTime<Utc>) {
    let Some(object) = data.as_object_mut() else {
        return;
    };
    match stamp {
        Stamp::None => {}
        Stamp::Created => {
            object.insert("createdAt".to_string(), timestamp(now));
            object.insert("updatedAt".to_string(), timestamp(now));
        }
        Stamp::Updated => {
            object.insert("updatedAt".to_string(), timestamp(now));
        }
    }
}

fn missing(collection: &str, id: &str) -> LoveleeError {
    WriteConflict::Missing {
        collection: collection.to_string(),
        id: id.to_string(),
    }
    .into()
}

fn check_version(collection: &str, id: &str, expected: u64, actual: u64) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(WriteConflict::VersionMismatch {
            collection: collection.to_string(),
            id: id.to_string(),
            expected,
            actual,
        }
        .into())
    }
}

/// Staged view of one commit: reads fall through to the committed state.
struct Staging<'a> {
    committed: &'a BTreeMap<Key, Document>,
    staged: HashMap<Key, Option<Document>>,
    order: Vec<Key>,
    sequence: u64,
    now: DateTime<Utc>,
}

impl<'a> Staging<'a> {
    fn current(&self, collection: &str, id: &str) -> Option<Document> {
        let k = key(collection, id);
        match self.staged.get(&k) {
            Some(staged) => staged.clone(),
            None => self.committed.get(&k).cloned(),
        }
    }

    fn stage(&mut self, collection: &str, id: &str, doc: Option<Document>) {
        let k = key(collection, id);
        if !self.staged.contains_key(&k) {
            self.order.push(k.clone());
        }
        self.staged.insert(k, doc);
    }

    fn new_document(&self, collection: &str, id: &str, mut data: Value, stamp: Stamp) -> Result<Document> {
        if !data.is_object() {
            return Err(LoveleeError::internal(format!(
                "{}/{}: document body must be an object",
                collection, id
            )));
        }
        apply_stamp(&mut data, stamp, self.now);
        Ok(Document {
            collection: collection.to_string(),
            id: id.to_string(),
            version: 1,
            sequence: self.sequence,
            data,
        })
    }

    fn apply(&mut self, op: WriteOp) -> Result<WriteResult> {
        match op {
            WriteOp::Create {
                collection,
                id,
                data,
                stamp,
            } => {
                if self.current(&collection, &id).is_some() {
                    return Err(WriteConflict::AlreadyExists { collection, id }.into());
                }
                let doc = self.new_document(&collection, &id, data, stamp)?;
                self.stage(&collection, &id, Some(doc));
                Ok(WriteResult {
                    collection,
                    id,
                    version: Some(1),
                    value: None,
                })
            }
            WriteOp::Set {
                collection,
                id,
                data,
                stamp,
            } => {
                let mut doc = self.new_document(&collection, &id, data, stamp)?;
                if let Some(existing) = self.current(&collection, &id) {
                    doc.version = existing.version + 1;
                    doc.sequence = existing.sequence;
                }
                let version = doc.version;
                self.stage(&collection, &id, Some(doc));
                Ok(WriteResult {
                    collection,
                    id,
                    version: Some(version),
                    value: None,
                })
            }
            WriteOp::Update {
                collection,
                id,
                fields,
                expected_version,
                stamp,
            } => {
                let mut doc = self
                    .current(&collection, &id)
                    .ok_or_else(|| missing(&collection, &id))?;
                if let Some(expected) = expected_version {
                    check_version(&collection, &id, expected, doc.version)?;
                }
                let object = doc.data.as_object_mut().ok_or_else(|| {
                    LoveleeError::internal(format!("{}/{}: body is not an object", collection, id))
                })?;
                object.extend(fields);
                apply_stamp(&mut doc.data, stamp, self.now);
                doc.version += 1;
                let version = doc.version;
                self.stage(&collection, &id, Some(doc));
                Ok(WriteResult {
                    collection,
                    id,
                    version: Some(version),
                    value: None,
                })
            }
            WriteOp::Increment {
                collection,
                id,
                field,
                delta,
                floor,
                stamp,
            } => {
                let mut doc = self
                    .current(&collection, &id)
                    .ok_or_else(|| missing(&collection, &id))?;
                let current = match doc.data.get(&field) {
                    None | Some(Value::Null) => 0,
                    Some(value) => value.as_i64().ok_or_else(|| WriteConflict::NotAnInteger {
                        collection: collection.clone(),
                        id: id.clone(),
                        field: field.clone(),
                    })?,
                };
                let attempted = current.saturating_add(delta);
                let next = match floor {
                    None => attempted,
                    Some(Floor::Clamp(min)) => attempted.max(min),
                    Some(Floor::Reject(min)) if attempted < min => {
                        return Err(WriteConflict::BelowFloor {
                            collection,
                            id,
                            field,
                            floor: min,
                            attempted,
                        }
                        .into());
                    }
                    Some(Floor::Reject(_)) => attempted,
                };
                if let Some(object) = doc.data.as_object_mut() {
                    object.insert(field, Value::from(next));
                }
                apply_stamp(&mut doc.data, stamp, self.now);
                doc.version += 1;
                let version = doc.version;
                self.stage(&collection, &id, Some(doc));
                Ok(WriteResult {
                    collection,
                    id,
                    version: Some(version),
                    value: Some(next),
                })
            }
            WriteOp::Delete {
                collection,
                id,
                precondition,
            } => {
                let existing = self.current(&collection, &id);
                match (precondition, &existing) {
                    (Precondition::None, _) => {}
                    (Precondition::Exists, None) | (Precondition::Version(_), None) => {
                        return Err(missing(&collection, &id));
                    }
                    (Precondition::Exists, Some(_)) => {}
                    (Precondition::Version(expected), Some(doc)) => {
                        check_version(&collection, &id, expected, doc.version)?;
                    }
                }
                if existing.is_some() {
                    self.stage(&collection, &id, None);
                }
                Ok(WriteResult {
                    collection,
                    id,
                    version: None,
                    value: None,
                })
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.get(&key(collection, id)).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.run(query))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        if batch.is_empty() {
            return Ok(CommitOutcome {
                sequence: state.sequence,
                writes: Vec::new(),
            });
        }

        let sequence = state.sequence + 1;
        let mut staging = Staging {
            committed: &state.documents,
            staged: HashMap::new(),
            order: Vec::new(),
            sequence,
            now: self.clock.now(),
        };

        let mut writes = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            self.faults.check(&op)?;
            match staging.apply(op) {
                Ok(result) => writes.push(result),
                Err(e) => {
                    tracing::debug!(error = %e, "Batch rejected, nothing applied");
                    return Err(e);
                }
            }
        }

        let Staging { staged, order, .. } = staging;

        if self.snapshot.is_some() {
            let mut documents = state.documents.clone();
            for (k, doc) in &staged {
                match doc {
                    Some(doc) => {
                        documents.insert(k.clone(), doc.clone());
                    }
                    None => {
                        documents.remove(k);
                    }
                }
            }
            self.persist(StoreSnapshot {
                sequence,
                documents: documents.into_values().collect(),
            })
            .await?;
        }

        for (k, doc) in staged {
            match doc {
                Some(doc) => {
                    state.documents.insert(k, doc);
                }
                None => {
                    state.documents.remove(&k);
                }
            }
        }
        state.sequence = sequence;
        drop(state);

        tracing::debug!(sequence, writes = writes.len(), "Committed batch");
        // No receivers is not an error: nobody is subscribed yet.
        let _ = self.changes.send(ChangeSet { keys: order });

        Ok(CommitOutcome { sequence, writes })
    }

    async fn subscribe(&self, query: Query, callback: SnapshotCallback) -> Result<Subscription> {
        // Subscribe to changes before reading so nothing committed in between is missed.
        let mut receiver = self.changes.subscribe();
        let initial = self.state.read().await.run(&query);
        callback(initial.clone());

        let state = self.state.clone();
        let id = self.next_subscription_id();
        tracing::debug!(subscription = id, collection = %query.collection, "Subscribed");

        let handle = tokio::spawn(async move {
            let mut last = initial;
            loop {
                match receiver.recv().await {
                    Ok(change) if !change.touches_collection(&query.collection) => continue,
                    Ok(_) => {}
                    // Lagging only means events were dropped; a fresh full result set covers them.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(subscription = id, skipped, "Subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
                let results = state.read().await.run(&query);
                if results != last {
                    last = results.clone();
                    callback(results);
                }
            }
        });

        let abort = handle.abort_handle();
        Ok(Subscription::new(id, move || {
            tracing::debug!(subscription = id, "Unsubscribed");
            abort.abort();
        }))
    }

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> Result<Subscription> {
        let mut receiver = self.changes.subscribe();
        let watched = key(collection, id);
        let initial = self.state.read().await.documents.get(&watched).cloned();
        callback(initial);

        let state = self.state.clone();
        let subscription_id = self.next_subscription_id();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) if !change.touches(&watched.0, &watched.1) => continue,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                let current = state.read().await.documents.get(&watched).cloned();
                callback(current);
            }
        });

        let abort = handle.abort_handle();
        Ok(Subscription::new(subscription_id, move || abort.abort()))
    }
}
