//! Atomic multi-document writes.

use serde_json::{Map, Value};

/// Store-assigned timestamps applied to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    None,
    /// Sets both `createdAt` and `updatedAt`.
    Created,
    /// Sets `updatedAt`.
    Updated,
}

/// Guard on a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Deleting a missing document is a no-op.
    None,
    Exists,
    Version(u64),
}

/// Lower bound enforced by an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Floor {
    /// Results below the floor are raised to it.
    Clamp(i64),
    /// Results below the floor fail the whole batch.
    Reject(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Fails if the document exists.
    Create {
        collection: String,
        id: String,
        data: Value,
        stamp: Stamp,
    },
    /// Creates or overwrites.
    Set {
        collection: String,
        id: String,
        data: Value,
        stamp: Stamp,
    },
    /// Merge-patches top-level fields of an existing document.
    Update {
        collection: String,
        id: String,
        fields: Map<String, Value>,
        expected_version: Option<u64>,
        stamp: Stamp,
    },
    /// Adds `delta` to an integer field of an existing document.
    Increment {
        collection: String,
        id: String,
        field: String,
        delta: i64,
        floor: Option<Floor>,
        stamp: Stamp,
    },
    Delete {
        collection: String,
        id: String,
        precondition: Precondition,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Create { collection, .. }
            | WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Increment { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Create { id, .. }
            | WriteOp::Set { id, .. }
            | WriteOp::Update { id, .. }
            | WriteOp::Increment { id, .. }
            | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// An ordered list of writes committed all together or not at all.
///
/// Operations see the effects of earlier operations in the same batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn create(mut self, collection: &str, id: &str, data: Value) -> Self {
        self.ops.push(WriteOp::Create {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
            stamp: Stamp::Created,
        });
        self
    }

    pub fn set(mut self, collection: &str, id: &str, data: Value) -> Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
            stamp: Stamp::Created,
        });
        self
    }

    pub fn update(mut self, collection: &str, id: &str, fields: Map<String, Value>) -> Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
            expected_version: None,
            stamp: Stamp::Updated,
        });
        self
    }

    /// Merge-patch that only applies while the document is still at `version`.
    pub fn update_if_version(
        mut self,
        collection: &str,
        id: &str,
        version: u64,
        fields: Map<String, Value>,
    ) -> Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
            expected_version: Some(version),
            stamp: Stamp::Updated,
        });
        self
    }

    pub fn increment(
        mut self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
        floor: Option<Floor>,
    ) -> Self {
        self.ops.push(WriteOp::Increment {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            delta,
            floor,
            stamp: Stamp::Updated,
        });
        self
    }

    pub fn delete(mut self, collection: &str, id: &str, precondition: Precondition) -> Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
            precondition,
        });
        self
    }
}

/// Outcome of one operation of a committed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    pub collection: String,
    pub id: String,
    /// Version after the write; `None` once deleted.
    pub version: Option<u64>,
    /// Resulting field value for increments.
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub sequence: u64,
    pub writes: Vec<WriteResult>,
}

impl CommitOutcome {
    /// Resulting value of the increment at `index` in the batch.
    pub fn incremented(&self, index: usize) -> Option<i64> {
        self.writes.get(index).and_then(|w| w.value)
    }
}

/// Builds a merge-patch field map from `(name, value)` pairs.
///
/// ```
/// use lovelee_core::store::fields;
/// use serde_json::{json, Value};
///
/// let patch = fields([("coupleId", json!("c1")), ("partnerId", Value::Null)]);
/// assert_eq!(patch.len(), 2);
/// ```
pub fn fields<I, K>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
