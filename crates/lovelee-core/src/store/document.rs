//! Stored document representation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LoveleeError, Result};

/// A document as held by the store.
///
/// `data` is always a JSON object whose keys are the persisted field names.
/// `version` starts at 1 and increases on every write; `sequence` is the
/// commit sequence number that created the document and breaks ordering ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub version: u64,
    pub sequence: u64,
    pub data: Value,
}

impl Document {
    /// Returns a top-level field, `None` when absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Deserializes the document body into a domain type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| LoveleeError::Serialization {
            format: "JSON".to_string(),
            message: format!("{}/{}: {}", self.collection, self.id, e),
        })
    }

    /// Deserializes the body together with the version it was read at.
    pub fn decode_versioned<T: DeserializeOwned>(&self) -> Result<Versioned<T>> {
        Ok(Versioned {
            version: self.version,
            value: self.decode()?,
        })
    }
}

/// A decoded value paired with the document version it was read at.
///
/// The version is what a follow-up `update_if_version` must present.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Serializes a domain value into a document body.
pub fn encode<T: Serialize>(value: &T) -> Result<Value> {
    let value = serde_json::to_value(value)?;
    if !value.is_object() {
        return Err(LoveleeError::internal(
            "document bodies must serialize to a JSON object",
        ));
    }
    Ok(value)
}

/// Decodes every document of a result set.
pub fn decode_all<T: DeserializeOwned>(documents: &[Document]) -> Result<Vec<T>> {
    documents.iter().map(Document::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        couple_id: String,
    }

    #[test]
    fn test_decode_uses_persisted_field_names() {
        let doc = Document {
            collection: "notes".into(),
            id: "n1".into(),
            version: 1,
            sequence: 1,
            data: json!({ "coupleId": "c1" }),
        };
        let sample: Sample = doc.decode().unwrap();
        assert_eq!(sample.couple_id, "c1");
        assert_eq!(doc.decode_versioned::<Sample>().unwrap().version, 1);
    }

    #[test]
    fn test_encode_rejects_non_objects() {
        assert!(encode(&42).is_err());
        assert!(encode(&Sample { couple_id: "c".into() }).unwrap().is_object());
    }
}
