//! Document model
//!
//! A document is a versioned, uniquely identified record holding an
//! insertion-ordered JSON payload. The encoded form carries the id and
//! version alongside the payload so a document file is self-describing.

use crate::schema::{ValidationError, Violation};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Document identifier
pub type DocumentId = Uuid;

/// Ordered mapping from field name to value
pub type Payload = Map<String, Value>;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    version: u64,
    payload: Payload,
}

impl Document {
    /// Create a new document with a fresh id at version 0
    pub fn new(payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            payload,
        }
    }

    /// Build the successor of `self` carrying a new payload.
    ///
    /// The id is preserved and the version is bumped by one.
    pub(crate) fn successor(&self, payload: Payload) -> Self {
        let mut next = Self {
            id: self.id,
            version: self.version,
            payload,
        };
        next.increment_version();
        next
    }

    /// Reconstruct a document from its persisted form
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize the document for storage
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn increment_version(&mut self) {
        self.version += 1;
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// Add or replace a field, returning the previous value
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.payload.insert(field.into(), value.into())
    }

    /// Remove a field, keeping the order of the remaining ones
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.payload.shift_remove(field)
    }

    /// Text form of a top-level field, as used by indexes and equality queries
    pub fn field_text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(value_text)
    }
}

/// Text form of a scalar JSON value.
///
/// Objects and arrays have no text form and are never indexed.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Convert an arbitrary JSON value into a payload
pub fn payload_from_value(value: Value) -> std::result::Result<Payload, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::single(Violation::new(
            "$root",
            format!("expected object, found {}", crate::schema::json_type_name(&other)),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        payload_from_value(value).unwrap()
    }

    #[test]
    fn test_new_document() {
        let doc = Document::new(payload(json!({"name": "John", "age": 30})));
        assert_eq!(doc.version(), 0);
        assert_eq!(doc.get("name"), Some(&json!("John")));
        assert_ne!(doc.id(), Document::new(Payload::new()).id());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let doc = Document::new(payload(json!({
            "name": "John",
            "tags": ["a", "b"],
            "address": {"city": "Amman", "zip": null},
            "active": true
        })));

        let bytes = doc.encode().unwrap();
        let decoded = Document::decode(&bytes).unwrap();
        assert_eq!(decoded, doc);

        let keys: Vec<_> = decoded.payload().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "tags", "address", "active"]);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(Document::decode(b"not json").is_err());
        assert!(Document::decode(br#"{"id": "nope", "version": 0, "payload": {}}"#).is_err());
        assert!(Document::decode(
            br#"{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "version": 0, "payload": [1]}"#
        )
        .is_err());
    }

    #[test]
    fn test_field_accessors_leave_identity_alone() {
        let mut doc = Document::new(payload(json!({"a": 1, "b": 2, "c": 3})));
        let id = doc.id();

        assert_eq!(doc.set("d", "four"), None);
        assert_eq!(doc.set("a", 10), Some(json!(1)));
        assert_eq!(doc.remove("b"), Some(json!(2)));
        assert_eq!(doc.remove("missing"), None);

        let keys: Vec<_> = doc.payload().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
        assert_eq!(doc.id(), id);
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_successor_bumps_version() {
        let mut doc = Document::new(Payload::new());
        doc.increment_version();
        let next = doc.successor(payload(json!({"x": 1})));
        assert_eq!(next.id(), doc.id());
        assert_eq!(next.version(), 2);
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("John")).as_deref(), Some("John"));
        assert_eq!(value_text(&json!(30)).as_deref(), Some("30"));
        assert_eq!(value_text(&json!(2.5)).as_deref(), Some("2.5"));
        assert_eq!(value_text(&json!(false)).as_deref(), Some("false"));
        assert_eq!(value_text(&Value::Null).as_deref(), Some("null"));
        assert_eq!(value_text(&json!({"a": 1})), None);
        assert_eq!(value_text(&json!([1])), None);
    }

    #[test]
    fn test_payload_from_non_object() {
        let err = payload_from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.violations()[0].field, "$root");
    }
}
