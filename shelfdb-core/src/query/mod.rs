//! Query layer
//!
//! Predicates are plain `matches(document) -> bool` checks applied over a
//! document set. [`QueryProcessor`] adds index-backed property lookups on
//! top of a [`Database`](crate::storage::Database).

mod processor;

pub use processor::QueryProcessor;

use crate::document::{value_text, Document};

/// A condition a document either satisfies or not.
///
/// Implementations must be side-effect free; they may be called many times
/// and from several threads.
pub trait Predicate {
    fn matches(&self, document: &Document) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&Document) -> bool,
{
    fn matches(&self, document: &Document) -> bool {
        self(document)
    }
}

/// Field equality on text form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equality {
    pub field: String,
    pub value: String,
}

impl Equality {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl Predicate for Equality {
    fn matches(&self, document: &Document) -> bool {
        document
            .get(&self.field)
            .and_then(value_text)
            .is_some_and(|text| text == self.value)
    }
}

/// Documents from `documents` that satisfy `predicate`, in input order
pub fn find<P>(predicate: &P, documents: &[Document]) -> Vec<Document>
where
    P: Predicate + ?Sized,
{
    documents
        .iter()
        .filter(|doc| predicate.matches(doc))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::payload_from_value;
    use serde_json::json;

    fn docs() -> Vec<Document> {
        vec![
            json!({"name": "John", "age": 30}),
            json!({"name": "Jane", "age": 25}),
            json!({"name": "Jim", "age": 30}),
            json!({"nickname": "J"}),
        ]
        .into_iter()
        .map(|v| Document::new(payload_from_value(v).unwrap()))
        .collect()
    }

    #[test]
    fn test_equality_on_text_form() {
        let docs = docs();
        assert!(Equality::new("name", "John").matches(&docs[0]));
        assert!(Equality::new("age", "30").matches(&docs[0]));
        assert!(!Equality::new("name", "John").matches(&docs[1]));
        assert!(!Equality::new("name", "John").matches(&docs[3]));
    }

    #[test]
    fn test_find_preserves_order() {
        let docs = docs();
        let found = find(&Equality::new("age", "30"), &docs);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), docs[0].id());
        assert_eq!(found[1].id(), docs[2].id());
    }

    #[test]
    fn test_closure_predicate() {
        let docs = docs();
        let young = |d: &Document| d.get("age").and_then(|a| a.as_u64()).is_some_and(|a| a < 30);
        let found = find(&young, &docs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("name"), Some(&json!("Jane")));
    }

    #[test]
    fn test_find_on_empty_set() {
        assert!(find(&Equality::new("name", "John"), &[]).is_empty());
    }
}
