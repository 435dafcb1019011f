//! Property lookups with index fast path and full-scan fallback

use super::{find, Equality, Predicate};
use crate::document::Document;
use crate::storage::Database;
use crate::Result;
use tracing::debug;

/// Resolves property lookups against a database
pub struct QueryProcessor<'a> {
    db: &'a Database,
}

impl<'a> QueryProcessor<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Documents in `collection` whose `field` has text form `value`.
    ///
    /// Uses the index on `(collection, field)` when one exists and has ids
    /// for `value`. Each resolved document is re-checked against `field`, so
    /// ids whose documents have vanished or changed are dropped. Otherwise
    /// falls back to scanning every document in the collection, which is
    /// O(collection size). The fallback also runs when an index exists but
    /// knows nothing of `value`, or when none of its ids still match, so a
    /// stale index never hides documents.
    pub fn find_by_indexed_property(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>> {
        let equality = Equality::new(field, value);
        match self.db.lookup_index(collection, field, value) {
            Some(ids) if !ids.is_empty() => {
                let mut documents = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.db.get_document(collection, id)? {
                        Some(doc) if equality.matches(&doc) => documents.push(doc),
                        _ => {}
                    }
                }
                if !documents.is_empty() {
                    return Ok(documents);
                }
                debug!(
                    "Index {}.{} entries for {:?} are stale, scanning",
                    collection, field, value
                );
                self.find_in_collection(collection, &equality)
            }
            Some(_) => {
                debug!(
                    "Index {}.{} has no entry for {:?}, scanning",
                    collection, field, value
                );
                self.find_in_collection(collection, &equality)
            }
            None => {
                debug!("No index on {}.{}, scanning", collection, field);
                self.find_in_collection(collection, &equality)
            }
        }
    }

    /// Full scan of `collection` filtered by `predicate`
    pub fn find_in_collection<P>(&self, collection: &str, predicate: &P) -> Result<Vec<Document>>
    where
        P: Predicate + ?Sized,
    {
        let documents = self.db.list_all(collection)?;
        Ok(find(predicate, &documents))
    }
}
