//! ShelfDB Core - Embedded Document Store
//!
//! JSON documents grouped into named collections, one file per document,
//! with persistent single-field secondary indexes and optimistic
//! concurrency on updates.
//!
//! # Architecture
//!
//! - **Document**: id, version counter and ordered JSON payload
//! - **Index**: inverted value -> id-set mapping, rewritten on every change
//! - **Storage**: databases, collections, the document cache and the
//!   create/get/update/delete protocol that keeps indexes in step
//! - **Query**: predicates, full scans and index-backed property lookups
//! - **Schema**: pluggable payload validation run before every write
//!
//! # Example
//!
//! ```no_run
//! use shelfdb_core::storage::{StorageConfig, StorageEngine};
//! use shelfdb_core::query::QueryProcessor;
//! use shelfdb_core::payload_from_value;
//! use serde_json::json;
//!
//! # fn main() -> shelfdb_core::Result<()> {
//! let engine = StorageEngine::new(StorageConfig::default())?;
//! let db = engine.get_or_create_database("app")?;
//!
//! let payload = payload_from_value(json!({"name": "John", "age": 30}))?;
//! let doc = db.create_document("users", payload, Some("name"))?;
//!
//! let johns = QueryProcessor::new(&db).find_by_indexed_property("users", "name", "John")?;
//! assert_eq!(johns[0].id(), doc.id());
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod index;
pub mod query;
pub mod schema;
pub mod storage;

mod error;
mod file;

pub use document::{payload_from_value, value_text, Document, DocumentId, Payload};
pub use error::{Result, ShelfError};

/// ShelfDB version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk layout constants
pub mod config {
    /// Default root directory for databases
    pub const DEFAULT_DATA_DIR: &str = "data/db";

    /// Reserved per-database directory holding index files
    pub const INDEX_DIR: &str = "_indexes";

    /// Extension of document files
    pub const DOCUMENT_EXTENSION: &str = "json";

    /// Extension of index files
    pub const INDEX_EXTENSION: &str = "idx";
}
