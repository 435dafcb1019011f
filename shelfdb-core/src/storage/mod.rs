//! Storage engine - owns databases, collections and document files
//!
//! On-disk layout:
//!
//! ```text
//! <data_dir>/<database>/<collection>/<document id>.json
//! <data_dir>/<database>/_indexes/<collection>.<field>.idx
//! ```

mod database;
mod engine;

pub use database::{Database, DatabaseStats, UpdateOutcome};
pub use engine::{EngineStats, StorageEngine};

use crate::{Result, ShelfError};
use std::path::PathBuf;

/// Storage engine configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per database
    pub data_dir: PathBuf,
    /// fsync document and index files before they are renamed into place
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(crate::config::DEFAULT_DATA_DIR),
            sync_writes: true,
        }
    }
}

/// Check a database or collection name.
///
/// Names become directory names, so only ASCII alphanumerics, `_` and `-`
/// are allowed, and a leading `_` is reserved for internal directories.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ShelfError::InvalidName(format!("{} name is empty", kind)));
    }
    if name.starts_with('_') || name.starts_with('-') {
        return Err(ShelfError::InvalidName(format!(
            "{} name {:?} may not start with '{}'",
            kind,
            name,
            &name[..1]
        )));
    }
    if !name.chars().all(is_name_char) {
        return Err(ShelfError::InvalidName(format!(
            "{} name {:?} contains unsupported characters",
            kind, name
        )));
    }
    Ok(())
}

/// Check a field name used for indexing. It becomes part of a file name.
pub(crate) fn validate_field(field: &str) -> Result<()> {
    if field.is_empty() || !field.chars().all(is_name_char) {
        return Err(ShelfError::InvalidName(format!(
            "field {:?} cannot be indexed",
            field
        )));
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(validate_name("collection", "users").is_ok());
        assert!(validate_name("collection", "user_events-2024").is_ok());

        for bad in ["", "_indexes", "-x", "a/b", "..", "a.b", "名前"] {
            assert!(
                matches!(validate_name("collection", bad), Err(ShelfError::InvalidName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_fields() {
        assert!(validate_field("name").is_ok());
        assert!(validate_field("_id").is_ok());
        assert!(validate_field("a.b").is_err());
        assert!(validate_field("").is_err());
    }
}
