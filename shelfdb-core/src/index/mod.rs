//! Secondary index
//!
//! An inverted mapping from the text form of one field's value to the set
//! of documents holding it. The index is derived state: the whole mapping
//! is rewritten to disk after every mutation and can be rebuilt from the
//! documents at any time.
//!
//! The index does no locking of its own. Mutating methods take `&mut self`
//! and the owning database only reaches them from inside its write lock.

mod codec;

use crate::document::DocumentId;
use crate::{file, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

type Entries = BTreeMap<String, BTreeSet<DocumentId>>;

/// Persistent single-field index
#[derive(Debug)]
pub struct SecondaryIndex {
    path: PathBuf,
    entries: Entries,
    sync_writes: bool,
}

impl SecondaryIndex {
    /// Open the index stored at `path`, starting empty if the file is absent.
    ///
    /// A file that exists but cannot be parsed is an error: an index is
    /// either valid or missing, never partially trusted.
    pub fn open(path: impl Into<PathBuf>, sync_writes: bool) -> Result<Self> {
        let path = path.into();
        let entries = match file::read_if_exists(&path)? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    crate::ShelfError::Decode(format!("Index {:?} is not UTF-8: {}", path, e))
                })?;
                codec::decode(&text)?
            }
            None => Entries::new(),
        };

        debug!("Opened index {:?} with {} values", path, entries.len());

        Ok(Self {
            path,
            entries,
            sync_writes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `id` under `value` and persist. Adding an existing pair is a no-op.
    pub fn add(&mut self, value: &str, id: DocumentId) -> Result<()> {
        if self.insert(value, id) {
            self.persist()?;
        }
        Ok(())
    }

    /// Remove `id` from `value` and persist, dropping the value once empty
    pub fn remove(&mut self, value: &str, id: DocumentId) -> Result<()> {
        if self.delete(value, id) {
            self.persist()?;
        }
        Ok(())
    }

    /// Move `id` from `old` to `new` with a single write
    pub fn reindex(
        &mut self,
        old: Option<&str>,
        new: Option<&str>,
        id: DocumentId,
    ) -> Result<()> {
        let mut changed = false;
        if let Some(old) = old {
            changed |= self.delete(old, id);
        }
        if let Some(new) = new {
            changed |= self.insert(new, id);
        }
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    /// Ids currently stored under `value`
    pub fn lookup(&self, value: &str) -> BTreeSet<DocumentId> {
        self.entries.get(value).cloned().unwrap_or_default()
    }

    /// Replace the whole mapping and persist
    pub fn rebuild<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, DocumentId)>,
    {
        let mut entries = Entries::new();
        for (value, id) in pairs {
            entries.entry(value).or_default().insert(id);
        }
        self.entries = entries;
        self.persist()
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (value, id) pairs
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(|ids| ids.len()).sum()
    }

    /// Delete the backing file
    pub fn destroy(self) -> Result<()> {
        file::remove_if_exists(&self.path)?;
        Ok(())
    }

    fn insert(&mut self, value: &str, id: DocumentId) -> bool {
        self.entries.entry(value.to_string()).or_default().insert(id)
    }

    fn delete(&mut self, value: &str, id: DocumentId) -> bool {
        let Some(ids) = self.entries.get_mut(value) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.entries.remove(value);
        }
        removed
    }

    fn persist(&self) -> Result<()> {
        let text = codec::encode(&self.entries);
        file::write_atomic(&self.path, text.as_bytes(), self.sync_writes)
    }
}
