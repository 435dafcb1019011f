//! Database - collections, document cache and the write protocol

use super::{validate_field, validate_name, StorageConfig};
use crate::document::{Document, DocumentId, Payload};
use crate::index::SecondaryIndex;
use crate::query::{self, Predicate};
use crate::schema::Validator;
use crate::{config, file, Result, ShelfError};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

type CacheKey = (String, DocumentId);

/// Identifies the index covering one field of one collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
    collection: String,
    field: String,
}

impl IndexKey {
    fn new(collection: &str, field: &str) -> Self {
        Self {
            collection: collection.to_string(),
            field: field.to_string(),
        }
    }

    fn file_name(&self) -> String {
        format!(
            "{}.{}.{}",
            self.collection,
            self.field,
            config::INDEX_EXTENSION
        )
    }

    fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", config::INDEX_EXTENSION))?;
        let (collection, field) = stem.split_once('.')?;
        if validate_name("collection", collection).is_err() || validate_field(field).is_err() {
            return None;
        }
        Some(Self::new(collection, field))
    }
}

/// Result of an optimistic update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update was applied; holds the new document
    Updated(Document),
    /// The stored version did not match the caller's expectation
    Conflict { expected: u64, actual: u64 },
    /// No such document
    NotFound,
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated(_))
    }

    /// Turn conflicts and misses into errors
    pub fn into_result(self) -> Result<Document> {
        match self {
            UpdateOutcome::Updated(doc) => Ok(doc),
            UpdateOutcome::Conflict { expected, actual } => {
                Err(ShelfError::VersionConflict { expected, actual })
            }
            UpdateOutcome::NotFound => Err(ShelfError::NotFound("document".to_string())),
        }
    }
}

/// A single ShelfDB database
pub struct Database {
    name: String,
    dir: PathBuf,
    sync_writes: bool,
    validator: Arc<dyn Validator>,

    // Read path
    cache: DashMap<CacheKey, Document>,

    // Write domain: every create/update/delete and every cache fill from
    // disk runs under this lock, which also owns the open indexes.
    indexes: Mutex<HashMap<IndexKey, SecondaryIndex>>,
}

impl Database {
    /// Create or open a database under `config.data_dir`
    pub fn open(name: &str, config: &StorageConfig, validator: Arc<dyn Validator>) -> Result<Self> {
        validate_name("database", name)?;

        let dir = config.data_dir.join(name);
        let index_dir = dir.join(config::INDEX_DIR);
        fs::create_dir_all(&index_dir)?;

        let indexes = Self::load_indexes(&index_dir, config.sync_writes)?;
        if !indexes.is_empty() {
            info!("Loaded {} indexes for database {}", indexes.len(), name);
        }

        Ok(Self {
            name: name.to_string(),
            dir,
            sync_writes: config.sync_writes,
            validator,
            cache: DashMap::new(),
            indexes: Mutex::new(indexes),
        })
    }

    /// Get database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get database directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create a collection. Returns `false` if it already existed.
    pub fn create_collection(&self, name: &str) -> Result<bool> {
        validate_name("collection", name)?;

        match fs::create_dir(self.collection_dir(name)) {
            Ok(()) => {
                info!("Created collection {}.{}", self.name, name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Collection {}.{} already exists", self.name, name);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a collection with all its documents and indexes.
    /// Returns `false` if it did not exist.
    pub fn delete_collection(&self, name: &str) -> Result<bool> {
        validate_name("collection", name)?;
        let mut indexes = self.indexes.lock();

        let dir = self.collection_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;

        self.cache.retain(|(collection, _), _| collection != name);

        let keys: Vec<IndexKey> = indexes
            .keys()
            .filter(|k| k.collection == name)
            .cloned()
            .collect();
        for key in keys {
            if let Some(index) = indexes.remove(&key) {
                index.destroy()?;
            }
        }

        info!("Deleted collection {}.{}", self.name, name);
        Ok(true)
    }

    /// List collection names, sorted
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if validate_name("collection", &name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Validate and store a new document.
    ///
    /// When `indexed_field` is given, an index on that field is opened (and
    /// built from existing documents if new). Documents lacking the field
    /// are simply not indexed.
    pub fn create_document(
        &self,
        collection: &str,
        payload: Payload,
        indexed_field: Option<&str>,
    ) -> Result<Document> {
        validate_name("collection", collection)?;
        if let Some(field) = indexed_field {
            validate_field(field)?;
        }
        self.validator.validate(&payload)?;

        let doc = Document::new(payload);
        let mut indexes = self.indexes.lock();

        if let Some(field) = indexed_field {
            self.index_for(&mut indexes, collection, field)?;
        }

        fs::create_dir_all(self.collection_dir(collection))?;
        self.write_document(collection, &doc)?;
        self.cache
            .insert((collection.to_string(), doc.id()), doc.clone());
        self.sync_indexes(&mut indexes, collection, doc.id(), None, Some(&doc))?;

        debug!("Created document {}/{}", collection, doc.id());
        Ok(doc)
    }

    /// Fetch a document from cache or disk. A missing document is `None`.
    pub fn get_document(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        validate_name("collection", collection)?;

        if let Some(doc) = self.cached(collection, id) {
            return Ok(Some(doc));
        }

        let _guard = self.indexes.lock();
        self.resolve(collection, id)
    }

    /// Replace a document's payload if its version still equals `expected_version`.
    ///
    /// Conflicts and missing documents are reported through [`UpdateOutcome`];
    /// only validation and I/O failures are errors.
    pub fn update_document(
        &self,
        collection: &str,
        id: DocumentId,
        payload: Payload,
        indexed_field: Option<&str>,
        expected_version: u64,
    ) -> Result<UpdateOutcome> {
        validate_name("collection", collection)?;
        if let Some(field) = indexed_field {
            validate_field(field)?;
        }

        let mut indexes = self.indexes.lock();

        let Some(current) = self.resolve(collection, id)? else {
            debug!("Update of {}/{} failed: not found", collection, id);
            return Ok(UpdateOutcome::NotFound);
        };

        self.validator.validate(&payload)?;

        if current.version() != expected_version {
            debug!(
                "Update of {}/{} rejected: expected version {}, found {}",
                collection,
                id,
                expected_version,
                current.version()
            );
            return Ok(UpdateOutcome::Conflict {
                expected: expected_version,
                actual: current.version(),
            });
        }

        if let Some(field) = indexed_field {
            self.index_for(&mut indexes, collection, field)?;
        }

        let next = current.successor(payload);
        self.write_document(collection, &next)?;
        self.cache.insert((collection.to_string(), id), next.clone());
        self.sync_indexes(&mut indexes, collection, id, Some(&current), Some(&next))?;

        debug!("Updated document {}/{} to version {}", collection, id, next.version());
        Ok(UpdateOutcome::Updated(next))
    }

    /// Delete a document. Returns whether anything was removed.
    pub fn delete_document(
        &self,
        collection: &str,
        id: DocumentId,
        indexed_field: Option<&str>,
    ) -> Result<bool> {
        validate_name("collection", collection)?;
        if let Some(field) = indexed_field {
            validate_field(field)?;
        }

        let mut indexes = self.indexes.lock();

        let current = match self.cached(collection, id) {
            Some(doc) => Some(doc),
            None => self.read_document(collection, id)?,
        };
        let Some(doc) = current else {
            return Ok(false);
        };

        if let Some(field) = indexed_field {
            self.index_for(&mut indexes, collection, field)?;
        }
        self.sync_indexes(&mut indexes, collection, id, Some(&doc), None)?;
        file::remove_if_exists(&self.document_path(collection, id))?;
        self.cache.remove(&(collection.to_string(), id));

        debug!("Deleted document {}/{}", collection, id);
        Ok(true)
    }

    /// Decode every document file in a collection, sorted by file name.
    ///
    /// Files that fail to decode are logged and skipped. The cache is not
    /// consulted or filled. A missing collection yields an empty list.
    pub fn list_all(&self, collection: &str) -> Result<Vec<Document>> {
        validate_name("collection", collection)?;

        let read_dir = match fs::read_dir(self.collection_dir(collection)) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == config::DOCUMENT_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = match file::read_if_exists(&path)? {
                Some(bytes) => bytes,
                None => continue,
            };
            match decode_document(&path, &bytes) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping document file {:?}: {}", path, e),
            }
        }

        Ok(documents)
    }

    /// Documents from `documents` matching `predicate`, in input order
    pub fn find<P>(&self, predicate: &P, documents: &[Document]) -> Vec<Document>
    where
        P: Predicate + ?Sized,
    {
        query::find(predicate, documents)
    }

    /// Recompute the index on `field` from the documents on disk.
    ///
    /// Used to repair an index after a crash between a document write and
    /// the matching index write. Returns the number of indexed documents.
    pub fn rebuild_index(&self, collection: &str, field: &str) -> Result<usize> {
        validate_name("collection", collection)?;
        validate_field(field)?;

        let mut indexes = self.indexes.lock();
        let index = self.build_index(collection, field)?;
        let count = index.entry_count();
        indexes.insert(IndexKey::new(collection, field), index);

        info!(
            "Rebuilt index {}.{} on {}: {} entries",
            self.name, collection, field, count
        );
        Ok(count)
    }

    /// Whether an index covers `field` of `collection`
    pub fn has_index(&self, collection: &str, field: &str) -> bool {
        self.indexes
            .lock()
            .contains_key(&IndexKey::new(collection, field))
    }

    /// Ids indexed under `value`, or `None` if no index covers the field
    pub fn lookup_index(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Option<BTreeSet<DocumentId>> {
        self.indexes
            .lock()
            .get(&IndexKey::new(collection, field))
            .map(|index| index.lookup(value))
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let collections = self.list_collections().map(|c| c.len()).unwrap_or(0);
        let indexes = self.indexes.lock();

        DatabaseStats {
            name: self.name.clone(),
            collections,
            cached_documents: self.cache.len(),
            indexes: indexes.len(),
            index_entries: indexes.values().map(|i| i.entry_count()).sum(),
        }
    }

    fn cached(&self, collection: &str, id: DocumentId) -> Option<Document> {
        self.cache
            .get(&(collection.to_string(), id))
            .map(|entry| entry.value().clone())
    }

    /// Cache-or-disk lookup that fills the cache. Caller holds the write lock.
    fn resolve(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        if let Some(doc) = self.cached(collection, id) {
            return Ok(Some(doc));
        }

        let doc = self.read_document(collection, id)?;
        if let Some(doc) = &doc {
            self.cache.insert((collection.to_string(), id), doc.clone());
        }
        Ok(doc)
    }

    fn read_document(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let path = self.document_path(collection, id);
        match file::read_if_exists(&path)? {
            Some(bytes) => decode_document(&path, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn write_document(&self, collection: &str, doc: &Document) -> Result<()> {
        let bytes = doc.encode()?;
        file::write_atomic(
            &self.document_path(collection, doc.id()),
            &bytes,
            self.sync_writes,
        )
    }

    /// Open the index for `(collection, field)`, building it if it is new
    fn index_for<'a>(
        &self,
        indexes: &'a mut HashMap<IndexKey, SecondaryIndex>,
        collection: &str,
        field: &str,
    ) -> Result<&'a mut SecondaryIndex> {
        match indexes.entry(IndexKey::new(collection, field)) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let index = self.build_index(collection, field)?;
                info!(
                    "Created index {}.{} on {} with {} entries",
                    self.name,
                    collection,
                    field,
                    index.entry_count()
                );
                Ok(e.insert(index))
            }
        }
    }

    fn build_index(&self, collection: &str, field: &str) -> Result<SecondaryIndex> {
        let key = IndexKey::new(collection, field);
        let mut index = SecondaryIndex::open(self.index_path(&key), self.sync_writes)?;

        let pairs: Vec<(String, DocumentId)> = self
            .list_all(collection)?
            .into_iter()
            .filter_map(|doc| doc.field_text(field).map(|value| (value, doc.id())))
            .collect();
        index.rebuild(pairs)?;

        Ok(index)
    }

    /// Move `id` between values in every index of `collection`
    fn sync_indexes(
        &self,
        indexes: &mut HashMap<IndexKey, SecondaryIndex>,
        collection: &str,
        id: DocumentId,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> Result<()> {
        for (key, index) in indexes.iter_mut() {
            if key.collection != collection {
                continue;
            }
            let old_value = old.and_then(|d| d.field_text(&key.field));
            let new_value = new.and_then(|d| d.field_text(&key.field));
            if old_value == new_value {
                continue;
            }
            index.reindex(old_value.as_deref(), new_value.as_deref(), id)?;
        }
        Ok(())
    }

    fn load_indexes(index_dir: &Path, sync_writes: bool) -> Result<HashMap<IndexKey, SecondaryIndex>> {
        let mut indexes = HashMap::new();

        for entry in fs::read_dir(index_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(&format!(".{}", config::INDEX_EXTENSION)) {
                continue;
            }
            match IndexKey::parse(name) {
                Some(key) => {
                    let index = SecondaryIndex::open(&path, sync_writes)?;
                    indexes.insert(key, index);
                }
                None => warn!("Ignoring index file with unexpected name {:?}", path),
            }
        }

        Ok(indexes)
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.dir.join(collection)
    }

    fn document_path(&self, collection: &str, id: DocumentId) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.{}", id, config::DOCUMENT_EXTENSION))
    }

    fn index_path(&self, key: &IndexKey) -> PathBuf {
        self.dir.join(config::INDEX_DIR).join(key.file_name())
    }
}

/// Decode a document file, checking the embedded id against the file name
fn decode_document(path: &Path, bytes: &[u8]) -> Result<Document> {
    let doc = Document::decode(bytes)?;
    let stem_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| Uuid::parse_str(s).ok());

    if stem_id != Some(doc.id()) {
        return Err(ShelfError::Decode(format!(
            "file {:?} holds document {}",
            path.file_name().unwrap_or_default(),
            doc.id()
        )));
    }
    Ok(doc)
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub name: String,
    pub collections: usize,
    pub cached_documents: usize,
    pub indexes: usize,
    pub index_entries: usize,
}
