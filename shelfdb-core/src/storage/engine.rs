//! Storage engine - top-level coordinator

use super::{validate_name, Database, StorageConfig};
use crate::schema::{AcceptAll, Validator};
use crate::{Result, ShelfError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// ShelfDB storage engine
pub struct StorageEngine {
    config: StorageConfig,
    validator: Arc<dyn Validator>,
    databases: RwLock<HashMap<String, Arc<Database>>>,
}

impl StorageEngine {
    /// Create a storage engine that accepts every payload.
    ///
    /// A database that fails to open at startup, e.g. one with a corrupt
    /// index file, is logged and left out; opening it by name later through
    /// `create_database` or `get_or_create_database` returns the error.
    pub fn new(config: StorageConfig) -> Result<Self> {
        Self::with_validator(config, Arc::new(AcceptAll))
    }

    /// Create a storage engine whose databases validate payloads with `validator`
    pub fn with_validator(config: StorageConfig, validator: Arc<dyn Validator>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let engine = Self {
            config,
            validator,
            databases: RwLock::new(HashMap::new()),
        };

        // Load existing databases
        engine.load_databases()?;

        Ok(engine)
    }

    /// Get the engine configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Create a new database
    pub fn create_database(&self, name: &str) -> Result<Arc<Database>> {
        let mut databases = self.databases.write();

        if databases.contains_key(name) {
            return Err(ShelfError::Config(format!("Database {} already exists", name)));
        }

        let db = Arc::new(Database::open(name, &self.config, self.validator.clone())?);
        databases.insert(name.to_string(), db.clone());

        info!("Created database: {}", name);

        Ok(db)
    }

    /// Get or create a database
    pub fn get_or_create_database(&self, name: &str) -> Result<Arc<Database>> {
        {
            let databases = self.databases.read();
            if let Some(db) = databases.get(name) {
                return Ok(db.clone());
            }
        }

        match self.create_database(name) {
            Err(ShelfError::Config(_)) => self
                .get_database(name)
                .ok_or_else(|| ShelfError::Internal(format!("Database {} vanished", name))),
            other => other,
        }
    }

    /// Get a database by name
    pub fn get_database(&self, name: &str) -> Option<Arc<Database>> {
        self.databases.read().get(name).cloned()
    }

    /// Drop a database and delete its files
    pub fn drop_database(&self, name: &str) -> Result<()> {
        validate_name("database", name)?;
        let mut databases = self.databases.write();

        if databases.remove(name).is_none() {
            return Err(ShelfError::NotFound(format!("database {}", name)));
        }

        let db_path = self.config.data_dir.join(name);
        if db_path.exists() {
            std::fs::remove_dir_all(&db_path)?;
        }

        info!("Dropped database: {}", name);

        Ok(())
    }

    /// List all databases, sorted
    pub fn list_databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStats {
        let databases = self.databases.read();
        let mut db_stats: Vec<_> = databases.values().map(|db| db.stats()).collect();
        db_stats.sort_by(|a, b| a.name.cmp(&b.name));

        EngineStats {
            database_count: databases.len(),
            cached_documents: db_stats.iter().map(|s| s.cached_documents).sum(),
            index_entries: db_stats.iter().map(|s| s.index_entries).sum(),
            databases: db_stats,
        }
    }

    fn load_databases(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.config.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();

            // Skip hidden and foreign directories
            if validate_name("database", &name).is_err() {
                continue;
            }

            match Database::open(&name, &self.config, self.validator.clone()) {
                Ok(db) => {
                    self.databases.write().insert(name.clone(), Arc::new(db));
                    info!("Loaded database: {}", name);
                }
                Err(e) => {
                    warn!("Failed to load database {}: {}", name, e);
                }
            }
        }

        Ok(())
    }
}

/// Storage engine statistics
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub database_count: usize,
    pub cached_documents: usize,
    pub index_entries: usize,
    pub databases: Vec<super::DatabaseStats>,
}
