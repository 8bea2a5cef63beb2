//! The assembled engine: one value owning every component.

use crate::processor::{QueryProcessor, Rows};
use marrow_buffer::PageCache;
use marrow_common::{Result, StorageConfig};
use marrow_index::IndexManager;
use marrow_storage::{Catalog, ColumnSchema, Record, Rid, StorageManager, TableSchema};
use std::sync::Arc;

/// A single-node MarrowDB instance.
///
/// Wires the catalog, page cache, storage manager, index manager, and
/// query processor together over one [`StorageConfig`]; table files live
/// under the configured data directory as `<table>.tbl`.
pub struct Database {
    catalog: Arc<Catalog>,
    storage: Arc<StorageManager>,
    index: Arc<IndexManager>,
    processor: QueryProcessor,
}

impl Database {
    /// Opens (or creates) a database rooted at the config's data
    /// directory.
    pub fn open(config: StorageConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::new());
        let cache = Arc::new(PageCache::new(config.buffer_pages));
        let storage = Arc::new(StorageManager::new(config, catalog.clone(), cache)?);
        let index = IndexManager::new(catalog.clone(), storage.clone());
        let processor = QueryProcessor::new(catalog.clone(), storage.clone(), index.clone());

        Ok(Self {
            catalog,
            storage,
            index,
            processor,
        })
    }

    /// Creates a table whose backing file is `<data_dir>/<name>.tbl`.
    pub fn create_table(&self, name: &str, columns: Vec<ColumnSchema>) -> Result<()> {
        let path = self
            .storage
            .config()
            .data_dir
            .join(format!("{}.tbl", name));
        self.storage
            .create_table(TableSchema::new(name, columns, path))
    }

    /// Creates an INT index over `table.column`.
    pub fn create_index(&self, name: &str, table: &str, column: &str) -> Result<()> {
        self.index.create_index(name, table, column)
    }

    /// Inserts a record, returning its RID.
    pub fn insert(&self, table: &str, record: &Record) -> Result<Rid> {
        self.storage.insert(table, record)
    }

    /// Reads the record at `rid`.
    pub fn read(&self, table: &str, rid: Rid) -> Result<Record> {
        self.storage.read(table, rid)
    }

    /// Tombstones the record at `rid`; false when it was already absent.
    pub fn delete(&self, table: &str, rid: Rid) -> Result<bool> {
        self.storage.delete(table, rid)
    }

    /// Visits every live record in (page, slot) order.
    pub fn scan(&self, table: &str, visit: impl FnMut(Rid, Record)) -> Result<()> {
        self.storage.scan(table, visit)
    }

    /// Executes one SQL statement.
    pub fn execute(&self, sql: &str) -> Result<Rows> {
        self.processor.execute(sql)
    }

    /// The shared catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The storage manager.
    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    /// The index manager.
    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }
}
