//! Index lifecycle and maintenance.
//!
//! The manager owns one in-memory B+ tree per index. New indexes are bulk
//! built from a full table scan; afterwards the storage manager keeps them
//! current through the [`IndexEventHandler`] callback it invokes on every
//! insert and delete.

use crate::btree::BPlusTree;
use log::debug;
use marrow_common::{MarrowError, Result};
use marrow_storage::{
    Catalog, IndexEventHandler, IndexSchema, Record, Rid, StorageManager,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

/// Default B+ tree order for manager-built indexes.
const DEFAULT_ORDER: usize = 4;

/// Runtime state of one index.
struct IndexState {
    table: String,
    column: String,
    column_index: usize,
    tree: BPlusTree,
}

/// Per-column INT index lifecycle and lookups.
pub struct IndexManager {
    catalog: Arc<Catalog>,
    storage: Arc<StorageManager>,
    states: RwLock<HashMap<String, IndexState>>,
}

impl IndexManager {
    /// Creates the index manager and installs it as the storage manager's
    /// index callback.
    ///
    /// Storage holds the manager weakly, so dropping the returned `Arc`
    /// (and any clones) detaches index maintenance cleanly.
    pub fn new(catalog: Arc<Catalog>, storage: Arc<StorageManager>) -> Arc<Self> {
        let manager = Arc::new(Self {
            catalog,
            storage: storage.clone(),
            states: RwLock::new(HashMap::new()),
        });
        let trait_arc: Arc<dyn IndexEventHandler> = manager.clone();
        let weak: std::sync::Weak<dyn IndexEventHandler> = Arc::downgrade(&trait_arc);
        storage.attach_index_handler(weak);
        manager
    }

    /// Creates an index over `table.column`, bulk-building the tree from a
    /// full scan.
    ///
    /// Only INT columns are indexable. The index's backing file is an
    /// empty marker; the tree itself lives in memory.
    pub fn create_index(&self, name: &str, table: &str, column: &str) -> Result<()> {
        if self.states.read().contains_key(name) {
            return Err(MarrowError::IndexAlreadyExists(name.to_string()));
        }

        let schema = self.catalog.table(table)?;
        let column_index = schema
            .column_index(column)
            .ok_or_else(|| MarrowError::ColumnNotFound(column.to_string()))?;
        let col = &schema.columns[column_index];
        if !col.data_type.is_int() {
            return Err(MarrowError::IndexTypeUnsupported {
                column: column.to_string(),
                actual: col.data_type.to_string(),
            });
        }

        let mut entries: Vec<(i32, Rid)> = Vec::new();
        let mut bad_value = None;
        self.storage.scan(table, |rid, record| {
            match record.values()[column_index].as_int() {
                Some(key) => entries.push((key, rid)),
                None => bad_value = Some(rid),
            }
        })?;
        if let Some(rid) = bad_value {
            return Err(MarrowError::Invariant(format!(
                "indexed column '{}' holds a non-INT value at {}",
                column, rid
            )));
        }

        let mut tree = BPlusTree::new(DEFAULT_ORDER);
        let built = entries.len();
        for (key, rid) in entries {
            tree.insert(key, rid);
        }

        let marker = self.storage.config().index_dir().join(format!("{}.idx", name));
        self.catalog
            .register_index(IndexSchema::new(name, table, column, &marker))?;
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)?;
        }
        File::create(&marker)?;

        self.states.write().insert(
            name.to_string(),
            IndexState {
                table: table.to_string(),
                column: column.to_string(),
                column_index,
                tree,
            },
        );
        debug!("created index '{}' on {}.{} ({} entries)", name, table, column, built);
        Ok(())
    }

    /// Returns the name of the table an index covers.
    pub fn table_for_index(&self, name: &str) -> Result<String> {
        self.states
            .read()
            .get(name)
            .map(|s| s.table.clone())
            .ok_or_else(|| MarrowError::IndexNotFound(name.to_string()))
    }

    /// Point search returning the matching RIDs in insertion order.
    pub fn search_rids(&self, name: &str, key: i32) -> Result<Vec<Rid>> {
        let states = self.states.read();
        let state = states
            .get(name)
            .ok_or_else(|| MarrowError::IndexNotFound(name.to_string()))?;
        Ok(state.tree.search(key))
    }

    /// Range search returning RIDs in ascending key order.
    pub fn range_search_rids(&self, name: &str, low: i32, high: i32) -> Result<Vec<Rid>> {
        let states = self.states.read();
        let state = states
            .get(name)
            .ok_or_else(|| MarrowError::IndexNotFound(name.to_string()))?;
        Ok(state.tree.range_search(low, high))
    }

    /// Point lookup, fetching each matching record from storage.
    pub fn lookup(&self, name: &str, key: i32) -> Result<Vec<Record>> {
        let table = self.table_for_index(name)?;
        self.search_rids(name, key)?
            .into_iter()
            .map(|rid| self.storage.read(&table, rid))
            .collect()
    }

    /// Range lookup over `[low, high]`, fetching each record from storage.
    pub fn range_lookup(&self, name: &str, low: i32, high: i32) -> Result<Vec<Record>> {
        if low > high {
            return Ok(Vec::new());
        }
        let table = self.table_for_index(name)?;
        self.range_search_rids(name, low, high)?
            .into_iter()
            .map(|rid| self.storage.read(&table, rid))
            .collect()
    }

    /// Extracts the integer key of `record` for one index state.
    fn key_of(state: &IndexState, record: &Record) -> Result<i32> {
        record
            .values()
            .get(state.column_index)
            .and_then(|v| v.as_int())
            .ok_or_else(|| {
                MarrowError::Invariant(format!(
                    "indexed column '{}' expected an INT value",
                    state.column
                ))
            })
    }
}

impl IndexEventHandler for IndexManager {
    fn on_insert(&self, table: &str, rid: Rid, record: &Record) -> Result<()> {
        let mut states = self.states.write();
        for state in states.values_mut().filter(|s| s.table == table) {
            let key = Self::key_of(state, record)?;
            state.tree.insert(key, rid);
        }
        Ok(())
    }

    fn on_delete(&self, table: &str, rid: Rid, old_record: &Record) -> Result<()> {
        let mut states = self.states.write();
        for state in states.values_mut().filter(|s| s.table == table) {
            let key = Self::key_of(state, old_record)?;
            state.tree.delete(key, rid);
        }
        Ok(())
    }
}
