//! Index scan: equality or range access through a B+ tree index.

use super::Operator;
use crate::row::{Row, SchemaRef};
use marrow_common::Result;
use marrow_index::IndexManager;
use marrow_storage::{Rid, StorageManager};
use std::sync::Arc;

/// Access mode of an index scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// All rows whose key equals the value.
    Key(i32),
    /// All rows whose key falls in `[low, high]`, both ends inclusive.
    Range { low: i32, high: i32 },
}

/// Scans a table through one of its indexes.
///
/// `open` resolves the index to its table, captures the table schema, and
/// fetches the candidate RIDs from the tree; `next` reads one record per
/// RID through storage. RIDs arrive in ascending key order, with equal
/// keys in insertion order.
pub struct IndexScanOperator {
    index: Arc<IndexManager>,
    storage: Arc<StorageManager>,
    index_name: String,
    mode: ScanMode,
    table: Option<String>,
    schema: Option<SchemaRef>,
    rids: std::vec::IntoIter<Rid>,
}

impl IndexScanOperator {
    /// Creates an equality scan for `key`.
    pub fn eq(
        index: Arc<IndexManager>,
        storage: Arc<StorageManager>,
        index_name: impl Into<String>,
        key: i32,
    ) -> Self {
        Self::with_mode(index, storage, index_name.into(), ScanMode::Key(key))
    }

    /// Creates a range scan over `[low, high]`.
    ///
    /// An inverted range (`low > high`) is legal and yields no rows; the
    /// planner uses it to materialize contradictory bounds.
    pub fn range(
        index: Arc<IndexManager>,
        storage: Arc<StorageManager>,
        index_name: impl Into<String>,
        low: i32,
        high: i32,
    ) -> Self {
        Self::with_mode(index, storage, index_name.into(), ScanMode::Range { low, high })
    }

    fn with_mode(
        index: Arc<IndexManager>,
        storage: Arc<StorageManager>,
        index_name: String,
        mode: ScanMode,
    ) -> Self {
        Self {
            index,
            storage,
            index_name,
            mode,
            table: None,
            schema: None,
            rids: Vec::new().into_iter(),
        }
    }
}

impl Operator for IndexScanOperator {
    fn open(&mut self) -> Result<()> {
        let table = self.index.table_for_index(&self.index_name)?;
        let schema = self.storage.table_schema(&table)?;
        self.schema = Some(SchemaRef::from(schema.columns));

        let rids = match self.mode {
            ScanMode::Key(key) => self.index.search_rids(&self.index_name, key)?,
            ScanMode::Range { low, high } => {
                self.index.range_search_rids(&self.index_name, low, high)?
            }
        };
        self.rids = rids.into_iter();
        self.table = Some(table);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        match self.rids.next() {
            Some(rid) => {
                let record = self.storage.read(table, rid)?;
                Ok(Some(Row::new(record, Some(rid), self.schema.clone())))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.table = None;
        self.schema = None;
        self.rids = Vec::new().into_iter();
    }

    fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone()
    }
}
