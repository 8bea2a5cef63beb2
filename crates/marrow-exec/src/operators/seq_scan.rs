//! Sequential heap scan with lazy page loading.

use super::Operator;
use crate::row::{Row, SchemaRef};
use marrow_common::Result;
use marrow_storage::{Record, Rid, StorageManager};
use std::sync::Arc;

/// Full table scan in (page, slot) order.
///
/// Rows are buffered one page at a time: the first `next` after a page is
/// exhausted pulls the following page through the storage manager (and so
/// through the page cache), keeping memory proportional to a single page
/// rather than the table.
pub struct SeqScanOperator {
    storage: Arc<StorageManager>,
    table: String,
    schema: Option<SchemaRef>,
    page_count: u32,
    next_page: u32,
    buffer: std::vec::IntoIter<(Rid, Record)>,
}

impl SeqScanOperator {
    /// Creates a scan over `table`.
    pub fn new(storage: Arc<StorageManager>, table: impl Into<String>) -> Self {
        Self {
            storage,
            table: table.into(),
            schema: None,
            page_count: 0,
            next_page: 0,
            buffer: Vec::new().into_iter(),
        }
    }
}

impl Operator for SeqScanOperator {
    fn open(&mut self) -> Result<()> {
        let schema = self.storage.table_schema(&self.table)?;
        self.schema = Some(SchemaRef::from(schema.columns));
        self.page_count = self.storage.page_count(&self.table)?;
        self.next_page = 0;
        self.buffer = Vec::new().into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some((rid, record)) = self.buffer.next() {
                return Ok(Some(Row::new(record, Some(rid), self.schema.clone())));
            }
            if self.next_page >= self.page_count {
                return Ok(None);
            }
            let rows = self.storage.page_rows(&self.table, self.next_page)?;
            self.next_page += 1;
            self.buffer = rows.into_iter();
        }
    }

    fn close(&mut self) {
        self.schema = None;
        self.buffer = Vec::new().into_iter();
        self.next_page = self.page_count;
    }

    fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_buffer::PageCache;
    use marrow_common::{DataType, MarrowError, StorageConfig, Value};
    use marrow_storage::{Catalog, ColumnSchema, TableSchema};
    use tempfile::tempdir;

    fn storage(dir: &std::path::Path) -> Arc<StorageManager> {
        let config = StorageConfig {
            data_dir: dir.to_path_buf(),
            buffer_pages: 4,
            fsync_enabled: false,
        };
        Arc::new(
            StorageManager::new(config, Arc::new(Catalog::new()), Arc::new(PageCache::new(4)))
                .unwrap(),
        )
    }

    fn create_nums(storage: &StorageManager, dir: &std::path::Path, count: i32) {
        storage
            .create_table(TableSchema::new(
                "nums",
                vec![
                    ColumnSchema::new("n", DataType::Int, 0),
                    ColumnSchema::new("pad", DataType::Varchar, 100),
                ],
                dir.join("nums.tbl"),
            ))
            .unwrap();
        for i in 0..count {
            storage
                .insert(
                    "nums",
                    &Record::new(vec![Value::Int(i), Value::Varchar("p".repeat(60))]),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_scan_yields_all_rows_in_order() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        create_nums(&storage, dir.path(), 150);
        assert!(storage.page_count("nums").unwrap() > 1);

        let mut op = SeqScanOperator::new(storage, "nums");
        op.open().unwrap();
        assert!(op.schema().is_some());

        let mut seen = 0;
        while let Some(row) = op.next().unwrap() {
            assert_eq!(row.values()[0], Value::Int(seen));
            assert!(row.rid.is_some());
            assert_eq!(row.schema.as_deref().map(|s| s.len()), Some(2));
            seen += 1;
        }
        assert_eq!(seen, 150);

        // Exhaustion is stable.
        assert!(op.next().unwrap().is_none());
        op.close();
    }

    #[test]
    fn test_scan_empty_table() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        create_nums(&storage, dir.path(), 0);

        let mut op = SeqScanOperator::new(storage, "nums");
        op.open().unwrap();
        assert!(op.next().unwrap().is_none());
        op.close();
    }

    #[test]
    fn test_scan_unknown_table_fails_at_open() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());

        let mut op = SeqScanOperator::new(storage, "ghost");
        assert!(matches!(op.open(), Err(MarrowError::TableNotFound(_))));
    }

    #[test]
    fn test_scan_skips_tombstones() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        create_nums(&storage, dir.path(), 10);
        storage.delete("nums", Rid::new(0, 4)).unwrap();

        let mut op = SeqScanOperator::new(storage, "nums");
        op.open().unwrap();
        let mut ids = Vec::new();
        while let Some(row) = op.next().unwrap() {
            ids.push(row.values()[0].as_int().unwrap());
        }
        assert_eq!(ids, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
        op.close();
    }
}
