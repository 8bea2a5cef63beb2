//! Storage manager coordinating page-aware heap I/O.
//!
//! Reads go through the page cache; writes go straight to the file
//! followed by a cache invalidation, so the file stays the source of
//! truth (the cache never writes back).

use crate::catalog::{Catalog, ColumnSchema, TableSchema};
use crate::heap::HeapPage;
use crate::record::{Record, Rid};
use log::debug;
use marrow_buffer::PageCache;
use marrow_common::page::{page_offset, MAX_RECORD_LEN, PAGE_SIZE};
use marrow_common::{DataType, MarrowError, Result, StorageConfig, Value};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Weak};

/// Receiver of storage mutation events, installed after construction.
///
/// The index layer implements this to keep its trees consistent with the
/// heap. `on_delete` receives the old record because the tombstoned slot
/// can no longer be read back for its key.
pub trait IndexEventHandler: Send + Sync {
    /// Called after a record has been durably inserted at `rid`.
    fn on_insert(&self, table: &str, rid: Rid, record: &Record) -> Result<()>;

    /// Called after a live record at `rid` has been tombstoned.
    fn on_delete(&self, table: &str, rid: Rid, old_record: &Record) -> Result<()>;
}

/// Owns table files and the heap-page I/O protocol.
pub struct StorageManager {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    cache: Arc<PageCache>,
    /// Index maintenance callback; a weak link so the index manager (which
    /// holds the storage manager) does not form a strong cycle.
    index_handler: RwLock<Option<Weak<dyn IndexEventHandler>>>,
}

impl StorageManager {
    /// Creates a storage manager. The data directory is created if absent.
    pub fn new(config: StorageConfig, catalog: Arc<Catalog>, cache: Arc<PageCache>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            config,
            catalog,
            cache,
            index_handler: RwLock::new(None),
        })
    }

    /// Returns the storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the shared catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Installs the index maintenance callback.
    ///
    /// Must happen before any insert that should be indexed; rows inserted
    /// earlier reach an index only through a bulk rebuild.
    pub fn attach_index_handler(&self, handler: Weak<dyn IndexEventHandler>) {
        *self.index_handler.write() = Some(handler);
    }

    /// Looks up a table schema by name.
    pub fn table_schema(&self, table: &str) -> Result<TableSchema> {
        self.catalog.table(table)
    }

    /// Registers a table and creates its empty backing file (including
    /// intermediate directories).
    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.catalog.register_table(schema.clone())?;

        if let Some(parent) = schema.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        File::create(&schema.file_path)?;
        debug!("created table '{}' at {}", schema.name, schema.file_path.display());
        Ok(())
    }

    /// Inserts a record, returning its assigned RID.
    ///
    /// The record is validated against the table schema, serialized,
    /// placed on the last page of the heap file (or a fresh page when it
    /// does not fit), written through to the file, and announced to the
    /// index layer.
    pub fn insert(&self, table: &str, record: &Record) -> Result<Rid> {
        let schema = self.catalog.table(table)?;
        validate_record(record, &schema.columns)?;

        let bytes = record.to_bytes(&schema.columns)?;
        if bytes.len() > MAX_RECORD_LEN {
            return Err(MarrowError::RecordTooLarge {
                len: bytes.len(),
                max: MAX_RECORD_LEN,
            });
        }

        let file_len = std::fs::metadata(&schema.file_path)?.len();
        let target = last_page_id(file_len);

        let buf = self.cache.get_page(&schema.file_path, target)?;
        let mut page = HeapPage::wrap(buf, target);

        if !page.can_fit(bytes.len()) {
            // Start a fresh page right after the current last one.
            let next = target + 1;
            debug!("table '{}': page {} full, allocating page {}", table, target, next);
            let buf = self.cache.get_page(&schema.file_path, next)?;
            page = HeapPage::wrap(buf, next);
        }

        let slot_id = page.insert(&bytes)?;
        self.write_page(&schema.file_path, &page)?;

        let rid = Rid::new(page.page_id(), slot_id);
        self.notify(|h| h.on_insert(table, rid, record))?;
        Ok(rid)
    }

    /// Reads the record at `rid`.
    ///
    /// Fails with a not-found error when the slot is out of range or
    /// tombstoned.
    pub fn read(&self, table: &str, rid: Rid) -> Result<Record> {
        let schema = self.catalog.table(table)?;
        let buf = self.cache.get_page(&schema.file_path, rid.page_id)?;
        let page = HeapPage::wrap(buf, rid.page_id);
        Record::from_bytes(page.read(rid.slot_id)?, &schema.columns)
    }

    /// Tombstones the record at `rid`.
    ///
    /// Returns true iff a live record was deleted; deleting an absent or
    /// already-tombstoned RID returns false and changes nothing.
    pub fn delete(&self, table: &str, rid: Rid) -> Result<bool> {
        let schema = self.catalog.table(table)?;
        let buf = self.cache.get_page(&schema.file_path, rid.page_id)?;
        let mut page = HeapPage::wrap(buf, rid.page_id);

        // The old record supplies the index key for removal.
        let old_record = match page.read(rid.slot_id) {
            Ok(bytes) => Record::from_bytes(bytes, &schema.columns)?,
            Err(MarrowError::SlotOutOfRange { .. }) | Err(MarrowError::RecordNotFound { .. }) => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };

        page.delete(rid.slot_id);
        self.write_page(&schema.file_path, &page)?;

        self.notify(|h| h.on_delete(table, rid, &old_record))?;
        Ok(true)
    }

    /// Visits every live record in (page, slot) order.
    ///
    /// Within a page this is insertion order; across pages, ascending
    /// page id.
    pub fn scan(&self, table: &str, mut visit: impl FnMut(Rid, Record)) -> Result<()> {
        let pages = self.page_count(table)?;
        for page_id in 0..pages {
            for (rid, record) in self.page_rows(table, page_id)? {
                visit(rid, record);
            }
        }
        Ok(())
    }

    /// Returns the number of pages in a table's heap file, counting a
    /// trailing partial page.
    pub fn page_count(&self, table: &str) -> Result<u32> {
        let schema = self.catalog.table(table)?;
        let file_len = std::fs::metadata(&schema.file_path)?.len();
        Ok(file_len.div_ceil(PAGE_SIZE as u64) as u32)
    }

    /// Returns the live rows of one page in ascending slot order.
    ///
    /// This is the unit of I/O for sequential scans: callers page through
    /// the file one call at a time instead of materializing the table.
    pub fn page_rows(&self, table: &str, page_id: u32) -> Result<Vec<(Rid, Record)>> {
        let schema = self.catalog.table(table)?;
        let buf = self.cache.get_page(&schema.file_path, page_id)?;
        let page = HeapPage::wrap(buf, page_id);

        let mut rows = Vec::new();
        for (slot_id, bytes) in page.live_slots() {
            let record = Record::from_bytes(bytes, &schema.columns)?;
            rows.push((Rid::new(page_id, slot_id), record));
        }
        Ok(rows)
    }

    /// Writes a full page to its file at the page-aligned offset, then
    /// invalidates the cache entry so readers observe the file.
    fn write_page(&self, path: &Path, page: &HeapPage) -> Result<()> {
        let mut f = OpenOptions::new().write(true).open(path)?;
        f.seek(SeekFrom::Start(page_offset(page.page_id())))?;
        f.write_all(page.as_bytes())?;
        if self.config.fsync_enabled {
            f.sync_all()?;
        }

        self.cache.invalidate(path, page.page_id());
        Ok(())
    }

    /// Runs `f` against the index handler if one is installed and alive.
    fn notify(&self, f: impl FnOnce(&dyn IndexEventHandler) -> Result<()>) -> Result<()> {
        let handler = self.index_handler.read().as_ref().and_then(Weak::upgrade);
        match handler {
            Some(h) => f(h.as_ref()),
            None => Ok(()),
        }
    }
}

/// Page id of the last aligned page for a file of `file_len` bytes.
///
/// An empty file starts at page 0; a page-multiple length addresses its
/// final full page; a partial trailing page is addressed directly (it is
/// rewritten to a full page on the next write).
fn last_page_id(file_len: u64) -> u32 {
    let page = PAGE_SIZE as u64;
    if file_len == 0 {
        0
    } else if file_len % page == 0 {
        (file_len / page - 1) as u32
    } else {
        (file_len / page) as u32
    }
}

/// Validates a record against its table's column schemas: arity, per-value
/// type tags, and VARCHAR byte-length caps.
fn validate_record(record: &Record, columns: &[ColumnSchema]) -> Result<()> {
    if record.values().len() != columns.len() {
        return Err(MarrowError::ArityMismatch {
            expected: columns.len(),
            got: record.values().len(),
        });
    }

    for (col, val) in columns.iter().zip(record.values()) {
        if val.data_type() != col.data_type {
            return Err(MarrowError::TypeMismatch {
                column: col.name.clone(),
                expected: col.data_type.to_string(),
                actual: val.data_type().to_string(),
            });
        }
        if let (DataType::Varchar, Value::Varchar(s)) = (col.data_type, val) {
            if col.length > 0 && s.len() > col.length as usize {
                return Err(MarrowError::VarcharTooLong {
                    column: col.name.clone(),
                    len: s.len(),
                    max: col.length as usize,
                });
            }
        }
    }
    Ok(())
}
