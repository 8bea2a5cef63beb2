//! Configuration structures for MarrowDB.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for the database engine.
///
/// The page size is a compile-time constant ([`crate::page::PAGE_SIZE`]);
/// everything else that varies between deployments lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for table files and index markers.
    pub data_dir: PathBuf,
    /// Buffer cache capacity in number of pages.
    pub buffer_pages: usize,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            buffer_pages: 256, // 1 MB with 4 KB pages
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the total buffer cache size in bytes.
    pub fn buffer_size_bytes(&self) -> usize {
        self.buffer_pages * crate::page::PAGE_SIZE
    }

    /// Returns the directory index marker files are created in.
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("indexes")
    }
}
