//! In-memory catalog of table and index schemas.

use marrow_common::{DataType, MarrowError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Schema of a single table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name, unique within its table.
    pub name: String,
    /// Data type tag.
    pub data_type: DataType,
    /// Byte-length cap for VARCHAR columns (0 for fixed-size types).
    /// When greater than zero, a VARCHAR value's UTF-8 byte length must
    /// not exceed it.
    pub length: u32,
}

impl ColumnSchema {
    /// Creates a new column schema.
    pub fn new(name: impl Into<String>, data_type: DataType, length: u32) -> Self {
        Self {
            name: name.into(),
            data_type,
            length,
        }
    }
}

/// Schema of a table: name, ordered columns, and backing file path.
///
/// Immutable after registration in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub file_path: PathBuf,
}

impl TableSchema {
    /// Creates a new table schema.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            file_path: file_path.into(),
        }
    }

    /// Finds the position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Schema of a secondary index.
///
/// The file path is a marker only; the tree itself is memory-resident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub table: String,
    pub column: String,
    pub file_path: PathBuf,
}

impl IndexSchema {
    /// Creates a new index schema.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            column: column.into(),
            file_path: file_path.into(),
        }
    }
}

/// Name-keyed registry of table and index schemas.
///
/// The registry is shared by the storage, index, and execution layers, so
/// it uses interior locking and hands out cloned schemas.
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<String, TableSchema>,
    indexes: HashMap<String, IndexSchema>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    /// Registers a table schema. Fails if the name is already taken.
    pub fn register_table(&self, schema: TableSchema) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.tables.contains_key(&schema.name) {
            return Err(MarrowError::TableAlreadyExists(schema.name));
        }
        inner.tables.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Looks up a table schema by name.
    pub fn table(&self, name: &str) -> Result<TableSchema> {
        self.inner
            .read()
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| MarrowError::TableNotFound(name.to_string()))
    }

    /// Returns true if a table with the given name is registered.
    pub fn has_table(&self, name: &str) -> bool {
        self.inner.read().tables.contains_key(name)
    }

    /// Registers an index schema. Fails if the name is already taken.
    pub fn register_index(&self, schema: IndexSchema) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.indexes.contains_key(&schema.name) {
            return Err(MarrowError::IndexAlreadyExists(schema.name));
        }
        inner.indexes.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Looks up an index schema by name.
    pub fn index(&self, name: &str) -> Result<IndexSchema> {
        self.inner
            .read()
            .indexes
            .get(name)
            .cloned()
            .ok_or_else(|| MarrowError::IndexNotFound(name.to_string()))
    }

    /// Returns all registered index schemas.
    pub fn index_schemas(&self) -> Vec<IndexSchema> {
        self.inner.read().indexes.values().cloned().collect()
    }

    /// Finds the index covering `(table, column)`, if one exists.
    pub fn index_for_column(&self, table: &str, column: &str) -> Option<IndexSchema> {
        self.inner
            .read()
            .indexes
            .values()
            .find(|i| i.table == table && i.column == column)
            .cloned()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
