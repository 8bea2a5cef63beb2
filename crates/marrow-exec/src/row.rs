//! Pipeline row: a record plus its identity and schema metadata.

use marrow_common::Value;
use marrow_storage::{ColumnSchema, Record, Rid};
use std::sync::Arc;

/// Shared column metadata describing a row's layout at some pipeline stage.
pub type SchemaRef = Arc<[ColumnSchema]>;

/// A row flowing between operators.
///
/// `Record` is the storage-level value tuple; `Row` adds the row's
/// identity (absent for computed rows such as mutation diagnostics) and
/// optional schema metadata so parents can resolve columns by name.
#[derive(Debug, Clone)]
pub struct Row {
    pub record: Record,
    pub rid: Option<Rid>,
    pub schema: Option<SchemaRef>,
}

impl Row {
    /// Creates a row.
    pub fn new(record: Record, rid: Option<Rid>, schema: Option<SchemaRef>) -> Self {
        Self {
            record,
            rid,
            schema,
        }
    }

    /// Creates a schemaless computed row with no storage identity.
    pub fn computed(record: Record) -> Self {
        Self {
            record,
            rid: None,
            schema: None,
        }
    }

    /// Returns the row's values in column order.
    pub fn values(&self) -> &[Value] {
        self.record.values()
    }

    /// Resolves a value by column name through the row's schema.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        let schema = self.schema.as_deref()?;
        let idx = schema.iter().position(|c| c.name == name)?;
        self.values().get(idx)
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row{}", self.record)?;
        if let Some(rid) = self.rid {
            write!(f, " rid={}", rid)?;
        }
        Ok(())
    }
}
