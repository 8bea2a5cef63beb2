//! Projection: reorders and narrows columns.

use super::{BoxedOperator, Operator};
use crate::row::{Row, SchemaRef};
use marrow_common::{MarrowError, Result};
use marrow_storage::Record;

/// Emits, for each child row, a new record holding the values at the
/// configured column positions, in that order.
///
/// The output schema is the child's schema indexed the same way, so names
/// keep resolving downstream. The child's RID is preserved.
pub struct ProjectionOperator {
    child: BoxedOperator,
    columns: Vec<usize>,
    schema: Option<SchemaRef>,
}

impl ProjectionOperator {
    /// Creates a projection onto the given child-column positions.
    pub fn new(child: BoxedOperator, columns: Vec<usize>) -> Self {
        Self {
            child,
            columns,
            schema: None,
        }
    }
}

impl Operator for ProjectionOperator {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;

        // Project the child's schema by the same positions, if it has one.
        if let Some(child_schema) = self.child.schema() {
            let mut projected = Vec::with_capacity(self.columns.len());
            for &idx in &self.columns {
                let Some(col) = child_schema.get(idx) else {
                    self.child.close();
                    return Err(MarrowError::ExecutionError(format!(
                        "projection column {} out of bounds for schema of {} columns",
                        idx,
                        child_schema.len()
                    )));
                };
                projected.push(col.clone());
            }
            self.schema = Some(SchemaRef::from(projected));
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.next()? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for &idx in &self.columns {
            let v = row.values().get(idx).cloned().ok_or_else(|| {
                MarrowError::ExecutionError(format!(
                    "projection column {} out of bounds for row of {} values",
                    idx,
                    row.values().len()
                ))
            })?;
            values.push(v);
        }

        Ok(Some(Row::new(
            Record::new(values),
            row.rid,
            self.schema.clone(),
        )))
    }

    fn close(&mut self) {
        self.child.close();
        self.schema = None;
    }

    fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone().or_else(|| self.child.schema())
    }
}
