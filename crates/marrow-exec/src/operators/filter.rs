//! Filter: forwards the rows that satisfy a predicate.

use super::{BoxedOperator, Operator};
use crate::predicate::Predicate;
use crate::row::{Row, SchemaRef};
use marrow_common::Result;

/// Pulls rows from its child and emits those the predicate accepts.
pub struct FilterOperator {
    child: BoxedOperator,
    predicate: Predicate,
}

impl FilterOperator {
    /// Creates a filter over `child`.
    pub fn new(child: BoxedOperator, predicate: Predicate) -> Self {
        Self { child, predicate }
    }
}

impl Operator for FilterOperator {
    fn open(&mut self) -> Result<()> {
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.child.next()? {
            if self.predicate.test(&row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn schema(&self) -> Option<SchemaRef> {
        self.child.schema()
    }
}
