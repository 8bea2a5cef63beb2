//! Hash-materialized inner equi-join.

use super::{BoxedOperator, Operator};
use crate::row::{Row, SchemaRef};
use marrow_common::{MarrowError, Result, Value};
use marrow_storage::Record;
use std::collections::HashMap;

/// Inner join on `left.left_column = right.right_column`.
///
/// `open` drains the right child into a hash table keyed by the join
/// value and closes it; `next` streams the left child, emitting one row
/// per match with the left and right values concatenated (left schema
/// followed by right schema).
///
/// Emitted rows carry the left input's RID. That RID addresses only the
/// left base table and must not drive deletes on join output.
pub struct JoinOperator {
    left: BoxedOperator,
    right: BoxedOperator,
    left_column: String,
    right_column: String,
    left_key: usize,
    schema: Option<SchemaRef>,
    build: HashMap<Value, Vec<Row>>,
    current_left: Option<Row>,
    matches: std::vec::IntoIter<Row>,
}

impl JoinOperator {
    /// Creates a join of `left` and `right` on the named columns.
    pub fn new(
        left: BoxedOperator,
        right: BoxedOperator,
        left_column: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left,
            right,
            left_column: left_column.into(),
            right_column: right_column.into(),
            left_key: 0,
            schema: None,
            build: HashMap::new(),
            current_left: None,
            matches: Vec::new().into_iter(),
        }
    }

    fn column_position(schema: &SchemaRef, name: &str) -> Result<usize> {
        schema
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| MarrowError::ColumnNotFound(name.to_string()))
    }
}

impl Operator for JoinOperator {
    fn open(&mut self) -> Result<()> {
        self.left.open()?;
        if let Err(e) = self.right.open() {
            self.left.close();
            return Err(e);
        }

        let result = (|| {
            let left_schema = self.left.schema().ok_or_else(|| {
                MarrowError::ExecutionError("join requires the left child to provide schema".into())
            })?;
            let right_schema = self.right.schema().ok_or_else(|| {
                MarrowError::ExecutionError(
                    "join requires the right child to provide schema".into(),
                )
            })?;

            self.left_key = Self::column_position(&left_schema, &self.left_column)?;
            let right_key = Self::column_position(&right_schema, &self.right_column)?;

            let mut joined = left_schema.to_vec();
            joined.extend(right_schema.iter().cloned());
            self.schema = Some(SchemaRef::from(joined));

            // Build phase: materialize the right side keyed by join value.
            while let Some(row) = self.right.next()? {
                let key = row
                    .values()
                    .get(right_key)
                    .cloned()
                    .ok_or_else(|| {
                        MarrowError::ExecutionError(format!(
                            "join column {} out of bounds on right row",
                            right_key
                        ))
                    })?;
                self.build.entry(key).or_default().push(row);
            }
            Ok(())
        })();

        if result.is_err() {
            self.left.close();
            self.right.close();
            return result;
        }

        // The right side is fully materialized; release it now.
        self.right.close();
        self.current_left = None;
        self.matches = Vec::new().into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(right_row) = self.matches.next() {
                let left_row = self
                    .current_left
                    .as_ref()
                    .expect("matches are only staged under a current left row");

                let mut values = left_row.values().to_vec();
                values.extend(right_row.values().iter().cloned());
                return Ok(Some(Row::new(
                    Record::new(values),
                    left_row.rid,
                    self.schema.clone(),
                )));
            }

            // Advance the left side and stage its matches, if any.
            let Some(left_row) = self.left.next()? else {
                return Ok(None);
            };
            let key = left_row.values().get(self.left_key).ok_or_else(|| {
                MarrowError::ExecutionError(format!(
                    "join column {} out of bounds on left row",
                    self.left_key
                ))
            })?;
            self.matches = self
                .build
                .get(key)
                .cloned()
                .unwrap_or_default()
                .into_iter();
            self.current_left = Some(left_row);
        }
    }

    fn close(&mut self) {
        self.left.close();
        self.build.clear();
        self.current_left = None;
        self.matches = Vec::new().into_iter();
    }

    fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone()
    }
}
