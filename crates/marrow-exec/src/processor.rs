//! Unified query entry point.
//!
//! `execute` parses one SQL statement and dispatches on its kind: SELECT
//! streams rows lazily through the planner's operator tree; INSERT and
//! DELETE apply the mutation eagerly and yield a one-row diagnostic.

use crate::executor::RowIter;
use crate::parser;
use crate::planner::Planner;
use crate::query::{DeleteQuery, InsertQuery, Statement};
use crate::row::{Row, SchemaRef};
use marrow_common::{MarrowError, Result, Value};
use marrow_index::IndexManager;
use marrow_storage::{Catalog, Record, StorageManager};
use std::sync::Arc;

/// Rows produced by one statement: a lazy SELECT stream or a single
/// mutation diagnostic.
pub enum Rows {
    Stream(RowIter),
    Single(std::option::IntoIter<Row>),
}

impl Iterator for Rows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Rows::Stream(iter) => iter.next(),
            Rows::Single(iter) => iter.next().map(Ok),
        }
    }
}

/// Parses, plans, and executes SQL statements.
pub struct QueryProcessor {
    catalog: Arc<Catalog>,
    storage: Arc<StorageManager>,
    planner: Planner,
}

impl QueryProcessor {
    /// Creates a processor over the engine's shared components.
    pub fn new(
        catalog: Arc<Catalog>,
        storage: Arc<StorageManager>,
        index: Arc<IndexManager>,
    ) -> Self {
        let planner = Planner::new(catalog.clone(), storage.clone(), index);
        Self {
            catalog,
            storage,
            planner,
        }
    }

    /// Executes one SQL statement, yielding its rows.
    ///
    /// SELECT returns a lazy iterator (the operator tree opens on the
    /// first pull and closes exactly once). INSERT yields the single row
    /// `("INSERT", page_id, slot_id)`; DELETE yields `("DELETE", count)`.
    pub fn execute(&self, sql: &str) -> Result<Rows> {
        match parser::parse(sql)? {
            Statement::Select(query) => {
                let plan = self.planner.plan(&query)?;
                Ok(Rows::Stream(RowIter::new(plan)))
            }
            Statement::Insert(query) => self.execute_insert(query),
            Statement::Delete(query) => self.execute_delete(query),
        }
    }

    /// Maps the statement's column list onto schema positions, inserts,
    /// and reports the assigned RID.
    ///
    /// Every table column must be supplied exactly once; unknown column
    /// names are rejected.
    fn execute_insert(&self, query: InsertQuery) -> Result<Rows> {
        let schema = self.catalog.table(&query.table)?;

        for name in &query.columns {
            if schema.column_index(name).is_none() {
                return Err(MarrowError::ColumnNotFound(name.clone()));
            }
        }
        if query.columns.len() != schema.columns.len() {
            return Err(MarrowError::ArityMismatch {
                expected: schema.columns.len(),
                got: query.columns.len(),
            });
        }

        let mut values = Vec::with_capacity(schema.columns.len());
        for col in &schema.columns {
            let pos = query
                .columns
                .iter()
                .position(|name| name == &col.name)
                .ok_or_else(|| MarrowError::MissingColumn(col.name.clone()))?;
            values.push(query.values[pos].clone());
        }

        let rid = self.storage.insert(&query.table, &Record::new(values))?;
        Ok(diagnostic(vec![
            Value::Varchar("INSERT".to_string()),
            Value::Int(rid.page_id as i32),
            Value::Int(rid.slot_id as i32),
        ]))
    }

    /// Scans the table, deletes the rows matching the optional WHERE, and
    /// reports how many were tombstoned.
    fn execute_delete(&self, query: DeleteQuery) -> Result<Rows> {
        let schema = self.catalog.table(&query.table)?;
        let predicate = query
            .where_clause
            .as_ref()
            .map(|w| Planner::compile_where(w, &schema.columns))
            .transpose()?;
        let schema_ref = SchemaRef::from(schema.columns);

        let mut candidates = Vec::new();
        self.storage
            .scan(&query.table, |rid, record| candidates.push((rid, record)))?;

        let mut count = 0i32;
        for (rid, record) in candidates {
            let matched = match &predicate {
                Some(p) => {
                    let row = Row::new(record, Some(rid), Some(schema_ref.clone()));
                    p.test(&row)?
                }
                None => true,
            };
            if matched && self.storage.delete(&query.table, rid)? {
                count += 1;
            }
        }

        Ok(diagnostic(vec![
            Value::Varchar("DELETE".to_string()),
            Value::Int(count),
        ]))
    }
}

fn diagnostic(values: Vec<Value>) -> Rows {
    Rows::Single(Some(Row::computed(Record::new(values))).into_iter())
}
