//! Physical planning: maps a logical SELECT onto an operator tree.
//!
//! Plan selection, in order:
//! 1. Join queries: sequential scans on both sides composed through the
//!    hash join, with any WHERE filtered over the combined schema.
//! 2. Range-index plan: an AND-only chain of non-negated integer
//!    comparisons on one indexed INT column collapses into a single
//!    index range scan.
//! 3. Equality-index plan: a single non-negated `col = int` on an indexed
//!    INT column becomes an index equality scan, no post-filter.
//! 4. Fallback: sequential scan plus a compiled filter.
//!
//! A non-empty projection list wraps whichever tree was chosen.

use crate::operators::{
    BoxedOperator, FilterOperator, IndexScanOperator, JoinOperator, ProjectionOperator,
    SeqScanOperator,
};
use crate::predicate::{CompareOp, Predicate};
use crate::query::{Condition, Connector, SelectQuery, WhereClause};
use log::debug;
use marrow_common::{DataType, MarrowError, Result, Value};
use marrow_index::IndexManager;
use marrow_storage::{Catalog, ColumnSchema, StorageManager};
use std::sync::Arc;

/// Chosen index range with its covering index.
struct RangePlan {
    index_name: String,
    low: i32,
    high: i32,
}

/// Builds physical operator trees for logical SELECT queries.
pub struct Planner {
    catalog: Arc<Catalog>,
    storage: Arc<StorageManager>,
    index: Arc<IndexManager>,
}

impl Planner {
    /// Creates a planner over the engine's shared components.
    pub fn new(
        catalog: Arc<Catalog>,
        storage: Arc<StorageManager>,
        index: Arc<IndexManager>,
    ) -> Self {
        Self {
            catalog,
            storage,
            index,
        }
    }

    /// Plans a SELECT into an operator tree, ready to open.
    pub fn plan(&self, query: &SelectQuery) -> Result<BoxedOperator> {
        let (mut root, final_schema) = if let Some(join) = &query.join {
            let left_schema = self.catalog.table(&query.table)?.columns;
            let right_schema = self.catalog.table(&join.right_table)?.columns;

            let left = Box::new(SeqScanOperator::new(self.storage.clone(), &query.table));
            let right = Box::new(SeqScanOperator::new(
                self.storage.clone(),
                &join.right_table,
            ));
            let mut root: BoxedOperator = Box::new(JoinOperator::new(
                left,
                right,
                &join.left_column,
                &join.right_column,
            ));

            let mut combined = left_schema;
            combined.extend(right_schema);

            if let Some(where_clause) = &query.where_clause {
                let predicate = Self::compile_where(where_clause, &combined)?;
                root = Box::new(FilterOperator::new(root, predicate));
            }
            (root, combined)
        } else {
            let schema = self.catalog.table(&query.table)?.columns;

            let root: BoxedOperator = if let Some(range) = self.try_range_plan(query, &schema) {
                debug!(
                    "range plan via '{}': [{}, {}]",
                    range.index_name, range.low, range.high
                );
                Box::new(IndexScanOperator::range(
                    self.index.clone(),
                    self.storage.clone(),
                    range.index_name,
                    range.low,
                    range.high,
                ))
            } else if let Some((index_name, key)) = self.try_equality_plan(query, &schema) {
                debug!("equality plan via '{}': key {}", index_name, key);
                Box::new(IndexScanOperator::eq(
                    self.index.clone(),
                    self.storage.clone(),
                    index_name,
                    key,
                ))
            } else {
                let scan: BoxedOperator =
                    Box::new(SeqScanOperator::new(self.storage.clone(), &query.table));
                match &query.where_clause {
                    Some(where_clause) => {
                        let predicate = Self::compile_where(where_clause, &schema)?;
                        Box::new(FilterOperator::new(scan, predicate))
                    }
                    None => scan,
                }
            };
            (root, schema)
        };

        if !query.columns.is_empty() {
            let mut indexes = Vec::with_capacity(query.columns.len());
            for name in &query.columns {
                let idx = final_schema
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| MarrowError::ColumnNotFound(name.clone()))?;
                indexes.push(idx);
            }
            root = Box::new(ProjectionOperator::new(root, indexes));
        }

        Ok(root)
    }

    /// Recognizes a single-condition `col = int` over an indexed INT
    /// column.
    fn try_equality_plan(
        &self,
        query: &SelectQuery,
        schema: &[ColumnSchema],
    ) -> Option<(String, i32)> {
        let where_clause = query.where_clause.as_ref()?;
        if !where_clause.is_single() {
            return None;
        }
        let cond = &where_clause.conditions()[0];
        if cond.negated || cond.op != CompareOp::Eq {
            return None;
        }
        let key = cond.literal.as_int()?;
        let col = schema.iter().find(|c| c.name == cond.column)?;
        if col.data_type != DataType::Int {
            return None;
        }
        let index = self.catalog.index_for_column(&query.table, &cond.column)?;
        Some((index.name, key))
    }

    /// Recognizes an AND-only chain of integer comparisons on one indexed
    /// INT column and intersects the bounds.
    ///
    /// A contradictory intersection (`low > high`) still produces a plan,
    /// materialized as the intentionally empty range `(1, 0)`. A chain
    /// whose bounds pin a single value is left for the equality plan.
    fn try_range_plan(&self, query: &SelectQuery, schema: &[ColumnSchema]) -> Option<RangePlan> {
        let where_clause = query.where_clause.as_ref()?;
        if where_clause.conditions().len() < 2 {
            return None;
        }
        if where_clause
            .connectors()
            .iter()
            .any(|c| *c != Connector::And)
        {
            return None;
        }

        // Bounds aggregate in i64 so `> i32::MAX` style conditions cannot
        // wrap; the final clamp back to i32 decides emptiness.
        let mut column: Option<&str> = None;
        let mut low: Option<i64> = None;
        let mut high: Option<i64> = None;

        for cond in where_clause.conditions() {
            if cond.negated {
                return None;
            }
            let val = cond.literal.as_int()? as i64;
            let col = schema.iter().find(|c| c.name == cond.column)?;
            if col.data_type != DataType::Int {
                return None;
            }
            match column {
                None => column = Some(&cond.column),
                Some(name) if name == cond.column => {}
                Some(_) => return None,
            }

            match cond.op {
                CompareOp::Gt => low = Some(low.map_or(val + 1, |l| l.max(val + 1))),
                CompareOp::Gte => low = Some(low.map_or(val, |l| l.max(val))),
                CompareOp::Lt => high = Some(high.map_or(val - 1, |h| h.min(val - 1))),
                CompareOp::Lte => high = Some(high.map_or(val, |h| h.min(val))),
                CompareOp::Eq => {
                    low = Some(low.map_or(val, |l| l.max(val)));
                    high = Some(high.map_or(val, |h| h.min(val)));
                }
            }
        }

        let column = column?;
        let index = self.catalog.index_for_column(&query.table, column)?;

        if low.is_none() && high.is_none() {
            return None;
        }
        if let (Some(l), Some(h)) = (low, high) {
            if l == h {
                return None; // single-key range; equality plan covers it
            }
        }

        let low = low.unwrap_or(i32::MIN as i64);
        let high = high.unwrap_or(i32::MAX as i64);
        if low > high || low > i32::MAX as i64 || high < i32::MIN as i64 {
            return Some(RangePlan {
                index_name: index.name,
                low: 1,
                high: 0,
            });
        }
        Some(RangePlan {
            index_name: index.name,
            low: low.max(i32::MIN as i64) as i32,
            high: high.min(i32::MAX as i64) as i32,
        })
    }

    /// Compiles a WHERE clause into a predicate over `schema`.
    ///
    /// AND binds tighter than OR: contiguous AND runs fold into
    /// conjunction groups, and the groups are OR-ed together.
    pub fn compile_where(
        where_clause: &WhereClause,
        schema: &[ColumnSchema],
    ) -> Result<Predicate> {
        let conditions = where_clause.conditions();
        let mut or_groups: Vec<Predicate> = Vec::new();
        let mut current: Vec<Predicate> = vec![Self::compile_condition(&conditions[0], schema)?];

        for (connector, cond) in where_clause.connectors().iter().zip(&conditions[1..]) {
            let predicate = Self::compile_condition(cond, schema)?;
            match connector {
                Connector::And => current.push(predicate),
                Connector::Or => {
                    or_groups.push(Self::fold_and(std::mem::take(&mut current)));
                    current.push(predicate);
                }
            }
        }
        or_groups.push(Self::fold_and(current));

        Ok(if or_groups.len() == 1 {
            or_groups.pop().expect("one OR group exists")
        } else {
            Predicate::Or(or_groups)
        })
    }

    fn fold_and(mut group: Vec<Predicate>) -> Predicate {
        if group.len() == 1 {
            group.pop().expect("group is non-empty")
        } else {
            Predicate::And(group)
        }
    }

    /// Compiles one condition: INT columns get an order comparison, other
    /// types admit equality only. `negated` wraps the result in NOT.
    fn compile_condition(cond: &Condition, schema: &[ColumnSchema]) -> Result<Predicate> {
        let (idx, col) = schema
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == cond.column)
            .ok_or_else(|| MarrowError::ColumnNotFound(cond.column.clone()))?;

        let base = match col.data_type {
            DataType::Int => {
                let Value::Int(value) = cond.literal else {
                    return Err(MarrowError::TypeMismatch {
                        column: cond.column.clone(),
                        expected: DataType::Int.to_string(),
                        actual: cond.literal.data_type().to_string(),
                    });
                };
                Predicate::Compare {
                    column: idx,
                    op: cond.op,
                    value,
                }
            }
            DataType::Boolean | DataType::Varchar => {
                if cond.op != CompareOp::Eq {
                    return Err(MarrowError::PlanError(format!(
                        "only equality is supported for {} column '{}'",
                        col.data_type, cond.column
                    )));
                }
                if cond.literal.data_type() != col.data_type {
                    return Err(MarrowError::TypeMismatch {
                        column: cond.column.clone(),
                        expected: col.data_type.to_string(),
                        actual: cond.literal.data_type().to_string(),
                    });
                }
                Predicate::Equals {
                    column: idx,
                    expected: cond.literal.clone(),
                }
            }
        };

        Ok(if cond.negated {
            Predicate::not(base)
        } else {
            base
        })
    }
}
