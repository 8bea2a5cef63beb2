//! Typed predicates with Boolean composition.
//!
//! Predicates are a sum type rather than a trait hierarchy: evaluation is
//! one match with short-circuit on AND/OR. Column references are resolved
//! to positions at construction time, against the schema the predicate
//! will be evaluated under.

use crate::row::Row;
use marrow_common::{DataType, MarrowError, Result, Value};
use marrow_storage::ColumnSchema;

/// Comparison operators over integer columns (EQ doubles as the equality
/// operator in WHERE conditions of any type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// Evaluates the operator over integer order.
    pub fn eval(self, lhs: i32, rhs: i32) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        };
        write!(f, "{}", s)
    }
}

/// A pure row-to-bool function composed from typed comparisons and
/// Boolean connectives.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Integer comparison on an INT column.
    Compare {
        column: usize,
        op: CompareOp,
        value: i32,
    },
    /// Value equality on a column of any type.
    Equals { column: usize, expected: Value },
    /// N-ary conjunction, short-circuiting on the first false child.
    And(Vec<Predicate>),
    /// N-ary disjunction, short-circuiting on the first true child.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Builds an integer comparison, resolving `column` by name.
    ///
    /// The referenced column must exist and be INT.
    pub fn compare(
        schema: &[ColumnSchema],
        column: &str,
        op: CompareOp,
        value: i32,
    ) -> Result<Self> {
        let (idx, col) = find_column(schema, column)?;
        if col.data_type != DataType::Int {
            return Err(MarrowError::TypeMismatch {
                column: column.to_string(),
                expected: DataType::Int.to_string(),
                actual: col.data_type.to_string(),
            });
        }
        Ok(Predicate::Compare {
            column: idx,
            op,
            value,
        })
    }

    /// Builds a value-equality predicate, resolving `column` by name.
    ///
    /// The expected value's runtime type must match the column type.
    pub fn equals(schema: &[ColumnSchema], column: &str, expected: Value) -> Result<Self> {
        let (idx, col) = find_column(schema, column)?;
        if expected.data_type() != col.data_type {
            return Err(MarrowError::TypeMismatch {
                column: column.to_string(),
                expected: col.data_type.to_string(),
                actual: expected.data_type().to_string(),
            });
        }
        Ok(Predicate::Equals {
            column: idx,
            expected,
        })
    }

    /// Builds an AND of at least two children.
    pub fn and(children: Vec<Predicate>) -> Result<Self> {
        if children.len() < 2 {
            return Err(MarrowError::PlanError(
                "AND requires at least two child predicates".to_string(),
            ));
        }
        Ok(Predicate::And(children))
    }

    /// Builds an OR of at least two children.
    pub fn or(children: Vec<Predicate>) -> Result<Self> {
        if children.len() < 2 {
            return Err(MarrowError::PlanError(
                "OR requires at least two child predicates".to_string(),
            ));
        }
        Ok(Predicate::Or(children))
    }

    /// Negates a predicate.
    pub fn not(child: Predicate) -> Self {
        Predicate::Not(Box::new(child))
    }

    /// Evaluates the predicate against a row.
    pub fn test(&self, row: &Row) -> Result<bool> {
        match self {
            Predicate::Compare { column, op, value } => {
                let v = row.values().get(*column).ok_or_else(|| {
                    MarrowError::ExecutionError(format!(
                        "predicate column {} out of bounds for row of {} values",
                        column,
                        row.values().len()
                    ))
                })?;
                let lhs = v.as_int().ok_or_else(|| {
                    MarrowError::ExecutionError(format!(
                        "comparison on non-INT value at column {}",
                        column
                    ))
                })?;
                Ok(op.eval(lhs, *value))
            }
            Predicate::Equals { column, expected } => {
                let v = row.values().get(*column).ok_or_else(|| {
                    MarrowError::ExecutionError(format!(
                        "predicate column {} out of bounds for row of {} values",
                        column,
                        row.values().len()
                    ))
                })?;
                Ok(v == expected)
            }
            Predicate::And(children) => {
                for child in children {
                    if !child.test(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if child.test(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(child) => Ok(!child.test(row)?),
        }
    }
}

fn find_column<'a>(schema: &'a [ColumnSchema], name: &str) -> Result<(usize, &'a ColumnSchema)> {
    schema
        .iter()
        .enumerate()
        .find(|(_, c)| c.name == name)
        .ok_or_else(|| MarrowError::ColumnNotFound(name.to_string()))
}
