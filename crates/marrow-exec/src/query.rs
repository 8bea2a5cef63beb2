//! Logical query model: the parser's output and the planner's input.

use crate::predicate::CompareOp;
use marrow_common::{MarrowError, Result, Value};

/// One atomic WHERE condition: `NOT? column op literal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub literal: Value,
    pub negated: bool,
}

impl Condition {
    /// Creates a condition.
    pub fn new(column: impl Into<String>, op: CompareOp, literal: Value, negated: bool) -> Self {
        Self {
            column: column.into(),
            op,
            literal,
            negated,
        }
    }
}

/// Connective between two adjacent WHERE conditions. AND binds tighter
/// than OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

/// A WHERE clause as a flat sequence of conditions joined by connectors.
///
/// `connectors.len()` is always `conditions.len() - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    conditions: Vec<Condition>,
    connectors: Vec<Connector>,
}

impl WhereClause {
    /// Creates a clause, validating the conditions/connectors shape.
    pub fn new(conditions: Vec<Condition>, connectors: Vec<Connector>) -> Result<Self> {
        if conditions.is_empty() {
            return Err(MarrowError::ParseError(
                "WHERE clause requires at least one condition".to_string(),
            ));
        }
        if connectors.len() != conditions.len() - 1 {
            return Err(MarrowError::ParseError(format!(
                "WHERE clause has {} conditions but {} connectors",
                conditions.len(),
                connectors.len()
            )));
        }
        Ok(Self {
            conditions,
            connectors,
        })
    }

    /// Creates a single-condition clause.
    pub fn single(condition: Condition) -> Self {
        Self {
            conditions: vec![condition],
            connectors: Vec::new(),
        }
    }

    /// Returns the conditions in textual order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns the connectors between adjacent conditions.
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Returns true if the clause holds exactly one condition.
    pub fn is_single(&self) -> bool {
        self.conditions.len() == 1
    }
}

/// Inner-join specification: the query's base table joined to
/// `right_table` on `left_column = right_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,
}

/// Logical SELECT: empty `columns` means all columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub where_clause: Option<WhereClause>,
    pub join: Option<JoinSpec>,
}

/// Logical INSERT: a column list and a value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl InsertQuery {
    /// Creates an insert, validating the column/value shape.
    pub fn new(table: impl Into<String>, columns: Vec<String>, values: Vec<Value>) -> Result<Self> {
        if columns.is_empty() {
            return Err(MarrowError::ParseError(
                "INSERT requires a column list".to_string(),
            ));
        }
        if columns.len() != values.len() {
            return Err(MarrowError::ParseError(format!(
                "INSERT names {} columns but provides {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            table: table.into(),
            columns,
            values,
        })
    }
}

/// Logical DELETE with an optional WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub table: String,
    pub where_clause: Option<WhereClause>,
}

/// A parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
    Insert(InsertQuery),
    Delete(DeleteQuery),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(column: &str) -> Condition {
        Condition::new(column, CompareOp::Eq, Value::Int(1), false)
    }

    #[test]
    fn test_where_clause_shape_validation() {
        assert!(WhereClause::new(vec![], vec![]).is_err());
        assert!(WhereClause::new(vec![cond("a")], vec![Connector::And]).is_err());
        assert!(WhereClause::new(vec![cond("a"), cond("b")], vec![]).is_err());

        let w = WhereClause::new(vec![cond("a"), cond("b")], vec![Connector::Or]).unwrap();
        assert_eq!(w.conditions().len(), 2);
        assert_eq!(w.connectors(), &[Connector::Or]);
        assert!(!w.is_single());
    }

    #[test]
    fn test_where_clause_single() {
        let w = WhereClause::single(cond("a"));
        assert!(w.is_single());
        assert!(w.connectors().is_empty());
    }

    #[test]
    fn test_insert_query_validation() {
        assert!(InsertQuery::new("t", vec![], vec![]).is_err());
        assert!(InsertQuery::new("t", vec!["a".into()], vec![]).is_err());

        let q = InsertQuery::new("t", vec!["a".into()], vec![Value::Int(1)]).unwrap();
        assert_eq!(q.columns, vec!["a"]);
        assert_eq!(q.values, vec![Value::Int(1)]);
    }
}
