//! Query execution for MarrowDB.
//!
//! This crate provides:
//! - The pull-based operator pipeline (sequential scan, index scan,
//!   filter, projection, hash join)
//! - Typed predicates with Boolean composition
//! - The logical query model and its SQL text parser
//! - The planner mapping logical queries onto physical operator trees
//! - The executor's lazy row iterator and the unified query processor
//! - The `Database` facade tying the whole engine together

mod engine;
mod executor;
pub mod operators;
mod parser;
mod planner;
mod predicate;
mod processor;
mod query;
mod row;

pub use engine::Database;
pub use executor::RowIter;
pub use parser::parse;
pub use planner::Planner;
pub use predicate::{CompareOp, Predicate};
pub use processor::{QueryProcessor, Rows};
pub use query::{
    Condition, Connector, DeleteQuery, InsertQuery, JoinSpec, SelectQuery, Statement, WhereClause,
};
pub use row::{Row, SchemaRef};
