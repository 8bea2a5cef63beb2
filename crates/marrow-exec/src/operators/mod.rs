//! Pull-based physical operators.
//!
//! Every operator follows the same lifecycle: `open` prepares state,
//! `next` yields one row or `None` when exhausted, `close` releases
//! resources. Parents drive children; no operator holds I/O resources
//! across `next` calls beyond its own buffered page or build table.
//!
//! An operator whose `open` fails after opening a child closes that child
//! before returning, so a failed pipeline never leaks an open subtree.

mod filter;
mod index_scan;
mod join;
mod projection;
mod seq_scan;

pub use filter::FilterOperator;
pub use index_scan::IndexScanOperator;
pub use join::JoinOperator;
pub use projection::ProjectionOperator;
pub use seq_scan::SeqScanOperator;

use crate::row::{Row, SchemaRef};
use marrow_common::Result;

/// A physical query operator.
pub trait Operator {
    /// Prepares the operator for iteration.
    fn open(&mut self) -> Result<()>;

    /// Returns the next row, or `None` when exhausted.
    fn next(&mut self) -> Result<Option<Row>>;

    /// Releases resources. Safe to call more than once.
    fn close(&mut self);

    /// Column metadata of this operator's output rows, if known.
    ///
    /// Available after a successful `open` for operators that read base
    /// tables; composite operators derive it from their children.
    fn schema(&self) -> Option<SchemaRef>;
}

/// Operators compose as boxed trait objects.
pub type BoxedOperator = Box<dyn Operator>;
