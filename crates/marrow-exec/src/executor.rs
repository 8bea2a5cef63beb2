//! Streamed execution of a planned operator tree.

use crate::operators::BoxedOperator;
use crate::row::Row;
use marrow_common::Result;

/// Lazy row iterator over an operator tree.
///
/// `open` runs on the first pull; `close` runs exactly once, on
/// exhaustion, on the first error, or on drop when the consumer stops
/// pulling early. Holding the open operator inside the iterator is what
/// guarantees release: the resource's scope is the iterator's scope.
pub struct RowIter {
    op: BoxedOperator,
    opened: bool,
    closed: bool,
}

impl RowIter {
    /// Wraps a planned operator tree.
    pub fn new(op: BoxedOperator) -> Self {
        Self {
            op,
            opened: false,
            closed: false,
        }
    }

    fn finish(&mut self) {
        if self.opened && !self.closed {
            self.op.close();
        }
        self.closed = true;
    }
}

impl Iterator for RowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }

        if !self.opened {
            if let Err(e) = self.op.open() {
                // A failed open has already unwound its own children.
                self.closed = true;
                return Some(Err(e));
            }
            self.opened = true;
        }

        match self.op.next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl Drop for RowIter {
    fn drop(&mut self) {
        self.finish();
    }
}
