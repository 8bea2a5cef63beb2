//! Error types for MarrowDB.

use thiserror::Error;

/// Result type alias using MarrowError.
pub type Result<T> = std::result::Result<T, MarrowError>;

/// Errors that can occur in MarrowDB operations.
#[derive(Debug, Error)]
pub enum MarrowError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Storage errors
    #[error("Page full, unable to place record of {len} bytes")]
    PageFull { len: usize },

    #[error("Record too large: {len} bytes (max {max})")]
    RecordTooLarge { len: usize, max: usize },

    #[error("Record not found at {rid}")]
    RecordNotFound { rid: String },

    #[error("Slot {slot_id} out of range on page {page_id}")]
    SlotOutOfRange { page_id: u32, slot_id: u16 },

    // Decode errors
    #[error("Decode failed: buffer underflow reading {what}")]
    DecodeUnderflow { what: &'static str },

    #[error("Decode failed: negative length {len} for {what}")]
    DecodeNegativeLength { what: &'static str, len: i64 },

    #[error("Decode failed: invalid UTF-8 in VARCHAR value")]
    DecodeInvalidUtf8,

    // Catalog errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    // Value / validation errors
    #[error("Arity mismatch: record has {got} values, schema has {expected} columns")]
    ArityMismatch { expected: usize, got: usize },

    #[error("Type mismatch for column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("VARCHAR value for column '{column}' is {len} bytes (max {max})")]
    VarcharTooLong {
        column: String,
        len: usize,
        max: usize,
    },

    #[error("Missing value for column '{0}'")]
    MissingColumn(String),

    // Index errors
    #[error("Index on column '{column}' requires INT, found {actual}")]
    IndexTypeUnsupported { column: String, actual: String },

    // Query errors
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Plan error: {0}")]
    PlanError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    // Internal errors (invariant violations; should never surface to callers)
    #[error("Invariant violated: {0}")]
    Invariant(String),
}
