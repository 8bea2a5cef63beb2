//! Record representation and type-directed serialization.

use crate::catalog::ColumnSchema;
use bytes::{Buf, BufMut, BytesMut};
use marrow_common::{DataType, MarrowError, Result, Value};

/// Row identifier: a (page, slot) pair uniquely naming a record within its
/// table's heap file.
///
/// RIDs are stable values: once assigned, a live RID never refers to a
/// different record, and a tombstoned RID is never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    /// Page number within the heap file.
    pub page_id: u32,
    /// Slot number within the page.
    pub slot_id: u16,
}

impl Rid {
    /// Creates a new row identifier.
    pub fn new(page_id: u32, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

impl std::fmt::Display for Rid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot_id)
    }
}

/// Length prefix for serialized VARCHAR values.
const VARCHAR_PREFIX_LEN: usize = 4;

/// An ordered tuple of values matching a table's column schemas.
///
/// Serialization walks the schema in order; the byte stream carries no
/// self-describing tags, so deserialization is driven by the same schema.
/// All on-disk integers are big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Creates a record from its values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the record's values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the record, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Serializes the record against the given schema.
    ///
    /// Fails on arity mismatch or when a value's runtime type does not
    /// match its column's type tag.
    pub fn to_bytes(&self, columns: &[ColumnSchema]) -> Result<Vec<u8>> {
        let size = self.serialized_size(columns)?;
        let mut buf = BytesMut::with_capacity(size);

        for (col, val) in columns.iter().zip(&self.values) {
            match (col.data_type, val) {
                (DataType::Int, Value::Int(v)) => buf.put_i32(*v),
                (DataType::Boolean, Value::Boolean(v)) => buf.put_u8(*v as u8),
                (DataType::Varchar, Value::Varchar(s)) => {
                    buf.put_u32(s.len() as u32);
                    buf.put_slice(s.as_bytes());
                }
                (expected, actual) => {
                    return Err(MarrowError::TypeMismatch {
                        column: col.name.clone(),
                        expected: expected.to_string(),
                        actual: actual.data_type().to_string(),
                    })
                }
            }
        }

        Ok(buf.to_vec())
    }

    /// Returns the exact serialized length of this record.
    ///
    /// Agrees byte-for-byte with the length of [`Record::to_bytes`] output.
    pub fn serialized_size(&self, columns: &[ColumnSchema]) -> Result<usize> {
        if self.values.len() != columns.len() {
            return Err(MarrowError::ArityMismatch {
                expected: columns.len(),
                got: self.values.len(),
            });
        }

        let mut size = 0;
        for (col, val) in columns.iter().zip(&self.values) {
            size += match col.data_type.fixed_size() {
                Some(n) => n,
                None => match val {
                    Value::Varchar(s) => VARCHAR_PREFIX_LEN + s.len(),
                    other => {
                        return Err(MarrowError::TypeMismatch {
                            column: col.name.clone(),
                            expected: col.data_type.to_string(),
                            actual: other.data_type().to_string(),
                        })
                    }
                },
            };
        }
        Ok(size)
    }

    /// Deserializes a record from bytes, driven by the schema.
    pub fn from_bytes(data: &[u8], columns: &[ColumnSchema]) -> Result<Self> {
        let mut buf = data;
        let mut values = Vec::with_capacity(columns.len());

        for col in columns {
            let value = match col.data_type {
                DataType::Int => {
                    if buf.remaining() < 4 {
                        return Err(MarrowError::DecodeUnderflow { what: "INT value" });
                    }
                    Value::Int(buf.get_i32())
                }
                DataType::Boolean => {
                    if buf.remaining() < 1 {
                        return Err(MarrowError::DecodeUnderflow {
                            what: "BOOLEAN value",
                        });
                    }
                    Value::Boolean(buf.get_u8() != 0)
                }
                DataType::Varchar => {
                    if buf.remaining() < VARCHAR_PREFIX_LEN {
                        return Err(MarrowError::DecodeUnderflow {
                            what: "VARCHAR length",
                        });
                    }
                    let len = buf.get_i32();
                    if len < 0 {
                        return Err(MarrowError::DecodeNegativeLength {
                            what: "VARCHAR length",
                            len: len as i64,
                        });
                    }
                    let len = len as usize;
                    if buf.remaining() < len {
                        return Err(MarrowError::DecodeUnderflow {
                            what: "VARCHAR bytes",
                        });
                    }
                    let s = std::str::from_utf8(&buf[..len])
                        .map_err(|_| MarrowError::DecodeInvalidUtf8)?
                        .to_string();
                    buf.advance(len);
                    Value::Varchar(s)
                }
            };
            values.push(value);
        }

        Ok(Self { values })
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}
