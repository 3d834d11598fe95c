//! Record payload of a heap tuple.
//!
//! A heap tuple is a [`TupleHeader`](super::TupleHeader) followed by a
//! [`Record`]: the column values without any MVCC information.

use crate::datum::{SerializationError, Type, Value};
use crate::ensure_buf_len;

/// Column values of one row version.
///
/// # Serialization Format
///
/// ```text
/// +---------------------------+
/// | Null Bitmap (ceil(n/8) B) |  bit=1: NOT NULL, bit=0: NULL
/// +---------------------------+
/// | Value[0] (if not null)    |
/// | Value[1] (if not null)    |
/// | ...                       |
/// +---------------------------+
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Column values in order.
    pub values: Vec<Value>,
}

impl Record {
    /// Creates a new record with the given values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the serialized size of this record in bytes.
    pub fn serialized_size(&self) -> usize {
        let null_bitmap_bytes = self.values.len().div_ceil(8);
        let values_size: usize = self.values.iter().map(Value::serialized_size).sum();
        null_bitmap_bytes + values_size
    }

    /// Serializes this record into a new buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buf = vec![0u8; self.serialized_size()];
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Serializes this record to a buffer and returns the number of bytes written.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializationError> {
        ensure_buf_len!(buf, self.serialized_size());

        let num_cols = self.values.len();
        let null_bitmap_bytes = num_cols.div_ceil(8);
        for (i, byte) in buf.iter_mut().take(null_bitmap_bytes).enumerate() {
            *byte = (0..8)
                .filter(|bit| {
                    let col = i * 8 + bit;
                    col < num_cols && !self.values[col].is_null()
                })
                .fold(0u8, |b, bit| b | (1 << bit));
        }

        let mut offset = null_bitmap_bytes;
        for value in &self.values {
            offset += value.serialize(&mut buf[offset..])?;
        }
        Ok(offset)
    }

    /// Deserializes a record whose columns have the types in `schema`.
    pub fn deserialize(buf: &[u8], schema: &[Type]) -> Result<Self, SerializationError> {
        let null_bitmap_bytes = schema.len().div_ceil(8);
        ensure_buf_len!(buf, null_bitmap_bytes);

        let mut offset = null_bitmap_bytes;
        let mut values = Vec::with_capacity(schema.len());
        for (i, &ty) in schema.iter().enumerate() {
            let not_null = buf[i / 8] & (1 << (i % 8)) != 0;
            if not_null {
                let (value, used) = Value::deserialize(&buf[offset..], ty)?;
                values.push(value);
                offset += used;
            } else {
                values.push(Value::Null);
            }
        }
        Ok(Record { values })
    }
}
