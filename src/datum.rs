//! Column data types and values.
//!
//! [`Type`] names a column's declared type and [`Value`] carries one typed
//! column value together with its compact binary serialization. Values are
//! what the executor moves across the table access method boundary inside
//! [`TupleSlot`](crate::tableam::TupleSlot)s.

use std::fmt;

use thiserror::Error;

/// Errors from value serialization/deserialization.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Buffer too small for the operation.
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Invalid data format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Returns `SerializationError::BufferTooSmall` if the buffer is too small.
#[macro_export]
macro_rules! ensure_buf_len {
    ($buf:expr, $required:expr) => {
        if $buf.len() < $required {
            return Err($crate::datum::SerializationError::BufferTooSmall {
                required: $required,
                available: $buf.len(),
            });
        }
    };
}

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean type.
    Bool,
    /// Variable-length binary string.
    Bytea,
    /// 2-byte integer.
    Int2,
    /// 4-byte integer.
    Int4,
    /// 8-byte integer.
    Int8,
    /// Single-precision floating-point.
    Float4,
    /// Double-precision floating-point.
    Float8,
    /// Variable-length string.
    Text,
}

impl Type {
    /// Returns the fixed byte size for fixed-length types, or `None` for variable-length types.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Type::Bool => Some(1),
            Type::Int2 => Some(2),
            Type::Int4 => Some(4),
            Type::Int8 => Some(8),
            Type::Float4 => Some(4),
            Type::Float8 => Some(8),
            Type::Text | Type::Bytea => None,
        }
    }

    /// Returns true if `value` is NULL or of this type.
    pub fn accepts(self, value: &Value) -> bool {
        value.data_type().is_none_or(|ty| ty == self)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Bool => "boolean",
            Type::Bytea => "bytea",
            Type::Int2 => "smallint",
            Type::Int4 => "integer",
            Type::Int8 => "bigint",
            Type::Float4 => "real",
            Type::Float8 => "double precision",
            Type::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    /// SQL NULL (type is unknown/any).
    Null,
    /// Boolean (true/false).
    Boolean(bool),
    /// 16-bit signed integer (SMALLINT).
    Int16(i16),
    /// 32-bit signed integer (INTEGER).
    Int32(i32),
    /// 64-bit signed integer (BIGINT).
    Int64(i64),
    /// 32-bit floating point (REAL).
    Float32(f32),
    /// 64-bit floating point (DOUBLE PRECISION).
    Float64(f64),
    /// Variable-length text.
    Text(String),
    /// Variable-length binary (BYTEA).
    Bytea(Vec<u8>),
}

impl Value {
    /// Returns the data type for this value, or `None` for Null.
    pub fn data_type(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Type::Bool),
            Value::Int16(_) => Some(Type::Int2),
            Value::Int32(_) => Some(Type::Int4),
            Value::Int64(_) => Some(Type::Int8),
            Value::Float32(_) => Some(Type::Float4),
            Value::Float64(_) => Some(Type::Float8),
            Value::Text(_) => Some(Type::Text),
            Value::Bytea(_) => Some(Type::Bytea),
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Binary, type-aware equality used when matching replicated rows.
    ///
    /// Unlike `==`, two NULLs are equal, values of different types are never
    /// equal, and floats compare by bit pattern (so `NaN` equals itself and
    /// `0.0` differs from `-0.0`).
    pub fn binary_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (a, b) if a.data_type() == b.data_type() => a == b,
            _ => false,
        }
    }

    /// Returns the serialized size in bytes.
    ///
    /// NULL takes 0 bytes (it is recorded in the null bitmap). Variable-length
    /// types include a 4-byte length prefix.
    pub fn serialized_size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int16(_) => 2,
            Value::Int32(_) => 4,
            Value::Int64(_) => 8,
            Value::Float32(_) => 4,
            Value::Float64(_) => 8,
            Value::Text(s) => 4 + s.len(),
            Value::Bytea(b) => 4 + b.len(),
        }
    }

    /// Serializes this value to a buffer and returns the number of bytes written.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializationError> {
        match self {
            Value::Null => Ok(0),
            Value::Boolean(b) => {
                ensure_buf_len!(buf, 1);
                buf[0] = u8::from(*b);
                Ok(1)
            }
            Value::Int16(n) => write_fixed(buf, &n.to_le_bytes()),
            Value::Int32(n) => write_fixed(buf, &n.to_le_bytes()),
            Value::Int64(n) => write_fixed(buf, &n.to_le_bytes()),
            Value::Float32(n) => write_fixed(buf, &n.to_le_bytes()),
            Value::Float64(n) => write_fixed(buf, &n.to_le_bytes()),
            Value::Text(s) => write_varlena(buf, s.as_bytes()),
            Value::Bytea(b) => write_varlena(buf, b),
        }
    }

    /// Deserializes a value of type `ty` and returns it with the bytes consumed.
    pub fn deserialize(buf: &[u8], ty: Type) -> Result<(Self, usize), SerializationError> {
        match ty {
            Type::Bool => {
                ensure_buf_len!(buf, 1);
                Ok((Value::Boolean(buf[0] != 0), 1))
            }
            Type::Int2 => {
                let bytes = read_fixed::<2>(buf)?;
                Ok((Value::Int16(i16::from_le_bytes(bytes)), 2))
            }
            Type::Int4 => {
                let bytes = read_fixed::<4>(buf)?;
                Ok((Value::Int32(i32::from_le_bytes(bytes)), 4))
            }
            Type::Int8 => {
                let bytes = read_fixed::<8>(buf)?;
                Ok((Value::Int64(i64::from_le_bytes(bytes)), 8))
            }
            Type::Float4 => {
                let bytes = read_fixed::<4>(buf)?;
                Ok((Value::Float32(f32::from_le_bytes(bytes)), 4))
            }
            Type::Float8 => {
                let bytes = read_fixed::<8>(buf)?;
                Ok((Value::Float64(f64::from_le_bytes(bytes)), 8))
            }
            Type::Text => {
                let (data, used) = read_varlena(buf)?;
                let s = String::from_utf8(data.to_vec())
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Ok((Value::Text(s), used))
            }
            Type::Bytea => {
                let (data, used) = read_varlena(buf)?;
                Ok((Value::Bytea(data.to_vec()), used))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", if *b { "t" } else { "f" }),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytea(b) => {
                write!(f, "\\x")?;
                b.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
            }
        }
    }
}

fn write_fixed(buf: &mut [u8], bytes: &[u8]) -> Result<usize, SerializationError> {
    ensure_buf_len!(buf, bytes.len());
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

fn write_varlena(buf: &mut [u8], data: &[u8]) -> Result<usize, SerializationError> {
    let required = 4 + data.len();
    ensure_buf_len!(buf, required);
    buf[0..4].copy_from_slice(&(data.len() as u32).to_le_bytes());
    buf[4..required].copy_from_slice(data);
    Ok(required)
}

fn read_fixed<const N: usize>(buf: &[u8]) -> Result<[u8; N], SerializationError> {
    ensure_buf_len!(buf, N);
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&buf[..N]);
    Ok(bytes)
}

fn read_varlena(buf: &[u8]) -> Result<(&[u8], usize), SerializationError> {
    let len = u32::from_le_bytes(read_fixed::<4>(buf)?) as usize;
    let required = 4 + len;
    ensure_buf_len!(buf, required);
    Ok((&buf[4..required], required))
}
