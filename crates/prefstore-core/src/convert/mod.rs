//! Bidirectional mapping between typed values and byte sequences.
//!
//! Every supported type implements [`Storable`], which is the closed default
//! mapping. A [`ConverterRegistry`] can hold a custom [`TypeConverter`] per
//! type; the pipeline consults it first and falls back to the `Storable`
//! implementation otherwise.

mod bigint;
mod bytes;
mod enumerated;
mod primitives;
mod registry;
mod structured;

use std::fmt;

use thiserror::Error;

use crate::charset::Charset;

pub use enumerated::{EnumValue, Enumerated};
pub use registry::{ConverterRegistry, DefaultConverter};
pub use structured::Json;

/// Closed set of value kinds a store can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Text,
    BigInteger,
    Bytes,
    Structured,
    Enumerated,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Text => "string",
            ValueKind::BigInteger => "big integer",
            ValueKind::Bytes => "byte sequence",
            ValueKind::Structured => "structured",
            ValueKind::Enumerated => "enumerated",
        };
        f.write_str(name)
    }
}

/// Errors produced while converting values to and from bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Bytes do not parse as the representation of the requested kind.
    #[error("malformed {kind} value: {reason}")]
    Malformed { kind: ValueKind, reason: String },
    /// Text could not be mapped through the configured charset.
    #[error("{charset} conversion failed: {reason}")]
    Charset {
        charset: &'static str,
        reason: String,
    },
}

impl ConvertError {
    pub fn malformed(kind: ValueKind, reason: impl fmt::Display) -> Self {
        ConvertError::Malformed {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// A value type with a canonical byte representation.
///
/// `decode(encode(v)) == v` must hold for every valid `v`.
pub trait Storable: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError>;

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError>;
}

/// Converter object for `T`, used to override the default representation.
pub trait TypeConverter<T>: Send + Sync {
    fn encode(&self, value: &T, charset: Charset) -> Result<Vec<u8>, ConvertError>;

    fn decode(&self, bytes: &[u8], charset: Charset) -> Result<T, ConvertError>;
}
