use std::{error, fmt};

use crate::varint;

/// Errors raised while building a [`crate::Pickler`].
///
/// Construction errors are permanent: a schema that fails to build never
/// produces a pickler, and no serialization can occur.
#[derive(Debug, Clone)]
pub enum ConstructionError {
    /// A `TypeDesc` tree is malformed (e.g. a map missing one side, or a
    /// leaf with no reachable descriptor).
    UnsupportedType(&'static str),
    /// A sealed interface has a variant that is neither a record nor
    /// another interface, or a record's declared field count does not
    /// match the `Ast`s its fields produce.
    InvalidSchema(&'static str),
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType(what) => write!(f, "unsupported type: {what}"),
            Self::InvalidSchema(what) => write!(f, "invalid schema: {what}"),
        }
    }
}

impl error::Error for ConstructionError {}

/// Errors raised by a single `serialize`/`deserialize`/`size_of` call.
///
/// Per-call errors abort only the current call; the pickler itself is never
/// mutated and remains usable for the next call.
#[derive(Debug, Clone)]
pub enum CallError {
    /// A read or write went past the caller's buffer.
    BufferExhausted,
    /// An ordinal, marker, variant index, or length on the wire was outside
    /// its valid range, or a string payload was not valid UTF-8.
    MalformedWire(&'static str),
    /// A decoded ordinal names a record whose field count does not match,
    /// and compatibility mode could not bridge the difference.
    SchemaMismatch(&'static str),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferExhausted => f.write_str("buffer exhausted"),
            Self::MalformedWire(what) => write!(f, "malformed wire: {what}"),
            Self::SchemaMismatch(what) => write!(f, "schema mismatch: {what}"),
        }
    }
}

impl error::Error for CallError {}

impl From<varint::Error> for CallError {
    fn from(err: varint::Error) -> Self {
        match err {
            varint::Error::BufferExhausted => Self::BufferExhausted,
            varint::Error::VarintOverflow => Self::MalformedWire("varint too long"),
            varint::Error::InvalidUtf8 => Self::MalformedWire("invalid utf-8 in string payload"),
        }
    }
}
