//! nsbridge Type Encodings
//!
//! Parsing and representation of the foreign runtime's textual type
//! encodings (`@`, `^{CGRect=...}`, `[12^f]`, ...), plus the process-wide
//! registry of named struct types discovered while parsing.

#![warn(missing_docs)]

pub mod error;
pub mod parser;
pub mod registry;
pub mod ty;

pub use error::{EncodingError, EncodingResult};
pub use parser::{parse_one, parse_sequence, strip_offsets, EncodingParser, MethodEncoding};
pub use registry::StructRegistry;
pub use ty::{AggregateKind, PrimitiveKind, StructField, StructType, TypeDescriptor};
