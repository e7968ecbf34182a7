//! Type encoding errors

use thiserror::Error;

/// Result type for encoding operations
pub type EncodingResult<T> = Result<T, EncodingError>;

/// Errors that can occur while parsing type encodings or registering struct types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// Unrecognized token in an encoding string
    #[error("Bad type encoding: unexpected '{token}' at character {position} in '{encoding}'")]
    BadTypeEncoding {
        /// The full encoding string
        encoding: String,
        /// Byte offset of the offending token
        position: usize,
        /// The offending character
        token: char,
    },

    /// The encoding string ended in the middle of a type
    #[error("Bad type encoding: unexpected end of string at character {position} in '{encoding}'")]
    UnexpectedEnd {
        /// The full encoding string
        encoding: String,
        /// Byte offset where more input was expected
        position: usize,
    },

    /// A name-only struct encoding (`{NAME}`) referenced an unregistered struct
    #[error("Struct encoding referenced undefined '{name}' struct type: '{encoding}'")]
    UnresolvedStructReference {
        /// The full encoding string
        encoding: String,
        /// The unknown struct name
        name: String,
    },

    /// Array encoding without a positive length
    #[error("Invalid array length at character {position} in '{encoding}'")]
    InvalidArrayLength {
        /// The full encoding string
        encoding: String,
        /// Byte offset of the array length
        position: usize,
    },

    /// Bitfield encodings (`bN`) are not supported
    #[error("Bitfield types are not supported (character {position} in '{encoding}')")]
    UnsupportedBitfield {
        /// The full encoding string
        encoding: String,
        /// Byte offset of the `b` token
        position: usize,
    },

    /// A struct definition was requested for a non-struct encoding
    #[error("Expected a struct type encoding, got: '{encoding}'")]
    NotAStructEncoding {
        /// The offending encoding string
        encoding: String,
    },

    /// An alias name is already bound to a different struct type
    #[error("Struct type alias '{alias}' already exists")]
    AliasExists {
        /// The alias name
        alias: String,
    },

    /// Lookup of an unregistered struct name
    #[error("Struct type '{name}' is not defined")]
    UndefinedStruct {
        /// The struct name
        name: String,
    },
}

impl EncodingError {
    /// The encoding string the error refers to, if any
    pub fn encoding(&self) -> Option<&str> {
        match self {
            EncodingError::BadTypeEncoding { encoding, .. }
            | EncodingError::UnexpectedEnd { encoding, .. }
            | EncodingError::UnresolvedStructReference { encoding, .. }
            | EncodingError::InvalidArrayLength { encoding, .. }
            | EncodingError::UnsupportedBitfield { encoding, .. }
            | EncodingError::NotAStructEncoding { encoding } => Some(encoding),
            EncodingError::AliasExists { .. } | EncodingError::UndefinedStruct { .. } => None,
        }
    }

    /// Cursor position of the failure, for errors raised mid-parse
    pub fn position(&self) -> Option<usize> {
        match self {
            EncodingError::BadTypeEncoding { position, .. }
            | EncodingError::UnexpectedEnd { position, .. }
            | EncodingError::InvalidArrayLength { position, .. }
            | EncodingError::UnsupportedBitfield { position, .. } => Some(*position),
            _ => None,
        }
    }
}
