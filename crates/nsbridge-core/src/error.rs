//! Bridge errors

use nsbridge_sdk::ForeignException;
use nsbridge_types::EncodingError;
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while resolving, marshaling or invoking foreign methods
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    /// A type encoding could not be parsed
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// No selector spelling of a host method name is handled by the receiver
    #[error("No method named {class}.{name}{}", suggestion_suffix(.suggestion))]
    MethodNotFound {
        /// Receiver class name
        class: String,
        /// Host-side method name
        name: String,
        /// A spelling that would have resolved, if any
        suggestion: Option<String>,
    },

    /// The runtime has no method for a concrete selector
    #[error("{class} has no method for selector '{selector}'")]
    SelectorNotFound {
        /// Receiver class name
        class: String,
        /// Selector name
        selector: String,
    },

    /// Unknown class name
    #[error("Class '{name}' not found")]
    ClassNotFound {
        /// The requested class name
        name: String,
    },

    /// A host value has no foreign object equivalent
    #[error("Cannot convert {kind} value to a foreign object")]
    UnconvertibleValue {
        /// Kind of the offending host value
        kind: String,
    },

    /// Iteration over an object that is not a collection
    #[error("Can't iterate over non-enumerable type {class}")]
    NotEnumerable {
        /// Class of the receiver
        class: String,
    },

    /// An exception thrown by foreign code
    #[error("{name}: {reason}")]
    ForeignException {
        /// Exception name
        name: String,
        /// Exception reason
        reason: String,
    },

    /// Wrong number of explicit arguments
    #[error("{selector} expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Selector name
        selector: String,
        /// Explicit arguments the method takes
        expected: usize,
        /// Arguments supplied
        got: usize,
    },

    /// An argument could not be marshaled to its declared type
    #[error("{selector} expected '{encoding}', argument {index}: {reason}")]
    ArgumentType {
        /// Selector name
        selector: String,
        /// Zero-based explicit argument index
        index: usize,
        /// Method encoding without offsets
        encoding: String,
        /// What went wrong
        reason: String,
    },

    /// A type the bridge can parse but not marshal (unions, incomplete structs)
    #[error("Unsupported type '{encoding}': {reason}")]
    UnsupportedType {
        /// Type encoding
        encoding: String,
        /// Why it is unsupported
        reason: String,
    },

    /// A struct field name that the struct type does not declare
    #[error("Struct type '{struct_name}' has no field '{field}'")]
    UnknownStructField {
        /// Struct tag
        struct_name: String,
        /// Requested field
        field: String,
    },

    /// More positional values than the struct type has fields
    #[error("Struct type '{struct_name}' has {expected} fields, got {got} values")]
    StructFieldCount {
        /// Struct tag
        struct_name: String,
        /// Declared field count
        expected: usize,
        /// Values supplied
        got: usize,
    },

    /// A block whose host callable was already released
    #[error("Block {id} has been released")]
    ReleasedCallable {
        /// Block registry id
        id: u64,
    },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean {}?)", name),
        None => String::new(),
    }
}

impl From<ForeignException> for BridgeError {
    fn from(exception: ForeignException) -> Self {
        BridgeError::ForeignException {
            name: exception.name,
            reason: exception.reason,
        }
    }
}

impl BridgeError {
    /// Convert back into a foreign exception, for errors raised inside block callbacks
    pub fn into_foreign_exception(self) -> ForeignException {
        match self {
            BridgeError::ForeignException { name, reason } => ForeignException { name, reason },
            other => ForeignException::new("NSBridgeHostException", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_found_message() {
        let err = BridgeError::MethodNotFound {
            class: "NSString".to_string(),
            name: "stringWithString".to_string(),
            suggestion: Some("stringWithString_".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "No method named NSString.stringWithString (did you mean stringWithString_?)"
        );

        let err = BridgeError::MethodNotFound {
            class: "NSString".to_string(),
            name: "frobnicate".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "No method named NSString.frobnicate");
    }

    #[test]
    fn test_foreign_exception_roundtrip() {
        let err: BridgeError = ForeignException::invalid_argument("nil key").into();
        let back = err.into_foreign_exception();
        assert_eq!(back.name, "NSInvalidArgumentException");
        assert_eq!(back.reason, "nil key");
    }
}
