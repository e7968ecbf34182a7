//! Errors raised while defining simulated classes

use thiserror::Error;

/// Class definition errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    /// A class with this name already exists
    #[error("Class '{0}' is already defined")]
    ClassExists(String),

    /// The named superclass does not exist
    #[error("Unknown superclass '{superclass}' for class '{class}'")]
    UnknownSuperclass {
        /// Class being defined
        class: String,
        /// Missing superclass
        superclass: String,
    },
}
