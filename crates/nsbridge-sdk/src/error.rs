//! Errors raised on the foreign side of a call

/// Result of a raw foreign call
pub type CallResult<T> = Result<T, ForeignException>;

/// An exception thrown by foreign code and caught at the call boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {reason}")]
pub struct ForeignException {
    /// Exception class name, e.g. `NSInvalidArgumentException`
    pub name: String,
    /// Human-readable reason
    pub reason: String,
}

impl ForeignException {
    /// Create an exception
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// `NSInvalidArgumentException`, the usual complaint about bad arguments
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::new("NSInvalidArgumentException", reason)
    }
}
