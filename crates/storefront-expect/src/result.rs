//! Result and error types for storefront-expect.

use thiserror::Error;

/// Result type for storefront-expect operations
pub type ExpectResult<T> = Result<T, ExpectError>;

/// Errors that can occur while reading UI state or evaluating assertions
#[derive(Debug, Error)]
pub enum ExpectError {
    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Assertion verdict was negative
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Rendered matcher message
        message: String,
    },

    /// A rendered value could not be read as the requested field type
    #[error("Value parsing failed at index {index}. Received: {raw:?}")]
    ValueParse {
        /// Position of the element in display order
        index: usize,
        /// Trimmed text that failed to parse
        raw: String,
    },

    /// The page driver could not complete a read
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ExpectError {
    /// Create a driver error from anything printable
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}
