//! Error types for the data-loader crate.
//!
//! Rust error handling concepts demonstrated:
//! - thiserror for defining custom error types
//! - Enum variants for different error cases
//! - Error messages with context

use thiserror::Error;

/// Errors that can occur while reading, validating or writing rating files
///
/// The `#[derive(Error)]` macro from thiserror implements `std::error::Error`
/// and `Display` from the `#[error(...)]` attributes.
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// I/O error occurred while reading or writing a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in a ratings file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A line had fewer fields than a rating needs
    #[error("Expected at least {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// The file contained no ratings at all
    #[error("No ratings found in {0}")]
    Empty(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
