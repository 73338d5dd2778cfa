//! Error types for vetolru

use std::fmt;

/// Result type alias for vetolru operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Capacity must be a positive number of entries
    InvalidCapacity(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity(size) => {
                write!(f, "Invalid capacity: {} (must be greater than 0)", size)
            }
        }
    }
}

impl std::error::Error for Error {}
