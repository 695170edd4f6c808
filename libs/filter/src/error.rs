//! Error types for the filter compiler

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Filter compilation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed filter text. Raised once, at the first offending token.
    #[error("{line}:{column} {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Reference path has {depth} segments, maximum is {max}")]
    PathTooDeep { depth: usize, max: usize },

    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid compile options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// True for errors caused by the filter text itself rather than the
    /// compiler configuration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Syntax { .. } | Error::PathTooDeep { .. })
    }
}
