use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid media type {value:?}: {reason}")]
    InvalidMediaType { value: String, reason: String },

    #[error("empty {0}")]
    Empty(&'static str),
}
