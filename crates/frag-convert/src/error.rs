use frag_types::MediaKind;
use thiserror::Error;

/// Errors from the conversion engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The target is not in the source's convertibility row, or one of the
    /// types is unknown.
    #[error("cannot convert {from} to {to}")]
    Unsupported { from: String, to: String },

    /// The payload is not valid for its declared text type.
    #[error("malformed {kind} input: {reason}")]
    MalformedInput { kind: MediaKind, reason: String },

    /// A codec or serializer failed while producing the target.
    #[error("conversion to {target} failed: {reason}")]
    ConversionFailed { target: MediaKind, reason: String },
}

impl ConvertError {
    pub(crate) fn unsupported(from: impl ToString, to: impl ToString) -> Self {
        Self::Unsupported {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub(crate) fn malformed(kind: MediaKind, reason: impl ToString) -> Self {
        Self::MalformedInput {
            kind,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn failed(target: MediaKind, reason: impl ToString) -> Self {
        Self::ConversionFailed {
            target,
            reason: reason.to_string(),
        }
    }
}

/// Result alias for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;
