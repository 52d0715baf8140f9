use std::fmt;

use frag_convert::ConvertError;
use frag_store::StoreError;
use frag_types::TypeError;
use thiserror::Error;

/// Coarse error category, for boundary layers that map errors to
/// caller-visible outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    UnsupportedConversion,
    MalformedInput,
    ConversionFailed,
    StorageFault,
}

/// Errors from fragment operations.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// A required field is missing or the type cannot be stored. Raised
    /// before anything reaches storage.
    #[error("invalid fragment: {0}")]
    Validation(String),

    /// No record for this owner and id.
    #[error("fragment {id} not found")]
    NotFound { owner: String, id: String },

    /// The requested target is not a rendering of the stored type.
    #[error("cannot convert {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// The stored text is not valid for its declared type.
    #[error("malformed {kind} content: {reason}")]
    MalformedInput { kind: String, reason: String },

    /// A codec failed while rendering.
    #[error("conversion to {target} failed: {reason}")]
    ConversionFailed { target: String, reason: String },

    /// The storage backend failed.
    #[error("storage fault during {operation} of fragment {id}: {source}")]
    StorageFault {
        operation: &'static str,
        owner: String,
        id: String,
        #[source]
        source: StoreError,
    },
}

impl FragmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
            Self::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Self::StorageFault { .. } => ErrorKind::StorageFault,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn not_found(owner: impl ToString, id: impl ToString) -> Self {
        Self::NotFound {
            owner: owner.to_string(),
            id: id.to_string(),
        }
    }

    /// Wrap a store error with the operation and key it happened on.
    pub(crate) fn storage(
        operation: &'static str,
        owner: &dyn fmt::Display,
        id: &dyn fmt::Display,
    ) -> impl FnOnce(StoreError) -> Self {
        let owner = owner.to_string();
        let id = id.to_string();
        move |source| Self::StorageFault {
            operation,
            owner,
            id,
            source,
        }
    }
}

impl From<ConvertError> for FragmentError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Unsupported { from, to } => Self::UnsupportedConversion { from, to },
            ConvertError::MalformedInput { kind, reason } => Self::MalformedInput {
                kind: kind.to_string(),
                reason,
            },
            ConvertError::ConversionFailed { target, reason } => Self::ConversionFailed {
                target: target.to_string(),
                reason,
            },
        }
    }
}

impl From<TypeError> for FragmentError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias for fragment operations.
pub type FragmentResult<T> = Result<T, FragmentError>;
