use influxdb3_id::DbrpId;

use crate::store;

/// Broad classification of an [`Error`], for front ends that translate
/// failures into status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Invalid,
    NotFound,
    AlreadyExists,
    Unauthorized,
    GenerationExhausted,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("DBRP provided is invalid: {reason}")]
    Invalid { reason: String },

    #[error("unable to find DBRP {id}")]
    NotFound { id: DbrpId },

    #[error("DBRP {id} already exists, use update to modify it")]
    AlreadyExists { id: DbrpId },

    #[error("unauthorized: {source}")]
    Unauthorized { source: influxdb3_authz::Error },

    #[error("unable to generate valid id after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    #[error("failed to {op} {target}: {source}")]
    Internal {
        op: &'static str,
        target: String,
        source: store::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::GenerationExhausted { .. } => ErrorKind::GenerationExhausted,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Wrap a store failure while operating on a single mapping.
    pub(crate) fn internal(op: &'static str, id: DbrpId) -> impl FnOnce(store::Error) -> Self {
        move |source| Self::Internal {
            op,
            target: format!("DBRP {id}"),
            source,
        }
    }
}

/// A specialized `Result` for DBRP mapping operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
