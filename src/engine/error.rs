//! Engine errors
//!
//! Every repository, registry and transfer operation reports failures
//! through [`EngineError`]. Nothing in the engine retries on its own; the
//! caller decides what to do with a failed operation.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Backend identifier did not match any known backend kind
    #[error("Unsupported backend: {kind}")]
    UnsupportedBackend { kind: String },

    /// An operation was attempted before any repository was created
    #[error("No repository has been initialized")]
    NotInitialized,

    /// An operation was issued against a closed repository
    #[error("Repository is closed")]
    Closed,

    /// Constraint violation or I/O failure reported by a backend
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Credential not found: {id}")]
    NotFound { id: i64 },

    /// Patch key outside of the mutable field set
    #[error("Unknown credential field: {field}")]
    UnknownField { field: String },

    #[error("Invalid update: {message}")]
    InvalidPatch { message: String },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    /// Import payload could not be parsed
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn unsupported_backend(kind: impl Into<String>) -> Self {
        Self::UnsupportedBackend { kind: kind.into() }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn not_found(id: i64) -> Self {
        Self::NotFound { id }
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            message: message.into(),
        }
    }

    pub fn unsupported_file_type(extension: impl Into<String>) -> Self {
        Self::UnsupportedFileType {
            extension: extension.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => Self::Closed,
            other => Self::persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_maps_to_closed() {
        let err: EngineError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, EngineError::Closed));
    }

    #[test]
    fn driver_errors_map_to_persistence() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, EngineError::Persistence { .. }));
    }
}
