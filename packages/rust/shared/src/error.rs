//! Error types for Outreach.
//!
//! Library crates use [`OutreachError`] via `thiserror`.
//! App crates (cli/dashboard) wrap this with `color-eyre` or map it onto
//! HTTP responses.

use std::path::PathBuf;

/// Top-level error type for all Outreach operations.
#[derive(Debug, thiserror::Error)]
pub enum OutreachError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to an external provider.
    #[error("network error: {0}")]
    Network(String),

    /// A provider answered, but with an error (auth, quota, bad payload).
    #[error("provider error: {0}")]
    Provider(String),

    /// Response or file content could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Document or checkpoint store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record addressed by id does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (rejected before any external call).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Mail transport error (connection, auth, address, message build).
    #[error("mail error: {0}")]
    Mail(String),

    /// The request conflicts with work already in progress.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OutreachError>;

impl OutreachError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = OutreachError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = OutreachError::validation("niche is required");
        assert!(err.to_string().contains("niche is required"));
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let err = OutreachError::not_found("Contact", "abc");
        assert_eq!(err.to_string(), "Contact with id abc not found");
    }
}
