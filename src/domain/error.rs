//! Domain-level error types for copilot-chat-export.
//!
//! Most of these never reach the user: per-location and per-descriptor
//! failures are logged and skipped by the resolver and extractor.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Nothing usable at the expected location.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// A store file is corrupt or has an unrecognized schema.
    #[error("Failed to parse {}: {message}", path.display())]
    ParseFailure { path: PathBuf, message: String },

    /// Store file locked or unreadable due to OS access rights.
    #[error("Permission denied: {message}")]
    PermissionDenied {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Workspace descriptor missing a folder or not valid JSON.
    #[error("Malformed workspace descriptor {}: {message}", path.display())]
    MalformedDescriptor { path: PathBuf, message: String },

    /// Failed to open or query a database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    ///
    /// Access-rights failures are classified as [`AppError::PermissionDenied`].
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                message: message.into(),
                source: Some(err),
            };
        }
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a parse failure for a store file.
    pub fn parse_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseFailure {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_permission_denied_is_classified() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            AppError::io("read state.vscdb", err),
            AppError::PermissionDenied { .. }
        ));

        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(AppError::io("read", err), AppError::Io { .. }));
    }

    #[test]
    fn test_parse_failure_message() {
        let err = AppError::parse_failure("/tmp/chat.json", "unexpected EOF");
        assert_eq!(
            err.to_string(),
            "Failed to parse /tmp/chat.json: unexpected EOF"
        );
    }
}
