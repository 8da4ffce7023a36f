//! Unified error types for kumi.
//!
//! Each variant maps to one HTTP status class at the server boundary; see
//! [`Error::status_code`].

use tokio_rusqlite::rusqlite;

use crate::compiler::Diagnostic;

/// Unified error types for the kumi cache and share service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field was missing or blank.
    #[error("MISSING_INPUT: {0}")]
    MissingInput(String),

    /// The compiler rejected the input.
    #[error("COMPILE_FAILED: {}", summarize(.0))]
    CompileFailed(Vec<Diagnostic>),

    /// No artifact or share exists under the given key.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The volatile store could not be reached.
    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),

    /// Database operation failed.
    #[error("STORAGE_UNAVAILABLE: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A record failed a uniqueness or presence check.
    #[error("VALIDATION_FAILED: {field} {message}")]
    ValidationFailed { field: String, message: String },

    /// A stored blob could not be decoded.
    #[error("CORRUPT_BLOB: {0}")]
    CorruptBlob(String),

    /// A payload could not be compressed for storage.
    #[error("COMPRESSION_FAILED: {0}")]
    Compression(String),

    /// JSON encoding failed.
    #[error("SERIALIZATION: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    match diagnostics.first() {
        Some(first) if diagnostics.len() > 1 => format!("{} (+{} more)", first.message, diagnostics.len() - 1),
        Some(first) => first.message.clone(),
        None => "compiler reported failure".to_string(),
    }
}

impl Error {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MissingInput(_) => 400,
            Error::NotFound(_) => 404,
            Error::ValidationFailed { .. } => 422,
            Error::StorageUnavailable(_) | Error::Database(_) => 503,
            Error::CompileFailed(_)
            | Error::MigrationFailed(_)
            | Error::CorruptBlob(_)
            | Error::Compression(_)
            | Error::Serialization(_) => 500,
        }
    }

    /// Whether this error indicates a backend outage rather than a bad request.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_) | Error::Database(_))
    }

    /// Client-facing messages for the `errors` list of a JSON error body.
    ///
    /// Compile failures are rendered separately with their structured
    /// diagnostics.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Error::MissingInput(msg) => vec![msg.clone()],
            Error::NotFound(_) => vec!["Resource not found".to_string()],
            Error::ValidationFailed { field, message } => vec![format!("{} {}", capitalize(field), message)],
            Error::StorageUnavailable(_) | Error::Database(_) => vec!["Storage service unavailable".to_string()],
            Error::CompileFailed(diagnostics) => diagnostics.iter().map(|d| d.message.clone()).collect(),
            Error::MigrationFailed(_) | Error::CorruptBlob(_) | Error::Compression(_) | Error::Serialization(_) => {
                vec!["Internal server error".to_string()]
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            other => Error::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("kumi:share:abc123".to_string());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::MissingInput("schema_src".into()).status_code(), 400);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::StorageUnavailable("down".into()).status_code(), 503);
        assert_eq!(Error::CompileFailed(vec![]).status_code(), 500);
        let conflict = Error::ValidationFailed { field: "uid".into(), message: "has already been taken".into() };
        assert_eq!(conflict.status_code(), 422);
    }

    #[test]
    fn test_connection_errors_stay_storage() {
        let err = Error::from(tokio_rusqlite::Error::<Error>::ConnectionClosed);
        assert!(err.is_storage());
        assert_eq!(err.status_code(), 503);

        let inner = Error::from(tokio_rusqlite::Error::Error(Error::NotFound("uid".into())));
        assert!(matches!(inner, Error::NotFound(_)));
    }

    #[test]
    fn test_corrupt_blob_is_internal() {
        let err = Error::CorruptBlob("brotli: invalid data".into());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.messages(), vec!["Internal server error".to_string()]);
    }

    #[test]
    fn test_validation_message() {
        let err = Error::ValidationFailed { field: "uid".into(), message: "has already been taken".into() };
        assert_eq!(err.messages(), vec!["Uid has already been taken".to_string()]);
    }

    #[test]
    fn test_storage_messages_hide_backend_detail() {
        let err = Error::StorageUnavailable("connection refused 10.0.0.3".into());
        assert!(err.is_storage());
        assert_eq!(err.messages(), vec!["Storage service unavailable".to_string()]);
    }

    #[test]
    fn test_compile_failed_display() {
        let err = Error::CompileFailed(vec![
            Diagnostic { message: "unexpected token".into(), line: Some(1), column: Some(3) },
            Diagnostic { message: "unknown type".into(), line: None, column: None },
        ]);
        assert_eq!(err.to_string(), "COMPILE_FAILED: unexpected token (+1 more)");
    }
}
