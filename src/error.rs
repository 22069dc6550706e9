use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the search engine.
///
/// Variants follow the engine's historical error classes so messages read the
/// same as the class names users grep logs for (`DatabaseOpeningError`, ...).
#[derive(Debug, Error)]
pub enum Error {
    #[error("DatabaseOpeningError: {message}")]
    DatabaseOpening { message: String, path: PathBuf },

    #[error("DatabaseCorruptError: {message}")]
    DatabaseCorrupt {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("DatabaseVersionError: {message}")]
    DatabaseVersion { message: String },

    #[error("DocNotFoundError: Document {docid} not found")]
    DocNotFound { docid: u32 },

    #[error("InvalidArgumentError: {0}")]
    InvalidArgument(String),

    #[error("InvalidOperationError: {0}")]
    InvalidOperation(String),

    #[error("QueryParserError: {0}")]
    QueryParser(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("DatabaseError: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The error class name, e.g. `"DocNotFoundError"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::DatabaseOpening { .. } => "DatabaseOpeningError",
            Error::DatabaseCorrupt { .. } => "DatabaseCorruptError",
            Error::DatabaseVersion { .. } => "DatabaseVersionError",
            Error::DocNotFound { .. } => "DocNotFoundError",
            Error::InvalidArgument(_) => "InvalidArgumentError",
            Error::InvalidOperation(_) => "InvalidOperationError",
            Error::QueryParser(_) => "QueryParserError",
            Error::Range(_) => "RangeError",
            Error::Io { .. } => "DatabaseError",
        }
    }

    pub(crate) fn opening(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::DatabaseOpening {
            message: message.into(),
            path: path.into(),
        }
    }

    pub(crate) fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_kind() {
        let err = Error::DocNotFound { docid: 7 };
        assert_eq!(err.to_string(), "DocNotFoundError: Document 7 not found");
        assert_eq!(err.kind(), "DocNotFoundError");
    }

    #[test]
    fn test_opening_error() {
        let err = Error::opening("/nope", "Couldn't open /nope");
        assert_eq!(err.kind(), "DatabaseOpeningError");
        assert!(err.to_string().contains("/nope"));
    }
}
