//! Error types for corpus build and lookup

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CorpusError>;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Line {line}: invalid JSON: {source}")]
    Json {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: missing field '{field}'")]
    MissingField { line: u64, field: String },

    #[error("Line {line}: invalid document id: {reason}")]
    InvalidId { line: u64, reason: String },

    #[error("Line {line}: document id \"0\" with an empty range at offset 0 collides with the index sentinel")]
    SentinelCollision { line: u64 },

    #[error("Malformed index at line {line}: {reason}")]
    MalformedIndex { line: u64, reason: String },

    #[error("Document '{id}' is not valid UTF-8 (index/data corruption)")]
    CorruptDocument { id: String },

    #[error("Index file not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Document not found: {0}")]
    IdNotFound(String),

    #[error("Ordinal {ordinal} out of range (corpus has {len} documents)")]
    OrdinalOutOfRange { ordinal: i64, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus store is closed")]
    Closed,

    #[error("Invalid build config: {0}")]
    Config(String),
}

/// Coarse error category, one per failure class callers are expected to
/// branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    NotFound,
    OutOfRange,
    Io,
    Closed,
    Config,
}

impl CorpusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CorpusError::Json { .. }
            | CorpusError::MissingField { .. }
            | CorpusError::InvalidId { .. }
            | CorpusError::SentinelCollision { .. }
            | CorpusError::MalformedIndex { .. }
            | CorpusError::CorruptDocument { .. } => ErrorKind::Format,
            CorpusError::IndexNotFound(_) | CorpusError::IdNotFound(_) => ErrorKind::NotFound,
            CorpusError::OrdinalOutOfRange { .. } => ErrorKind::OutOfRange,
            CorpusError::Io(_) => ErrorKind::Io,
            CorpusError::Closed => ErrorKind::Closed,
            CorpusError::Config(_) => ErrorKind::Config,
        }
    }

    /// Stable error code for scripts wrapping the CLI
    pub fn code(&self) -> &'static str {
        match self {
            CorpusError::Json { .. } => "INVALID_JSON",
            CorpusError::MissingField { .. } => "MISSING_FIELD",
            CorpusError::InvalidId { .. } => "INVALID_ID",
            CorpusError::SentinelCollision { .. } => "SENTINEL_COLLISION",
            CorpusError::MalformedIndex { .. } => "MALFORMED_INDEX",
            CorpusError::CorruptDocument { .. } => "CORRUPT_DOCUMENT",
            CorpusError::IndexNotFound(_) => "INDEX_NOT_FOUND",
            CorpusError::IdNotFound(_) => "ID_NOT_FOUND",
            CorpusError::OrdinalOutOfRange { .. } => "OUT_OF_RANGE",
            CorpusError::Io(_) => "IO_ERROR",
            CorpusError::Closed => "CLOSED",
            CorpusError::Config(_) => "INVALID_CONFIG",
        }
    }
}
