//! Error types for the genai protocol layer.

use thiserror::Error;

/// Errors raised while building content, encoding it, or driving a session.
#[derive(Debug, Error)]
pub enum GenaiError {
    #[error("a mimetype must be specified when providing bytes as the chunk value")]
    MissingMimetype,
    #[error("unsupported chunk value: {0}")]
    UnsupportedChunkValue(String),
    #[error("cannot convert chunk of type {mimetype} to text")]
    NotTextContent { mimetype: String },
    #[error("mismatching protobuf message mimetype: expected={expected}, got={actual}")]
    MimetypeMismatch { expected: String, actual: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("an id cannot be provided alongside a SessionMessage or Action descriptor")]
    ConflictingId,
    #[error("session is closed for writing")]
    SessionClosedForWriting,
    #[error("host must be specified when using a custom endpoint")]
    MissingHost,
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("incomplete fragment tree {root_id}: missing children {missing:?}")]
    IncompleteTree {
        root_id: String,
        missing: Vec<String>,
    },
    #[error("duplicate fragment id: {0}")]
    DuplicateFragment(String),
    #[error("stream ended with fragments no root claimed: {0:?}")]
    UnclaimedFragments(Vec<String>),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<prost::DecodeError> for GenaiError {
    fn from(error: prost::DecodeError) -> Self {
        Self::Decode(error.to_string())
    }
}

/// Convenience result type for protocol operations.
pub type GenaiResult<T> = Result<T, GenaiError>;
