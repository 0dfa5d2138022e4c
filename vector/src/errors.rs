//! Failure taxonomy for the vector store collaborator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("vector store request failed: {0}")]
    Request(String),

    #[error("vector store API error ({code}): {message}")]
    Api { code: i32, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("circuit open for vector store")]
    CircuitOpen,

    #[error("collection dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: u32, actual: u32 },
}

pub type VectorResult<T> = Result<T, VectorError>;
