//! Failure taxonomy (distilled §7) as real types: one `thiserror::Error` enum
//! per subsystem plus a crate-wide [`EngineError`] that `From`-wraps each,
//! grounded on the teacher's `graph_rag::errors::GraphError` enum shape.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("host entity '{0}' has no storage schema")]
    Configuration(String),

    #[error("identifier '{0}' failed validation")]
    InjectionDefense(String),

    #[error("discovery recursion exceeded depth guard ({0})")]
    DepthExceeded(u32),
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("graph write failed: {0}")]
    GraphWrite(String),

    #[error("vector write failed: {0}")]
    VectorWrite(String),

    #[error("data consistency violation: graph error '{graph_error}', compensation error '{compensation_error}'")]
    DataConsistency {
        graph_error: String,
        compensation_error: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("identifier '{0}' failed validation")]
    InjectionDefense(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("query generation failed after {retries} retries: {message}")]
    Generation { retries: u32, message: String },

    #[error("query validation failed: {0}")]
    Validation(String),

    #[error("unsafe query rejected: write operation requested without allow_write")]
    UnsafeQuery,
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("query execution failed: {0}")]
    Execution(String),

    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("read-only violation: query contains a write keyword")]
    ReadOnlyViolation,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("service temporarily unavailable: {0}")]
    CircuitOpen(String),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
pub type RetrievalResult<T> = Result<T, RetrievalError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
pub type ExecResult<T> = Result<T, ExecutionError>;
pub type EngineResult<T> = Result<T, EngineError>;
