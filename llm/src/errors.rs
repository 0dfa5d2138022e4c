//! Failure taxonomy for the embedder and LLM collaborators.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("completion request failed: {0}")]
    Completion(String),

    #[error("response did not match the requested JSON schema: {0}")]
    SchemaMismatch(String),

    #[error("circuit open for {0}")]
    CircuitOpen(&'static str),
}

pub type LlmResult<T> = Result<T, LlmError>;
