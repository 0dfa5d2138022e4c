//! Failure taxonomy for the graph store collaborator, grounded on the
//! teacher's `graph_rag::errors::GraphError` shape (`#[error("...")]` variants,
//! some wrapping `#[from]` sources, a `GraphResult<T>` alias). Unlike the
//! teacher's `GraphError`, this does not implement `actix_web::ResponseError`
//! — there is no HTTP surface in this crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph store connection failed: {0}")]
    Connection(String),

    #[error("graph query failed: {0}")]
    Query(String),

    #[error("node not found: {label}/{id}")]
    NodeNotFound { label: String, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("circuit open for graph store")]
    CircuitOpen,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type GraphResult<T> = Result<T, GraphError>;
