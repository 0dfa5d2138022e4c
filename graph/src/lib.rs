//! The graph store collaborator (distilled spec §6): a pattern-matching
//! node/edge store the engine's Coordinator, Retriever, and Executor read
//! from and write to, always through the [`GraphStore`] trait.

pub mod errors;
pub mod fake;
pub mod neo4j;
pub mod store;

pub use errors::{GraphError, GraphResult};
pub use fake::FakeGraphStore;
pub use neo4j::Neo4jGraphStore;
pub use store::{EdgeRef, GraphStore, QueryParams, Row};
