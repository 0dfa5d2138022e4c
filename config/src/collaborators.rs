//! Connection settings for the engine's four collaborators: graph store,
//! vector store, embedder, and LLM. Deployment topology, not engine policy —
//! kept separate from [`crate::EngineConfig`], paralleling the teacher's split
//! between `AppConfig`'s service URLs and each service's own credential reads.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    pub graph_store: GraphStoreConfig,
    pub vector_store: VectorStoreConfig,
    pub embedder: EmbedderConfig,
    pub llm: LlmConfig,
}

impl CollaboratorsConfig {
    pub fn from_env() -> Self {
        Self {
            graph_store: GraphStoreConfig::from_env(),
            vector_store: VectorStoreConfig::from_env(),
            embedder: EmbedderConfig::from_env(),
            llm: LlmConfig::from_env(),
        }
    }
}

/// Neo4j connection settings, grounded on the teacher's `Neo4jClient::new(uri, user, password)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl GraphStoreConfig {
    pub fn from_env() -> Self {
        Self {
            uri: env::var("RAQE_GRAPH_URI").unwrap_or_else(|_| "neo4j://localhost:7687".to_string()),
            user: env::var("RAQE_GRAPH_USER").unwrap_or_else(|_| "neo4j".to_string()),
            password: env::var("RAQE_GRAPH_PASSWORD").unwrap_or_default(),
        }
    }
}

/// Zilliz-style vector store connection settings, grounded on the teacher's
/// `VectorStoreService::new(endpoint_url, timeout_secs)` plus its `ZILLIZ_API_KEY` read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl VectorStoreConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("RAQE_VECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:19530".to_string()),
            api_key: env::var("RAQE_VECTOR_API_KEY").unwrap_or_default(),
            timeout_secs: env::var("RAQE_VECTOR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Embedding-model connection settings, grounded on the teacher's
/// `async_openai::Client<OpenAIConfig>` usage and its `phf`-backed default dimension lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub api_key: String,
    pub model: String,
    pub dimension: Option<u32>,
}

impl EmbedderConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: env::var("RAQE_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            dimension: env::var("RAQE_EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// LLM connection settings for query generation and response narration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: env::var("RAQE_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_tokens: env::var("RAQE_LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_non_panicking_when_env_unset() {
        let config = CollaboratorsConfig::from_env();
        assert!(!config.graph_store.uri.is_empty());
        assert!(!config.vector_store.base_url.is_empty());
        assert_eq!(config.vector_store.timeout_secs, 30);
    }
}
