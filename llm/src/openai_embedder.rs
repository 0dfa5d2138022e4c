//! OpenAI-backed [`Embedder`], grounded on the teacher's
//! `embedding::services::llm::openai::Client` — same `async_openai::Client`
//! construction, same `phf`-backed default-dimension lookup table — adapted
//! from the teacher's single-text `embed_text` method to the trait's
//! batch-capable shape (`CreateEmbeddingRequest::input` already accepts
//! `EmbeddingInput::StringArray`, the teacher just never used that branch).

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAiClient,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use raqe_config::EmbedderConfig;
use raqe_resilience::{execute_with_retry, CircuitBreakerManager, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::embedder::Embedder;
use crate::errors::{LlmError, LlmResult};

const OPERATION: &str = "embedder";

static DEFAULT_DIMENSIONS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("text-embedding-3-small", 1536),
        ("text-embedding-3-large", 3072),
        ("text-embedding-ada-002", 1536),
    ])
});

pub struct OpenAiEmbedder {
    client: OpenAiClient<OpenAIConfig>,
    model: String,
    dimension: Option<u32>,
    breaker: Arc<CircuitBreakerManager>,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbedderConfig, breaker: Arc<CircuitBreakerManager>) -> Self {
        let openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        let dimension = config
            .dimension
            .or_else(|| DEFAULT_DIMENSIONS.get(config.model.as_str()).copied());

        Self {
            client: OpenAiClient::with_config(openai_config),
            model: config.model.clone(),
            dimension,
            breaker,
            retry: RetryPolicy::for_network(),
        }
    }

    async fn embed_input(&self, input: EmbeddingInput) -> LlmResult<Vec<Vec<f32>>> {
        if !self.breaker.is_call_allowed(OPERATION) {
            return Err(LlmError::CircuitOpen(OPERATION));
        }

        let model = self.model.clone();
        let result = execute_with_retry(
            OPERATION,
            &self.retry,
            |e: &LlmError| !matches!(e, LlmError::CircuitOpen(_)),
            || async {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(&model)
                    .input(input.clone())
                    .build()
                    .map_err(|e| LlmError::Embedding(e.to_string()))?;

                let response = self
                    .client
                    .embeddings()
                    .create(request)
                    .await
                    .map_err(|e| LlmError::Embedding(e.to_string()))?;

                Ok(response.data.into_iter().map(|d| d.embedding).collect())
            },
        )
        .await;

        match &result {
            Ok(_) => self.breaker.record_success(OPERATION),
            Err(_) => self.breaker.record_failure(OPERATION),
        }
        result
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        if text.is_empty() {
            return Err(LlmError::Embedding("text cannot be empty".to_string()));
        }
        let mut vectors = self.embed_input(EmbeddingInput::String(text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::Embedding("no embedding returned".to_string()))
    }

    #[instrument(skip(self, texts))]
    async fn embed_batch(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_input(EmbeddingInput::StringArray(texts.to_vec())).await
    }

    fn dimension(&self) -> Option<u32> {
        self.dimension
    }
}
