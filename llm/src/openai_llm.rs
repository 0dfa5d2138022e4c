//! OpenAI-backed [`Llm`], grounded on the same `async_openai::Client`
//! construction pattern as [`crate::openai_embedder::OpenAiEmbedder`], used
//! for chat completion rather than embeddings. The teacher's retrieved
//! sample never exercises chat completion directly (its LLM usage is
//! embedding-only), so this adapter generalizes that client-construction
//! idiom to `async_openai::Client::chat()` — the sibling endpoint on the
//! same client type.

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client as OpenAiClient,
};
use async_trait::async_trait;
use raqe_config::LlmConfig;
use raqe_resilience::{execute_with_retry, CircuitBreakerManager, RetryPolicy};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::errors::{LlmError, LlmResult};
use crate::llm::Llm;

const OPERATION: &str = "llm";

pub struct OpenAiLlm {
    client: OpenAiClient<OpenAIConfig>,
    model: String,
    max_tokens: Option<u32>,
    breaker: Arc<CircuitBreakerManager>,
    retry: RetryPolicy,
}

impl OpenAiLlm {
    pub fn new(config: &LlmConfig, breaker: Arc<CircuitBreakerManager>) -> Self {
        let openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        Self {
            client: OpenAiClient::with_config(openai_config),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            breaker,
            retry: RetryPolicy::for_network(),
        }
    }

    async fn call(&self, prompt: &str, system: Option<&str>, temperature: f32) -> LlmResult<String> {
        if !self.breaker.is_call_allowed(OPERATION) {
            return Err(LlmError::CircuitOpen(OPERATION));
        }

        let result = execute_with_retry(
            OPERATION,
            &self.retry,
            |e: &LlmError| !matches!(e, LlmError::CircuitOpen(_)),
            || self.call_once(prompt, system, temperature),
        )
        .await;

        match &result {
            Ok(_) => self.breaker.record_success(OPERATION),
            Err(_) => self.breaker.record_failure(OPERATION),
        }
        result
    }

    async fn call_once(&self, prompt: &str, system: Option<&str>, temperature: f32) -> LlmResult<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| LlmError::Completion(e.to_string()))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| LlmError::Completion(e.to_string()))?
                .into(),
        );

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages).temperature(temperature);
        if let Some(max_tokens) = self.max_tokens {
            builder.max_tokens(max_tokens);
        }
        let request = builder.build().map_err(|e| LlmError::Completion(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Completion(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Completion("no choices returned".to_string()))
    }
}

#[async_trait]
impl Llm for OpenAiLlm {
    #[instrument(skip(self, prompt, system))]
    async fn complete(&self, prompt: &str, system: Option<&str>, temperature: f32) -> LlmResult<String> {
        self.call(prompt, system, temperature).await
    }

    #[instrument(skip(self, prompt, schema))]
    async fn complete_json(&self, prompt: &str, schema: &Value) -> LlmResult<Value> {
        let system = format!(
            "Respond with a single JSON object matching this schema, no commentary, \
             no code fences:\n{schema}"
        );
        let text = self.call(prompt, Some(&system), 0.0).await?;
        let cleaned = strip_code_fences(&text);
        serde_json::from_str(&cleaned).map_err(|e| LlmError::SchemaMismatch(e.to_string()))
    }
}

/// Strips a leading/trailing ```json fence if the model wrapped its answer
/// in one despite being asked not to.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.trim_end_matches("```").trim().to_string()
    } else {
        trimmed.to_string()
    }
}
