//! The embedder and LLM collaborators (distilled spec §6): text-to-vector
//! and text-completion, always reached through the [`Embedder`] and [`Llm`]
//! traits.

pub mod embedder;
pub mod errors;
pub mod fake;
pub mod llm;
pub mod openai_embedder;
pub mod openai_llm;

pub use embedder::Embedder;
pub use errors::{LlmError, LlmResult};
pub use fake::{FakeEmbedder, FakeLlm};
pub use llm::{Llm, StreamingLlm};
pub use openai_embedder::OpenAiEmbedder;
pub use openai_llm::OpenAiLlm;
