//! Deterministic fakes for the `Embedder` and `Llm` collaborators (distilled
//! §6.4 test tooling) — hand-written `async_trait` impls backed by
//! `Mutex`/`HashMap` state, the same substitution the teacher makes
//! implicitly by keeping its collaborator clients behind a trait boundary.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedder::Embedder;
use crate::errors::{LlmError, LlmResult};
use crate::llm::Llm;

/// Embeds text by hashing characters into a small fixed-size vector —
/// deterministic and collision-resistant enough for cosine-similarity
/// fixtures in tests, with no network dependency.
pub struct FakeEmbedder {
    dimension: usize,
    pub fail_next: Mutex<bool>,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, fail_next: Mutex::new(false) }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            v[i % self.dimension] += byte as f32;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(LlmError::Embedding("forced failure".to_string()));
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.vector_for(t)).map(Ok).collect()
    }

    fn dimension(&self) -> Option<u32> {
        Some(self.dimension as u32)
    }
}

/// Returns scripted completions in call order, falling back to echoing the
/// prompt's last line if the script runs out — enough determinism for
/// scenario tests without hardcoding every call site's expectations.
pub struct FakeLlm {
    script: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn new(script: Vec<String>) -> Self {
        Self { script: Mutex::new(script), calls: AtomicUsize::new(0) }
    }

    fn next_or_echo(&self, prompt: &str) -> String {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut script = self.script.lock();
        if script.is_empty() {
            prompt.lines().last().unwrap_or_default().to_string()
        } else {
            script.remove(0)
        }
    }

    /// Number of completions served so far, for tests asserting a retry loop
    /// actually polled the LLM more than once.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Llm for FakeLlm {
    async fn complete(&self, prompt: &str, _system: Option<&str>, _temperature: f32) -> LlmResult<String> {
        Ok(self.next_or_echo(prompt))
    }

    async fn complete_json(&self, prompt: &str, _schema: &Value) -> LlmResult<Value> {
        let text = self.next_or_echo(prompt);
        serde_json::from_str(&text).map_err(|e| LlmError::SchemaMismatch(e.to_string()))
    }
}
