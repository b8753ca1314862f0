//! In-memory providers for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LlmProvider};

/// Deterministic embedder: fixed vectors for known texts, letter histograms otherwise
pub struct FakeEmbedder {
    dims: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_containing: Vec<String>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: HashMap::new(),
            fail_containing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail every text containing `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_containing.iter().any(|n| text.contains(n.as_str())) {
            return Err(Error::embedding(format!("fake failure for '{}'", text)));
        }
        if let Some(vector) = self.vectors.get(text) {
            return Ok(vector.clone());
        }

        let mut vector = vec![0.0; self.dims];
        vector[0] = 1.0;
        for c in text.chars().filter(|c| c.is_alphanumeric()) {
            vector[c.to_ascii_lowercase() as u32 as usize % self.dims] += 1.0;
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.vector_for(t)).collect()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// LLM returning a fixed answer and recording every prompt
pub struct FakeLlm {
    answer: String,
    fail_containing: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail_containing: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every prompt containing `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing = Some(needle.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.fail_containing {
            Some(needle) if prompt.contains(needle.as_str()) => {
                Err(Error::generation("fake quota exceeded"))
            }
            _ => Ok(self.answer.clone()),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}
