//! Deterministic providers for unit tests

use crate::complete::Completer;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Embeds a text as one dimension per keyword, 1.0 where the keyword occurs
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| if lowered.contains(k.as_str()) { 1.0 } else { 0.0 })
            .collect()
    }

    /// Number of `embed` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.keywords.len()
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Succeeds for a fixed number of calls, then fails every call
pub struct FailingEmbedder {
    succeed_for: usize,
    dimension: usize,
    calls: AtomicUsize,
}

impl FailingEmbedder {
    pub fn after_calls(succeed_for: usize, dimension: usize) -> Self {
        Self {
            succeed_for,
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(dimension: usize) -> Self {
        Self::after_calls(0, dimension)
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.succeed_for {
            return Err(Error::EmbeddingProvider("simulated timeout".to_string()));
        }
        Ok(texts.iter().map(|_| vec![1.0; self.dimension]).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}

/// Returns a fixed answer and keeps every prompt it was given
pub struct RecordingCompleter {
    answer: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingCompleter {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for RecordingCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
            .clone()
            .ok_or_else(|| Error::CompletionProvider("simulated outage".to_string()))
    }

    fn model_name(&self) -> &str {
        "recording-test"
    }
}
