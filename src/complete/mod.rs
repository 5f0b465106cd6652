//! Answer synthesis through a completion provider

mod http_backend;

pub use http_backend::*;

use crate::config::CompletionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

/// Trait for completion providers
#[async_trait]
pub trait Completer: Send + Sync {
    /// Generate text for a prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Create a completer based on configuration
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    Ok(Arc::new(HttpCompleter::new(config)?))
}

/// Build the synthesis prompt from the question, the passage the reader had
/// selected (if any), and the retrieved passages in rank order.
pub fn build_prompt(question: &str, context_text: Option<&str>, contexts: &[String]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the textbook passages below. \
         If the passages do not contain the answer, say so.\n\n",
    );

    for (i, passage) in contexts.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] {}", i + 1, passage.trim());
    }

    if let Some(selected) = context_text.map(str::trim).filter(|s| !s.is_empty()) {
        let _ = write!(prompt, "\nSelected text:\n{}\n", selected);
    }

    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", question.trim());
    prompt
}
