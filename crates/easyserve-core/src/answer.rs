//! Grounded answer generation over retrieved chunks.

use std::sync::Arc;

use tracing::debug;

use crate::completion::{CompletionModel, CompletionRequest, GenerationBudget};
use crate::error::Result;
use crate::models::ScoredChunk;

/// Returned verbatim when retrieval found nothing; no model call is made.
pub const NOT_FOUND_ANSWER: &str =
    "I could not find any relevant information in the knowledge base.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the provided context to answer \
the user's question accurately. Answer only from the context; if it does not contain the \
answer, say so.";

pub struct AnswerGenerator {
    model: Arc<dyn CompletionModel>,
    budget: GenerationBudget,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn CompletionModel>, budget: GenerationBudget) -> Self {
        Self { model, budget }
    }

    pub async fn answer(&self, query: &str, chunks: &[ScoredChunk]) -> Result<String> {
        if chunks.is_empty() {
            return Ok(NOT_FOUND_ANSWER.to_string());
        }
        let request = CompletionRequest::new(SYSTEM_PROMPT, build_prompt(query, chunks), self.budget);
        debug!(model = self.model.model_name(), chunks = chunks.len(), "generating answer");
        self.model.complete(&request).await
    }
}

/// Context block in retrieval order followed by the question.
pub fn build_prompt(query: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| format!("- {}", c.chunk_text))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}",
        context, query
    )
}
