//! Answer synthesis: retrieved passages + question → grounded answer.
//!
//! The language model is a black box behind [`Generator`]. This module owns
//! the prompt layout and the "nothing relevant" short-circuit; [`Assistant`]
//! wires retrieval and synthesis into one `ask` call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{AskError, GenerateError};
use crate::models::Source;
use crate::retrieval::Retriever;

/// Answer returned when retrieval finds nothing. The model is not called.
pub const NO_RELEVANT_INFO: &str =
    "I couldn't find any relevant information in your documents to answer this question.";

/// A text-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider identifier (e.g. `"gemini"`).
    fn name(&self) -> &str;
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Lay out the retrieved excerpts and the question as a single prompt.
pub fn build_prompt(question: &str, sources: &[Source]) -> String {
    let context = sources
        .iter()
        .map(|s| format!("From {}:\n{}", s.document, s.chunk_text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following document excerpts, answer the user's question. \
If the answer is not in the documents, say so clearly.\n\n\
Document Excerpts:\n{}\n\n\
Question: {}\n\n\
Answer:",
        context, question
    )
}

#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub async fn synthesize(&self, question: &str, sources: &[Source]) -> Result<String, GenerateError> {
        if sources.is_empty() {
            return Ok(NO_RELEVANT_INFO.to_string());
        }
        let prompt = build_prompt(question, sources);
        debug!(prompt_chars = prompt.len(), model = self.generator.model_name(), "generating answer");
        self.generator.generate(&prompt).await
    }
}

/// Response of a full question-answering round.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub question: String,
}

/// Retrieval followed by synthesis.
#[derive(Clone)]
pub struct Assistant {
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl Assistant {
    pub fn new(retriever: Retriever, synthesizer: AnswerSynthesizer, top_k: usize) -> Self {
        Self {
            retriever,
            synthesizer,
            top_k,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        if question.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        let sources = self.retriever.retrieve(question, self.top_k).await?;
        let answer = self.synthesizer.synthesize(question, &sources).await?;
        Ok(Answer {
            answer,
            sources,
            question: question.to_string(),
        })
    }
}
