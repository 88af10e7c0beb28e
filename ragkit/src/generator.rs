//! Answer generation and the grounding contract.
//!
//! [`REFUSAL_SENTENCE`] is the one place the refusal wording lives. The
//! pipeline returns it verbatim when nothing was retrieved, and
//! [`PromptTemplate`] instructs the model to emit it verbatim when the
//! retrieved context does not answer the question. Consumers may match on it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The fixed answer given when the context cannot answer the question.
pub const REFUSAL_SENTENCE: &str = "No matching information found.";

/// Produces an answer to a question from a context block.
///
/// Implementations should build their messages with [`PromptTemplate`] so the
/// grounding instruction and refusal wording stay uniform across backends.
/// Failures must be returned as errors, never as the refusal sentence.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `question` strictly from `context`.
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// System and user messages for a grounded generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Who the assistant is, placed before the grounding rules.
    pub persona: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { persona: "You are a helpful assistant.".to_string() }
    }
}

impl PromptTemplate {
    /// Use a custom persona line (e.g. a product-specific assistant).
    pub fn with_persona(persona: impl Into<String>) -> Self {
        Self { persona: persona.into() }
    }

    /// The system message.
    pub fn system_message(&self) -> String {
        format!(
            "{} Answer only using the provided context. If the context does not contain \
             the answer, say exactly: \"{REFUSAL_SENTENCE}\"",
            self.persona
        )
    }

    /// The user message carrying the context and the question.
    pub fn user_message(&self, question: &str, context: &str) -> String {
        format!(
            "Use ONLY the following context to answer the user's question.\n\
             If the context does not contain the answer, reply exactly:\n\
             \"{REFUSAL_SENTENCE}\"\n\n\
             CONTEXT:\n{context}\n\n\
             QUESTION:\n{question}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_messages_carry_the_refusal_sentence() {
        let t = PromptTemplate::default();
        assert!(t.system_message().contains(REFUSAL_SENTENCE));
        let user =
            t.user_message("Are dogs mammals?", "Chunk 1 (score: 0.900):\n\nDogs are mammals.");
        assert!(user.contains(REFUSAL_SENTENCE));
        assert!(user.ends_with("QUESTION:\nAre dogs mammals?"));
        assert!(user.contains("CONTEXT:\nChunk 1"));
    }
}
