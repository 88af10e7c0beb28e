//! Rendering retrieval matches into a prompt context block.

use crate::document::RetrievalMatch;

/// Separator placed between rendered matches by default.
pub const DEFAULT_DELIMITER: &str = "\n--------------------\n";

/// Formats ranked matches as labeled blocks.
///
/// Each block reads `Chunk {rank} (score: {score}):` followed by a blank line
/// and the chunk text. There is no truncation; `top_k` and the chunk length
/// bound the output.
///
/// # Example
///
/// ```rust
/// use ragkit::ContextAssembler;
///
/// assert_eq!(ContextAssembler::default().assemble(&[]), "");
/// ```
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    delimiter: String,
    precision: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { delimiter: DEFAULT_DELIMITER.to_string(), precision: 3 }
    }
}

impl ContextAssembler {
    /// Use a different separator between blocks.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Number of decimals scores are printed with.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Render `matches` in rank order. Empty input renders as `""`.
    pub fn assemble(&self, matches: &[RetrievalMatch]) -> String {
        let mut ordered: Vec<&RetrievalMatch> = matches.iter().collect();
        ordered.sort_by_key(|m| m.rank);
        ordered
            .iter()
            .map(|m| {
                format!(
                    "Chunk {} (score: {:.*}):\n\n{}",
                    m.rank, self.precision, m.score, m.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join(&self.delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunk, Metadata};

    fn m(rank: usize, score: f32, text: &str) -> RetrievalMatch {
        RetrievalMatch {
            chunk: Chunk {
                id: format!("c{rank}"),
                document_id: "d".into(),
                index: rank - 1,
                text: text.into(),
                embedding: vec![],
                metadata: Metadata::new(),
            },
            score,
            rank,
        }
    }

    #[test]
    fn renders_blocks_in_rank_order() {
        let out =
            ContextAssembler::default().assemble(&[m(2, 0.5, "second"), m(1, 0.91234, "first")]);
        assert_eq!(
            out,
            "Chunk 1 (score: 0.912):\n\nfirst\n--------------------\n\
             Chunk 2 (score: 0.500):\n\nsecond"
        );
    }

    #[test]
    fn precision_and_delimiter_are_configurable() {
        let out = ContextAssembler::default()
            .with_precision(1)
            .with_delimiter("\n\n")
            .assemble(&[m(1, 0.21, "a"), m(2, 0.78, "b")]);
        assert_eq!(out, "Chunk 1 (score: 0.2):\n\na\n\nChunk 2 (score: 0.8):\n\nb");
    }
}
