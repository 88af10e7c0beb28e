//! # Grounded QA Example
//!
//! Ingests a few documents (one of them HTML) into a JSON-file store, then
//! asks questions. Uses the offline `HashEmbeddingProvider` and a small
//! extractive generator so it runs with **zero API keys**.
//!
//! Run: `cargo run -p ragkit --example grounded_qa`
//! Set `RUST_LOG=ragkit=debug` to see the pipeline's tracing output.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ragkit::{
    AnswerGenerator, Document, HashEmbeddingProvider, JsonFileVectorStore, REFUSAL_SENTENCE,
    RagConfig, RagPipeline,
};

// ---------------------------------------------------------------------------
// ExtractiveGenerator: answers with the context line sharing the most words
// ---------------------------------------------------------------------------

struct ExtractiveGenerator;

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(&self, question: &str, context: &str) -> ragkit::Result<String> {
        let wanted = words(question);
        let best = context
            .lines()
            .filter(|line| !line.starts_with("Chunk ") && !line.trim().is_empty())
            .map(|line| (words(line).intersection(&wanted).count(), line))
            .max_by_key(|(overlap, _)| *overlap);
        Ok(match best {
            Some((overlap, line)) if overlap > 0 => line.trim().to_string(),
            _ => REFUSAL_SENTENCE.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ragkit::telemetry::init_tracing("ragkit=info");

    // -- 1. Configure the pipeline ----------------------------------------
    let store_path = std::env::temp_dir().join("ragkit-demo").join("vector_store.json");
    let store = Arc::new(JsonFileVectorStore::new(&store_path));

    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().max_chunk_length(200).top_k(3).build()?)
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(512)?))
        .vector_store(store)
        .generator(Arc::new(ExtractiveGenerator))
        .build()?;

    pipeline.ensure_schema().await?;
    pipeline.clear().await?;

    // -- 2. Ingest documents ----------------------------------------------
    let documents = vec![
        Document::new("animals", "Cats are mammals. Dogs are mammals too. Parrots are birds."),
        Document::new(
            "handbook",
            "<html><body><h1>Leave policy</h1><p>Employees receive twenty vacation days \
             per year.</p><script>analytics()</script><p>Unused days expire in March.</p>\
             </body></html>",
        )
        .with_metadata("department", "hr"),
    ];
    for report in pipeline.ingest_batch(&documents).await? {
        println!("ingested {} chunk(s)", report.chunk_count);
    }
    println!("store: {}\n", store_path.display());

    // -- 3. Ask questions -------------------------------------------------
    for question in [
        "Are dogs mammals?",
        "How many vacation days do employees receive?",
        "What is the capital of Peru?",
    ] {
        let answer = pipeline.ask(question).await?;
        println!("Q: {question}");
        println!("A: {}", answer.answer);
        for m in &answer.matches {
            println!("   #{} ({:.3}) [{}] {}", m.rank, m.score, m.chunk.document_id, m.chunk.text);
        }
        println!();
    }

    Ok(())
}
