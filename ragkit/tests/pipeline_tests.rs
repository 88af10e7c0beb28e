//! End-to-end tests for the ingest and ask workflows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ragkit::document::{Chunk, ScoredChunk};
use ragkit::{
    AnswerGenerator, ChunkingStrategy, DistanceMetric, Document, EmbedDirection, EmbeddingProvider,
    HashEmbeddingProvider, InMemoryVectorStore, REFUSAL_SENTENCE, RagConfig, RagError, RagPipeline,
    Result, TextFormat, VectorStore,
};

const DIM: usize = 256;

/// Wraps the hashing embedder and counts calls per direction.
struct CountingEmbedder {
    inner: HashEmbeddingProvider,
    documents: AtomicUsize,
    queries: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: HashEmbeddingProvider::new(DIM).unwrap(),
            documents: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    fn total(&self) -> usize {
        self.documents.load(Ordering::SeqCst) + self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        match direction {
            EmbedDirection::Document => self.documents.fetch_add(1, Ordering::SeqCst),
            EmbedDirection::Query => self.queries.fetch_add(1, Ordering::SeqCst),
        };
        self.inner.embed(text, direction).await
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Tracks the peak number of concurrent `embed` calls.
struct SlowEmbedder {
    inner: HashEmbeddingProvider,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.embed(text, direction).await
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str, _direction: EmbedDirection) -> Result<Vec<f32>> {
        Err(RagError::Provider { provider: "test".into(), message: "connection refused".into() })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// In-memory store whose writes or reads can be switched to fail.
#[derive(Default)]
struct FailingStore {
    inner: InMemoryVectorStore,
    fail_upsert: AtomicBool,
    fail_search: AtomicBool,
}

impl FailingStore {
    fn unavailable() -> RagError {
        RagError::StoreUnavailable { backend: "test".into(), message: "connection reset".into() }
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    async fn ensure_schema(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        self.inner.ensure_schema(dimensions, metric).await
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.upsert(chunks).await
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.search(embedding, top_k).await
    }

    fn metric(&self) -> DistanceMetric {
        self.inner.metric()
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Answers with whether it saw any context, and counts calls.
#[derive(Default)]
struct EchoGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, _question: &str, context: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("grounded: {}", !context.is_empty()))
    }
}

struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Err(RagError::Provider { provider: "test".into(), message: "rate limited".into() })
    }
}

fn build(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
    config: RagConfig,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(store)
        .generator(generator)
        .build()
        .unwrap()
}

async fn ready(
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn AnswerGenerator>,
) -> (RagPipeline, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = build(embedder, store.clone(), generator, RagConfig::default());
    pipeline.ensure_schema().await.unwrap();
    (pipeline, store)
}

#[tokio::test]
async fn empty_store_refuses_without_generating() {
    let generator = Arc::new(EchoGenerator::default());
    let (pipeline, _) = ready(Arc::new(CountingEmbedder::new()), generator.clone()).await;

    let answer = pipeline.ask("Are dogs mammals?").await.unwrap();

    assert_eq!(answer.answer, REFUSAL_SENTENCE);
    assert_eq!(answer.answer, "No matching information found.");
    assert!(answer.matches.is_empty());
    assert!(!answer.grounded);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cats_and_dogs_answer_is_grounded() {
    let generator = Arc::new(EchoGenerator::default());
    let (pipeline, _) = ready(Arc::new(CountingEmbedder::new()), generator.clone()).await;

    let report = pipeline
        .ingest(&Document::new("doc1", "Cats are mammals. Dogs are mammals too."))
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.chunk_ids.len(), 1);

    let answer = pipeline.ask("Are dogs mammals?").await.unwrap();

    assert_eq!(answer.matches[0].rank, 1);
    assert_eq!(answer.matches[0].chunk.text, "Cats are mammals. Dogs are mammals too.");
    assert_eq!(answer.matches[0].chunk.document_id, "doc1");
    assert_eq!(answer.answer, "grounded: true");
    assert!(answer.grounded);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn verbatim_substring_is_found() {
    let (pipeline, _) =
        ready(Arc::new(CountingEmbedder::new()), Arc::new(EchoGenerator::default())).await;
    pipeline
        .ingest_batch(&[
            Document::new("pets", "Cats are mammals. Dogs are mammals too. Parrots are birds."),
            Document::new(
                "finance",
                "Quarterly revenue grew in the northern region. Costs stayed flat.",
            ),
        ])
        .await
        .unwrap();

    let needle = "revenue grew in the northern";
    let matches = pipeline.search_with_top_k(needle, 1).await.unwrap();

    assert_eq!(matches.len(), 1);
    assert!(matches[0].chunk.text.contains(needle));
}

#[tokio::test]
async fn directions_follow_the_call_site() {
    let embedder = Arc::new(CountingEmbedder::new());
    let (pipeline, _) = ready(embedder.clone(), Arc::new(EchoGenerator::default())).await;

    pipeline
        .ingest(&Document::new("doc1", "One sentence here. Another one there."))
        .await
        .unwrap();
    assert_eq!(embedder.documents.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.queries.load(Ordering::SeqCst), 0);

    pipeline.search("sentence").await.unwrap();
    assert_eq!(embedder.documents.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_top_k_is_rejected_before_any_call() {
    let embedder = Arc::new(CountingEmbedder::new());
    let generator = Arc::new(EchoGenerator::default());
    let (pipeline, _) = ready(embedder.clone(), generator.clone()).await;

    let err = pipeline.ask_with_top_k("Are dogs mammals?", 0).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));
    let err = pipeline.search_with_top_k("dogs", 0).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));

    assert_eq!(embedder.total(), 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_inputs_are_rejected_before_any_call() {
    let embedder = Arc::new(CountingEmbedder::new());
    let (pipeline, store) = ready(embedder.clone(), Arc::new(EchoGenerator::default())).await;

    let err = pipeline.ask("   ").await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput { .. }));
    let err = pipeline.ingest(&Document::new("doc1", " \n\t ")).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput { .. }));
    let err = pipeline.ingest(&Document::new("", "Some text.")).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput { .. }));
    let err = pipeline
        .ingest(&Document::new("doc2", "<div><script>init()</script></div>"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(embedder.total(), 0);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn generation_failure_is_an_error_not_a_refusal() {
    let (pipeline, _) = ready(Arc::new(CountingEmbedder::new()), Arc::new(FailingGenerator)).await;
    pipeline.ingest(&Document::new("doc1", "Dogs are mammals.")).await.unwrap();

    let err = pipeline.ask("Are dogs mammals?").await.unwrap_err();

    assert!(matches!(err, RagError::Pipeline { .. }));
    assert!(matches!(err.root_cause(), RagError::Provider { .. }));
    assert!(!err.is_validation());
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn embedding_failure_during_ingest_is_wrapped() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = build(
        Arc::new(FailingEmbedder),
        store.clone(),
        Arc::new(EchoGenerator::default()),
        RagConfig::default(),
    );

    let err = pipeline.ingest(&Document::new("doc1", "Dogs are mammals.")).await.unwrap_err();

    match &err {
        RagError::Pipeline { operation, source } => {
            assert_eq!(operation, "ingest 'doc1'");
            assert!(matches!(**source, RagError::Provider { .. }));
        }
        other => panic!("expected a wrapped error, got {other:?}"),
    }
    assert_eq!(store.count().await.unwrap(), 0);
}

async fn failing_store_pipeline(generator: Arc<EchoGenerator>) -> (RagPipeline, Arc<FailingStore>) {
    let store = Arc::new(FailingStore::default());
    let pipeline =
        build(Arc::new(CountingEmbedder::new()), store.clone(), generator, RagConfig::default());
    pipeline.ensure_schema().await.unwrap();
    (pipeline, store)
}

#[tokio::test]
async fn upsert_failure_during_ingest_is_wrapped() {
    let (pipeline, store) = failing_store_pipeline(Arc::new(EchoGenerator::default())).await;
    store.fail_upsert.store(true, Ordering::SeqCst);

    let err = pipeline.ingest(&Document::new("doc2", "Dogs are mammals.")).await.unwrap_err();

    match &err {
        RagError::Pipeline { operation, source } => {
            assert_eq!(operation, "ingest 'doc2'");
            assert!(matches!(**source, RagError::StoreUnavailable { .. }));
        }
        other => panic!("expected a wrapped error, got {other:?}"),
    }
    assert!(!err.is_validation());
}

#[tokio::test]
async fn failed_ingest_keeps_earlier_chunks() {
    let (pipeline, store) = failing_store_pipeline(Arc::new(EchoGenerator::default())).await;
    let doc = Document::new("doc1", "Cats are mammals. Dogs are mammals too.");
    pipeline.ingest(&doc).await.unwrap();
    let before = store.count().await.unwrap();
    assert!(before > 0);

    store.fail_upsert.store(true, Ordering::SeqCst);
    pipeline.ingest(&Document::new("doc2", "Parrots are birds.")).await.unwrap_err();
    store.fail_upsert.store(false, Ordering::SeqCst);

    assert_eq!(store.count().await.unwrap(), before);
    let matches = pipeline.search("Are dogs mammals?").await.unwrap();
    assert!(matches.iter().all(|m| m.chunk.document_id == "doc1"));
}

#[tokio::test]
async fn search_failure_during_ask_is_an_error_not_a_refusal() {
    let generator = Arc::new(EchoGenerator::default());
    let (pipeline, store) = failing_store_pipeline(generator.clone()).await;
    pipeline.ingest(&Document::new("doc1", "Dogs are mammals.")).await.unwrap();
    store.fail_search.store(true, Ordering::SeqCst);

    let err = pipeline.ask("Are dogs mammals?").await.unwrap_err();

    assert!(matches!(err, RagError::Pipeline { .. }));
    assert!(matches!(err.root_cause(), RagError::StoreUnavailable { .. }));
    assert!(!err.to_string().contains(REFUSAL_SENTENCE));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    let err = pipeline.search("Are dogs mammals?").await.unwrap_err();
    assert!(matches!(err.root_cause(), RagError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn reingest_appends_until_cleared() {
    let (pipeline, store) =
        ready(Arc::new(CountingEmbedder::new()), Arc::new(EchoGenerator::default())).await;
    let doc = Document::new("doc1", "Dogs are mammals.");

    let first = pipeline.ingest(&doc).await.unwrap();
    let second = pipeline.ingest(&doc).await.unwrap();

    assert_ne!(first.chunk_ids, second.chunk_ids);
    assert_eq!(store.count().await.unwrap(), 2);

    pipeline.clear().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(pipeline.ask("Are dogs mammals?").await.unwrap().answer, REFUSAL_SENTENCE);
}

#[tokio::test]
async fn markup_is_stripped_and_metadata_copied() {
    let (pipeline, _) =
        ready(Arc::new(CountingEmbedder::new()), Arc::new(EchoGenerator::default())).await;
    let doc = Document::new(
        42,
        "<html><head><title>Pets</title></head><body><h1>Pets</h1>\
         <p>Dogs   are mammals.</p><script>track()</script></body></html>",
    )
    .with_metadata("tenant", "acme");

    pipeline.ingest(&doc).await.unwrap();
    let matches = pipeline.search("dogs").await.unwrap();

    let chunk = &matches[0].chunk;
    assert_eq!(chunk.text, "Pets Dogs are mammals.");
    assert_eq!(chunk.document_id, "42");
    assert_eq!(chunk.index, 0);
    assert_eq!(chunk.metadata.get("tenant").and_then(|v| v.as_str()), Some("acme"));
    assert_eq!(chunk.metadata.get("chunk_index").and_then(|v| v.as_i64()), Some(0));
}

#[tokio::test]
async fn explicit_plain_format_keeps_brackets() {
    let (pipeline, _) =
        ready(Arc::new(CountingEmbedder::new()), Arc::new(EchoGenerator::default())).await;
    let doc = Document::new("code", "<T> is a generic parameter.").with_format(TextFormat::Plain);

    pipeline.ingest(&doc).await.unwrap();
    let matches = pipeline.search("generic parameter").await.unwrap();

    assert_eq!(matches[0].chunk.text, "<T> is a generic parameter.");
}

#[tokio::test]
async fn sliding_window_config_drives_chunking() {
    let store = Arc::new(InMemoryVectorStore::new());
    let config = RagConfig::builder()
        .chunking(ChunkingStrategy::SlidingWindow { size: 20, overlap: 5 })
        .build()
        .unwrap();
    let pipeline = build(
        Arc::new(CountingEmbedder::new()),
        store.clone(),
        Arc::new(EchoGenerator::default()),
        config,
    );
    pipeline.ensure_schema().await.unwrap();

    let report = pipeline.ingest(&Document::new("d", "a".repeat(50))).await.unwrap();

    // Windows start at 0, 15, 30; the third reaches the end.
    assert_eq!(report.chunk_count, 3);
    assert_eq!(store.count().await.unwrap(), 3);

    let err = RagConfig::builder()
        .chunking(ChunkingStrategy::SlidingWindow { size: 10, overlap: 10 })
        .build()
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));
}

#[tokio::test]
async fn embedding_concurrency_is_capped() {
    let embedder = Arc::new(SlowEmbedder {
        inner: HashEmbeddingProvider::new(DIM).unwrap(),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let config = RagConfig::builder().max_chunk_length(10).embed_concurrency(2).build().unwrap();
    let pipeline = build(
        embedder.clone(),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(EchoGenerator::default()),
        config,
    );

    let report = pipeline
        .ingest(&Document::new("d", "First one. Second one. Third one. Fourth one. Fifth one."))
        .await
        .unwrap();

    assert_eq!(report.chunk_count, 5);
    assert_eq!(embedder.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn euclidean_ranks_by_ascending_distance() {
    let store = Arc::new(InMemoryVectorStore::with_metric(DistanceMetric::Euclidean));
    let config = RagConfig::builder().metric(DistanceMetric::Euclidean).build().unwrap();
    let pipeline = build(
        Arc::new(CountingEmbedder::new()),
        store,
        Arc::new(EchoGenerator::default()),
        config,
    );
    pipeline.ensure_schema().await.unwrap();
    pipeline
        .ingest_batch(&[
            Document::new("a", "Dogs are loyal mammals."),
            Document::new("b", "Invoices are due monthly."),
            Document::new("c", "Dogs bark."),
        ])
        .await
        .unwrap();

    let matches = pipeline.search_with_top_k("dogs are loyal", 3).await.unwrap();

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].chunk.document_id, "a");
    for pair in matches.windows(2) {
        assert!(pair[0].score <= pair[1].score);
        assert_eq!(pair[0].rank + 1, pair[1].rank);
    }
}

#[tokio::test]
async fn schema_mismatch_surfaces_through_the_pipeline() {
    let store = Arc::new(InMemoryVectorStore::new());
    store.ensure_schema(8, DistanceMetric::Cosine).await.unwrap();
    let pipeline = build(
        Arc::new(CountingEmbedder::new()),
        store,
        Arc::new(EchoGenerator::default()),
        RagConfig::default(),
    );

    let err = pipeline.ensure_schema().await.unwrap_err();

    assert!(matches!(err.root_cause(), RagError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn builder_requires_capabilities() {
    let err = RagPipeline::builder()
        .embedding_provider(Arc::new(CountingEmbedder::new()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::InvalidArgument(_)));
}

#[tokio::test]
async fn embedding_blank_text_fails_in_both_directions() {
    let provider = HashEmbeddingProvider::new(DIM).unwrap();
    for direction in [EmbedDirection::Document, EmbedDirection::Query] {
        let err = provider.embed("", direction).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyInput { .. }));
    }
}
