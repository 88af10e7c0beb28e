//! Property tests for in-memory vector store search ordering.

use std::collections::HashMap;

use proptest::prelude::*;
use ragkit::document::{Chunk, Metadata};
use ragkit::inmemory::InMemoryVectorStore;
use ragkit::vectorstore::{DistanceMetric, VectorStore};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| Chunk {
            id,
            document_id: "doc_1".to_string(),
            index: 0,
            text,
            embedding,
            metadata: Metadata::new(),
        },
    )
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![
        Just(DistanceMetric::Cosine),
        Just(DistanceMetric::Euclidean),
        Just(DistanceMetric::DotProduct),
    ]
}

/// *For any* set of chunks stored in an InMemoryVectorStore and any metric,
/// search returns at most `top_k` results, best first: scores non-increasing
/// for similarity metrics and non-decreasing for Euclidean distance.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_by_metric_and_bounded_by_top_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            metric in arb_metric(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::with_metric(metric);
                store.ensure_schema(DIM, metric).await.unwrap();

                // Deduplicate chunks by id to avoid upsert overwriting
                let mut deduped: HashMap<String, Chunk> = HashMap::new();
                for chunk in &chunks {
                    deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
                }
                let unique_chunks: Vec<Chunk> = deduped.into_values().collect();
                let count = unique_chunks.len();

                store.upsert(&unique_chunks).await.unwrap();
                let results = store.search(&query, top_k).await.unwrap();
                (results, count)
            });

            let (results, unique_count) = results;

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                if metric.higher_is_better() {
                    prop_assert!(
                        window[0].score >= window[1].score,
                        "results not in descending order: {} < {}",
                        window[0].score,
                        window[1].score,
                    );
                } else {
                    prop_assert!(
                        window[0].score <= window[1].score,
                        "results not in ascending order: {} > {}",
                        window[0].score,
                        window[1].score,
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn upsert_overwrites_by_id_and_clear_keeps_schema() {
    let store = InMemoryVectorStore::new();
    store.ensure_schema(2, DistanceMetric::Cosine).await.unwrap();

    let mut chunk = Chunk {
        id: "c1".to_string(),
        document_id: "doc".to_string(),
        index: 0,
        text: "old".to_string(),
        embedding: vec![1.0, 0.0],
        metadata: Metadata::new(),
    };
    store.upsert(std::slice::from_ref(&chunk)).await.unwrap();
    chunk.text = "new".to_string();
    store.upsert(std::slice::from_ref(&chunk)).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
    let hits = store.search(&[1.0, 0.0], 5).await.unwrap();
    assert_eq!(hits[0].chunk.text, "new");

    store.clear().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    assert!(store.ensure_schema(3, DistanceMetric::Cosine).await.is_err());
}

#[tokio::test]
async fn schema_mismatches_are_reported() {
    let store = InMemoryVectorStore::new();
    store.ensure_schema(4, DistanceMetric::Cosine).await.unwrap();
    store.ensure_schema(4, DistanceMetric::Cosine).await.unwrap();

    let err = store.ensure_schema(8, DistanceMetric::Cosine).await.unwrap_err();
    assert!(matches!(err, ragkit::RagError::SchemaMismatch { .. }));
    let err = store.ensure_schema(4, DistanceMetric::Euclidean).await.unwrap_err();
    assert!(matches!(err, ragkit::RagError::SchemaMismatch { .. }));
}
