use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ndarray::Array2;
use serde_json::json;
use sieve_cluster::{Clusterer, Partition, PartitionError, Partitioner};
use sieve_core::config::{ClusterConfig, EngineConfig};
use sieve_core::traits::{DocumentStore, EmbeddingProvider};
use sieve_core::types::{ClusteringStatus, Document, DocumentFilter, DocumentId, DocumentUpdate, NewDocument, RecommendationKind};
use sieve_core::Error;
use sieve_embed::HashEmbedder;
use sieve_hybrid::{HybridSearchEngine, KeywordScorer, SearchRequest};
use sieve_store::MemoryStore;

fn document(id: &str, content: &str) -> Document {
    let now = Utc::now();
    Document { id: id.into(), title: Some(format!("Doc {id}")), content: content.into(), metadata: Default::default(), source: None, document_type: "text".into(), created_at: now, updated_at: now }
}

/// Returns a fixed candidate list from `nearest` and counts the calls.
#[derive(Default)]
struct ScriptedStore {
    candidates: Vec<(Document, f32)>,
    nearest_calls: AtomicUsize,
    last_top_k: AtomicUsize,
    fail: bool,
}

impl ScriptedStore {
    fn with(candidates: Vec<(Document, f32)>) -> Self { Self { candidates, ..Self::default() } }

    fn failing() -> Self { Self { fail: true, ..Self::default() } }

    fn check(&self) -> anyhow::Result<()> {
        if self.fail { anyhow::bail!("store unreachable"); }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn add(&self, _doc: NewDocument, _embedding: Vec<f32>) -> anyhow::Result<DocumentId> {
        self.check()?;
        Ok("scripted".into())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Document>> {
        self.check()?;
        Ok(self.candidates.iter().find(|(d, _)| d.id == id).map(|(d, _)| d.clone()))
    }

    async fn update(&self, _id: &str, _update: DocumentUpdate) -> anyhow::Result<bool> { Ok(false) }

    async fn delete(&self, _id: &str) -> anyhow::Result<bool> { Ok(false) }

    async fn list(&self, limit: usize, _offset: usize, _filter: &DocumentFilter) -> anyhow::Result<Vec<Document>> {
        self.check()?;
        Ok(self.candidates.iter().take(limit).map(|(d, _)| d.clone()).collect())
    }

    async fn nearest(&self, _query_vector: &[f32], top_k: usize, _filter: &DocumentFilter) -> anyhow::Result<Vec<(Document, f32)>> {
        self.check()?;
        self.nearest_calls.fetch_add(1, Ordering::SeqCst);
        self.last_top_k.store(top_k, Ordering::SeqCst);
        Ok(self.candidates.iter().take(top_k).cloned().collect())
    }
}

/// Keyword scores fixed per candidate position.
struct FixedScores(Vec<f32>);

impl KeywordScorer for FixedScores {
    fn score(&self, _query: &str, texts: &[&str]) -> Vec<f32> { self.0.iter().copied().take(texts.len()).collect() }
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embedder_id(&self) -> &str { "failing" }
    fn dim(&self) -> usize { 4 }
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> { anyhow::bail!("model offline") }
}

/// Assigns the labels it was built with.
struct FixedLabels(Vec<usize>);

impl Partitioner for FixedLabels {
    fn partition(&self, points: &Array2<f64>, k: usize) -> Result<Partition, PartitionError> {
        let mut centroids = Array2::zeros((k, points.ncols()));
        for (i, &label) in self.0.iter().enumerate() {
            let mut row = centroids.row_mut(label);
            row += &points.row(i);
        }
        Ok(Partition { labels: self.0.clone(), centroids })
    }
}

fn embedder() -> Arc<HashEmbedder> { Arc::new(HashEmbedder::new(64, 100_000)) }

fn scripted_engine(store: Arc<ScriptedStore>) -> HybridSearchEngine {
    HybridSearchEngine::new(EngineConfig::default(), embedder(), store)
}

fn memory_engine() -> (HybridSearchEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_dimension(64));
    (HybridSearchEngine::new(EngineConfig::default(), embedder(), store.clone()), store)
}

fn three_candidates() -> Vec<(Document, f32)> {
    vec![(document("doc1", "first"), 0.85), (document("doc2", "second"), 0.75), (document("doc3", "third"), 0.65)]
}

#[tokio::test]
async fn fused_ranking_filters_by_threshold() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::with(three_candidates()));
    let engine = scripted_engine(store.clone()).with_keyword_scorer(FixedScores(vec![0.9, 0.7, 0.3]));
    let req = SearchRequest::new("anything").with_weights(0.7, 0.3).with_threshold(0.6).with_cache(false);

    let results = engine.hybrid_search(&req).await?;
    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["doc1", "doc2"]);
    assert!((results[0].score - 0.865).abs() < 1e-5);
    assert!((results[1].score - 0.735).abs() < 1e-5);
    assert_eq!(store.last_top_k.load(Ordering::SeqCst), 15, "fetches top_k * 3 candidates");
    Ok(())
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::with(three_candidates()));
    let engine = scripted_engine(store.clone()).with_keyword_scorer(FixedScores(vec![0.9, 0.7, 0.3]));

    let first = engine.hybrid_search(&SearchRequest::new("What is AI?")).await?;
    let second = engine.hybrid_search(&SearchRequest::new("what   is  ai?")).await?;
    assert_eq!(first, second);
    assert_eq!(store.nearest_calls.load(Ordering::SeqCst), 1, "second search never reached the store");
    assert_eq!(engine.get_cache_stats().total_entries, 1);
    assert_eq!(engine.get_cache_stats().max_access_count, 2);

    engine.clear_cache();
    assert_eq!(engine.get_cache_stats().total_entries, 0);
    engine.hybrid_search(&SearchRequest::new("What is AI?")).await?;
    assert_eq!(store.nearest_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn cache_can_be_bypassed() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::with(three_candidates()));
    let engine = scripted_engine(store.clone()).with_keyword_scorer(FixedScores(vec![0.9, 0.7, 0.3]));
    let req = SearchRequest::new("no caching").with_cache(false);
    engine.hybrid_search(&req).await?;
    engine.hybrid_search(&req).await?;
    assert_eq!(store.nearest_calls.load(Ordering::SeqCst), 2);
    assert!(engine.cache().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_results_are_not_cached() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::with(three_candidates()));
    let engine = scripted_engine(store).with_keyword_scorer(FixedScores(vec![0.0, 0.0, 0.0]));
    let results = engine.hybrid_search(&SearchRequest::new("strict").with_threshold(0.99)).await?;
    assert!(results.is_empty());
    assert!(engine.cache().is_empty());
    Ok(())
}

#[tokio::test]
async fn corrupt_cache_payload_is_purged() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::with(three_candidates()));
    let engine = scripted_engine(store.clone()).with_keyword_scorer(FixedScores(vec![0.9, 0.7, 0.3]));
    let query = "corrupted entry";
    let embedding = embedder().embed(query)?;
    engine.cache().put(query, embedding.clone(), json!({"not": "a result list"}));

    let results = engine.hybrid_search(&SearchRequest::new(query)).await?;
    assert_eq!(results.len(), 2);
    assert_eq!(store.nearest_calls.load(Ordering::SeqCst), 1, "corrupt hit counts as a miss");
    let hit = engine.cache().get(query, &embedding).expect("fresh entry written back");
    assert!(hit.payload.is_array());
    Ok(())
}

#[tokio::test]
async fn lexical_degradation_keeps_vector_ranking() -> anyhow::Result<()> {
    let candidates = vec![(document("a", "the of and"), 0.9), (document("b", "is it was"), 0.8)];
    let engine = scripted_engine(Arc::new(ScriptedStore::with(candidates)));
    let req = SearchRequest::new("the and").with_threshold(0.0).with_cache(false);
    let results = engine.hybrid_search(&req).await?;
    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    assert!((results[0].score - 0.63).abs() < 1e-5, "vector similarity alone: {}", results[0].score);
    Ok(())
}

#[tokio::test]
async fn collaborator_failures_propagate() {
    let engine = HybridSearchEngine::new(EngineConfig::default(), Arc::new(FailingEmbedder), Arc::new(ScriptedStore::with(three_candidates())));
    let err = engine.hybrid_search(&SearchRequest::new("q")).await.expect_err("embedding fails");
    assert!(matches!(err, Error::Embedding(ref m) if m.contains("model offline")), "{err}");
    let err = engine.add_document_with_summary(NewDocument::new("content"), true).await.expect_err("embedding fails");
    assert!(matches!(err, Error::Embedding(_)));

    let engine = scripted_engine(Arc::new(ScriptedStore::failing()));
    let err = engine.hybrid_search(&SearchRequest::new("q")).await.expect_err("store fails");
    assert!(matches!(err, Error::Retrieval(ref m) if m.contains("store unreachable")), "{err}");
    let err = engine.cluster_documents_by_topic(&DocumentFilter::default(), 5).await.expect_err("store fails");
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn zero_top_k_still_embeds_the_query() -> anyhow::Result<()> {
    let engine = HybridSearchEngine::new(EngineConfig::default(), Arc::new(FailingEmbedder), Arc::new(ScriptedStore::with(three_candidates())));
    let err = engine.hybrid_search(&SearchRequest::new("q").with_top_k(0)).await.expect_err("embedding fails");
    assert!(matches!(err, Error::Embedding(_)), "{err}");

    let store = Arc::new(ScriptedStore::with(three_candidates()));
    let engine = scripted_engine(store.clone());
    assert!(engine.hybrid_search(&SearchRequest::new("q").with_top_k(0)).await?.is_empty());
    assert_eq!(store.nearest_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn long_documents_get_a_summary() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let long = (1..=15).map(|i| format!("Sentence number {i} talks about topic {i}.")).collect::<Vec<_>>().join(" ");

    let id = engine.add_document_with_summary(NewDocument::new(long.clone()).with_title("Long"), true).await?;
    let doc = engine.get_document(&id).await?.expect("stored");
    assert_eq!(doc.content, long, "content is never replaced");
    assert!(doc.is_summarized());
    assert_eq!(doc.original_length(), Some(long.chars().count()));
    let summary = doc.summary().expect("summary");
    assert!(!summary.is_empty() && summary.len() <= 503);

    let id = engine.add_document_with_summary(NewDocument::new(long.clone()), false).await?;
    assert!(!engine.get_document(&id).await?.expect("stored").is_summarized());

    let id = engine.add_document_with_summary(NewDocument::new("Short note. Nothing more."), true).await?;
    let short = engine.get_document(&id).await?.expect("stored");
    assert!(short.summary().is_none());
    Ok(())
}

#[tokio::test]
async fn search_over_memory_store_honours_filters() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    engine.add_document_with_summary(NewDocument::new("rust borrow checker and lifetimes").with_document_type("article"), false).await?;
    engine.add_document_with_summary(NewDocument::new("rust borrow checker deep dive").with_document_type("talk"), false).await?;
    engine.add_document_with_summary(NewDocument::new("baking sourdough bread at home").with_document_type("article"), false).await?;

    let req = SearchRequest::new("rust borrow checker").with_threshold(0.0).with_top_k(2);
    let results = engine.hybrid_search(&req).await?;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.content.contains("rust")));
    assert!(results[0].score >= results[1].score);

    let articles = req.clone().with_filter(DocumentFilter::new(Some("article".into()), None)).with_cache(false);
    let results = engine.hybrid_search(&articles).await?;
    assert_eq!(results[0].content, "rust borrow checker and lifetimes");
    assert!(results.iter().all(|r| r.content != "rust borrow checker deep dive"));
    Ok(())
}

#[tokio::test]
async fn clustering_too_few_documents_is_a_result() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    engine.add_document_with_summary(NewDocument::new("one lonely document"), false).await?;
    engine.add_document_with_summary(NewDocument::new("and its only friend"), false).await?;
    let topics = engine.cluster_documents_by_topic(&DocumentFilter::default(), 5).await?;
    assert_eq!(topics.result.status, ClusteringStatus::InsufficientDocuments { found: 2, required: 5 });
    assert!(topics.result.message.is_some());
    assert!(topics.clusters.is_empty());
    Ok(())
}

#[tokio::test]
async fn configured_min_cluster_size_is_enforced() -> anyhow::Result<()> {
    let mut config = EngineConfig::default();
    config.cluster.min_cluster_size = 10;
    let engine = HybridSearchEngine::new(config, embedder(), Arc::new(MemoryStore::with_dimension(64)));
    for content in ["solar panels", "battery banks", "charge controllers", "inverter wiring", "grounding rods"] {
        engine.add_document_with_summary(NewDocument::new(content), false).await?;
    }
    let topics = engine.cluster_documents_by_topic(&DocumentFilter::default(), 3).await?;
    assert_eq!(topics.result.status, ClusteringStatus::InsufficientDocuments { found: 5, required: 10 });
    assert!(topics.clusters.is_empty());
    Ok(())
}

#[tokio::test]
async fn topic_clusters_carry_previews() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let long_tail = "x".repeat(300);
    for content in ["machine learning neural networks", "machine learning training data", "neural networks training", "blockchain ledger consensus", "blockchain mining consensus", "ledger mining blocks"] {
        engine.add_document_with_summary(NewDocument::new(format!("{content} {long_tail}")), false).await?;
    }
    let topics = engine.cluster_documents_by_topic(&DocumentFilter::default(), 5).await?;
    assert!(topics.result.is_clustered());
    assert_eq!(topics.clusters.len(), topics.result.n_clusters);
    assert_eq!(topics.clusters.iter().map(|c| c.size).sum::<usize>(), 6);
    for cluster in &topics.clusters {
        assert_eq!(cluster.documents.len(), cluster.size);
        for preview in &cluster.documents {
            assert!(preview.preview.ends_with("..."));
            assert_eq!(preview.preview.chars().count(), 203);
        }
    }
    Ok(())
}

#[tokio::test]
async fn cluster_recommendations_are_ordered_peers() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_dimension(64));
    let clusterer = Clusterer::with_partitioner(ClusterConfig::default(), FixedLabels(vec![0, 0, 0, 1]));
    let engine = HybridSearchEngine::new(EngineConfig::default(), embedder(), store).with_clusterer(clusterer);
    for content in ["rust borrow checker lifetimes ownership", "rust borrow checker ownership rules", "rust garden fungus tomatoes", "sourdough bread baking"] {
        engine.add_document_with_summary(NewDocument::new(content), false).await?;
    }
    let topics = engine.cluster_documents_by_topic(&DocumentFilter::default(), 3).await?;
    assert_eq!(topics.result.clusters[&0], vec!["1", "2", "3"]);

    let recs = engine.get_document_recommendations("1", RecommendationKind::Cluster, 5).await?;
    assert_eq!(recs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["2", "3"]);
    assert!(recs.iter().all(|r| (0.0..=1.0).contains(&r.score)));

    let recs = engine.get_document_recommendations("1", RecommendationKind::Cluster, 1).await?;
    assert_eq!(recs.len(), 1);
    Ok(())
}

#[tokio::test]
async fn similar_recommendations_exclude_the_reference() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    for content in ["rust borrow checker", "rust ownership model", "rust lifetimes explained", "bread baking"] {
        engine.add_document_with_summary(NewDocument::new(content), false).await?;
    }
    let recs = engine.get_document_recommendations("1", RecommendationKind::Similar, 2).await?;
    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|r| r.id != "1"));

    // No clustering has run, so cluster recommendations fall back to similarity.
    let recs = engine.get_document_recommendations("1", RecommendationKind::Cluster, 3).await?;
    assert_eq!(recs.len(), 3);
    assert!(recs.iter().all(|r| r.id != "1"));

    let err = engine.get_document_recommendations("missing", RecommendationKind::Similar, 3).await.expect_err("unknown id");
    assert!(matches!(err, Error::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn deleting_clears_cache_and_cluster_state() -> anyhow::Result<()> {
    let (engine, store) = memory_engine();
    for content in ["alpha beta gamma", "alpha beta delta", "alpha gamma delta", "beta gamma delta", "alpha beta epsilon"] {
        engine.add_document_with_summary(NewDocument::new(content), false).await?;
    }
    engine.hybrid_search(&SearchRequest::new("alpha beta").with_threshold(0.0)).await?;
    engine.cluster_documents_by_topic(&DocumentFilter::default(), 5).await?;
    assert!(!engine.cache().is_empty());
    assert!(engine.clusterer().has_state());

    assert!(engine.delete_document("2").await?);
    assert!(engine.cache().is_empty());
    assert!(!engine.clusterer().has_state());
    assert_eq!(store.len(), 4);
    assert!(!engine.delete_document("2").await?);
    assert!(engine.get_document("2").await?.is_none());
    Ok(())
}
