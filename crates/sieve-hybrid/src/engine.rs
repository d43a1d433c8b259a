use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sieve_cluster::Clusterer;
use sieve_core::config::{EngineConfig, SearchConfig};
use sieve_core::traits::{DocumentStore, EmbeddingProvider};
use sieve_core::types::{
    ClusteringResult, Document, DocumentFilter, DocumentId, DocumentPreview, NewDocument, RecommendationKind, SearchResult, TopicCluster, TopicClusters,
    ORIGINAL_LENGTH_KEY, SUMMARIZED_KEY, SUMMARY_KEY,
};
use sieve_core::vector::clamp_unit;
use sieve_core::{Error, Result};
use sieve_text::sentences::truncate_chars;
use sieve_text::Summarizer;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, SemanticCache};
use crate::fusion::{fuse, Candidate, FusionWeights};
use crate::lexical::{KeywordScorer, TfidfKeywordScorer};

const PREVIEW_CHARS: usize = 200;

/// Parameters of one hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub similarity_threshold: f32,
    pub filter: DocumentFilter,
    pub use_cache: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self { Self::from_config(query, &SearchConfig::default()) }

    pub fn from_config(query: impl Into<String>, cfg: &SearchConfig) -> Self {
        Self {
            query: query.into(),
            top_k: cfg.top_k,
            vector_weight: cfg.vector_weight,
            keyword_weight: cfg.keyword_weight,
            similarity_threshold: cfg.similarity_threshold,
            filter: DocumentFilter::default(),
            use_cache: cfg.use_cache,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = top_k; self }

    pub fn with_weights(mut self, vector_weight: f32, keyword_weight: f32) -> Self {
        self.vector_weight = vector_weight;
        self.keyword_weight = keyword_weight;
        self
    }

    pub fn with_threshold(mut self, similarity_threshold: f32) -> Self { self.similarity_threshold = similarity_threshold; self }

    pub fn with_filter(mut self, filter: DocumentFilter) -> Self { self.filter = filter; self }

    pub fn with_cache(mut self, use_cache: bool) -> Self { self.use_cache = use_cache; self }
}

/// Ingestion, hybrid (vector + keyword) search, topic clustering and
/// recommendations over a [`DocumentStore`].
///
/// The engine owns its summarizer, clusterer and cache; the embedder and the
/// store are shared collaborators.
pub struct HybridSearchEngine {
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
    summarizer: Summarizer,
    clusterer: Arc<Clusterer>,
    cache: SemanticCache,
    keyword_scorer: Box<dyn KeywordScorer>,
}

impl HybridSearchEngine {
    pub fn new(config: EngineConfig, embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            summarizer: Summarizer::new(config.summarizer.clone()),
            clusterer: Arc::new(Clusterer::new(config.cluster.clone())),
            cache: SemanticCache::new(config.cache.clone()),
            keyword_scorer: Box::new(TfidfKeywordScorer),
            config,
            embedder,
            store,
        }
    }

    pub fn with_clusterer(mut self, clusterer: Clusterer) -> Self { self.clusterer = Arc::new(clusterer); self }

    pub fn with_cache(mut self, cache: SemanticCache) -> Self { self.cache = cache; self }

    pub fn with_keyword_scorer(mut self, scorer: impl KeywordScorer + 'static) -> Self { self.keyword_scorer = Box::new(scorer); self }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn cache(&self) -> &SemanticCache { &self.cache }

    pub fn clusterer(&self) -> &Clusterer { &self.clusterer }

    /// A request carrying this engine's configured search defaults.
    pub fn search_request(&self, query: impl Into<String>) -> SearchRequest { SearchRequest::from_config(query, &self.config.search) }

    fn embed(&self, text: &str) -> Result<Vec<f32>> { self.embedder.embed(text).map_err(Error::embedding) }

    /// Store a document, attaching an extractive summary to its metadata when
    /// `auto_summarize` is set and the content is long. Content is never replaced.
    pub async fn add_document_with_summary(&self, mut doc: NewDocument, auto_summarize: bool) -> Result<DocumentId> {
        if auto_summarize {
            if let Some(summary) = self.summarizer.summarize(&doc.content) {
                let original_length = doc.content.chars().count();
                debug!(original_length, summary_length = summary.chars().count(), "attached summary");
                doc.metadata.insert(SUMMARIZED_KEY.into(), Value::Bool(true));
                doc.metadata.insert(SUMMARY_KEY.into(), Value::String(summary));
                doc.metadata.insert(ORIGINAL_LENGTH_KEY.into(), Value::from(original_length));
            }
        }
        let embedding = self.embed(&doc.content)?;
        let id = self.store.add(doc, embedding).await.map_err(Error::retrieval)?;
        info!(id = %id, "document stored");
        Ok(id)
    }

    /// Vector candidates re-ranked with keyword similarity. Served from the
    /// semantic cache when a close enough query was answered before.
    pub async fn hybrid_search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>> {
        let embedding = self.embed(&req.query)?;
        if req.top_k == 0 { return Ok(Vec::new()); }

        if req.use_cache {
            if let Some(hit) = self.cache.get(&req.query, &embedding) {
                match serde_json::from_value::<Vec<SearchResult>>(hit.payload) {
                    Ok(results) => {
                        debug!(exact = hit.exact, similarity = hit.similarity, results = results.len(), "served from cache");
                        return Ok(results);
                    }
                    Err(e) => {
                        warn!(error = %e, "corrupt cache payload, purging entry");
                        self.cache.remove(&hit.key);
                    }
                }
            }
        }

        let fetch = req.top_k.saturating_mul(self.config.search.candidate_multiplier.max(1));
        let hits = self.store.nearest(&embedding, fetch, &req.filter).await.map_err(Error::retrieval)?;
        let min_len = self.config.search.summary_min_content_length;
        let keyword = {
            let texts: Vec<&str> = hits.iter().map(|(doc, _)| doc.comparison_text(min_len)).collect();
            self.keyword_scorer.score(&req.query, &texts)
        };
        let candidates: Vec<Candidate> = hits
            .into_iter()
            .enumerate()
            .map(|(i, (document, vector_score))| Candidate { document, vector_score, keyword_score: keyword.get(i).copied().unwrap_or(0.0) })
            .collect();
        let fetched = candidates.len();

        let weights = FusionWeights::normalized(req.vector_weight, req.keyword_weight);
        let results = fuse(candidates, weights, req.similarity_threshold, req.top_k);
        debug!(fetched, returned = results.len(), "hybrid search fused");

        if req.use_cache && !results.is_empty() {
            match serde_json::to_value(&results) {
                Ok(payload) => self.cache.put(&req.query, embedding, payload),
                Err(e) => warn!(error = %e, "could not cache search results"),
            }
        }
        Ok(results)
    }

    /// Cluster up to `cluster.document_limit` matching documents and attach
    /// previews. Fewer than `min_documents` matches, or fewer than
    /// `cluster.min_cluster_size`, yields an explanatory result, not an error.
    pub async fn cluster_documents_by_topic(&self, filter: &DocumentFilter, min_documents: usize) -> Result<TopicClusters> {
        let docs = self.store.list(self.config.cluster.document_limit, 0, filter).await.map_err(Error::retrieval)?;
        if docs.len() < min_documents {
            info!(found = docs.len(), required = min_documents, "not enough documents to cluster");
            self.clusterer.clear();
            return Ok(TopicClusters { result: ClusteringResult::insufficient(docs.len(), min_documents), clusters: Vec::new() });
        }
        let clusterer = Arc::clone(&self.clusterer);
        let min_cluster_size = self.config.cluster.min_cluster_size;
        let (result, docs) = tokio::task::spawn_blocking(move || clusterer.cluster(&docs, min_cluster_size).map(|r| (r, docs)))
            .await
            .map_err(|e| Error::Operation(format!("clustering worker failed: {e}")))??;

        let by_id: HashMap<&str, &Document> = docs.iter().map(|d| (d.id.as_str(), d)).collect();
        let clusters = result
            .clusters
            .iter()
            .map(|(&cluster_id, ids)| TopicCluster {
                cluster_id,
                topics: result.topics.get(&cluster_id).cloned().unwrap_or_default(),
                size: ids.len(),
                documents: ids.iter().filter_map(|id| by_id.get(id.as_str())).map(|d| preview(d)).collect(),
            })
            .collect();
        Ok(TopicClusters { result, clusters })
    }

    /// Documents related to `document_id`, never including it.
    ///
    /// `Cluster` uses peers from the last clustering run and falls back to
    /// `Similar` when there are none.
    pub async fn get_document_recommendations(&self, document_id: &str, kind: RecommendationKind, top_k: usize) -> Result<Vec<SearchResult>> {
        let reference = self
            .store
            .get(document_id)
            .await
            .map_err(Error::retrieval)?
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;
        if top_k == 0 { return Ok(Vec::new()); }

        if kind == RecommendationKind::Cluster {
            let mut out = Vec::new();
            for (id, score) in self.clusterer.similar_documents_scored(document_id) {
                if out.len() >= top_k { break; }
                if let Some(doc) = self.store.get(&id).await.map_err(Error::retrieval)? {
                    out.push(SearchResult::from_document(doc, clamp_unit(score)));
                }
            }
            if !out.is_empty() { return Ok(out); }
            debug!(document_id, "no cluster peers, falling back to similarity");
        }

        let embedding = self.embed(reference.comparison_text(self.config.search.summary_min_content_length))?;
        let hits = self.store.nearest(&embedding, top_k + 1, &DocumentFilter::default()).await.map_err(Error::retrieval)?;
        Ok(hits
            .into_iter()
            .filter(|(doc, _)| doc.id != document_id)
            .take(top_k)
            .map(|(doc, score)| SearchResult::from_document(doc, clamp_unit(score)))
            .collect())
    }

    pub fn get_cache_stats(&self) -> CacheStats { self.cache.stats() }

    pub fn clear_cache(&self) { self.cache.clear(); }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> { self.store.get(id).await.map_err(Error::retrieval) }

    /// Remove a document. Cached results and cluster state may mention it, so both are dropped.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete(id).await.map_err(Error::retrieval)?;
        if removed {
            self.cache.clear();
            self.clusterer.clear();
            info!(id, "document deleted");
        }
        Ok(removed)
    }
}

fn preview(doc: &Document) -> DocumentPreview {
    let preview = if doc.content.chars().count() > PREVIEW_CHARS {
        format!("{}...", truncate_chars(&doc.content, PREVIEW_CHARS))
    } else {
        doc.content.clone()
    };
    DocumentPreview { id: doc.id.clone(), title: doc.title.clone(), preview }
}
