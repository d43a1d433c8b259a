use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use ndarray::Array2;
use parking_lot::RwLock;
use sieve_core::config::ClusterConfig;
use sieve_core::types::{ClusteringResult, ClusteringStatus, Document, DocumentId};
use sieve_core::{Error, Result};
use sieve_text::tfidf::{SparseVector, TextVectorizer, TfidfMatrix, TfidfOptions, TfidfVectorizer, VectorizeError};
use tracing::{debug, info, warn};

use crate::partition::{KMeansPartitioner, Partitioner};

/// Most recent clustering run, kept to answer peer lookups.
#[derive(Debug, Default)]
struct ClusterState {
    members: BTreeMap<usize, Vec<DocumentId>>,
    assignment: HashMap<DocumentId, usize>,
    rows: HashMap<DocumentId, SparseVector>,
}

impl ClusterState {
    fn new(members: BTreeMap<usize, Vec<DocumentId>>, rows: HashMap<DocumentId, SparseVector>) -> Self {
        let assignment = members.iter().flat_map(|(cid, ids)| ids.iter().map(move |id| (id.clone(), *cid))).collect();
        Self { members, assignment, rows }
    }
}

/// Topic clustering over document content: TF-IDF vector space, a
/// [`Partitioner`] (seeded k-means by default) and centroid-weighted keywords.
pub struct Clusterer {
    config: ClusterConfig,
    partitioner: Box<dyn Partitioner>,
    state: RwLock<Option<ClusterState>>,
}

impl Default for Clusterer {
    fn default() -> Self { Self::new(ClusterConfig::default()) }
}

impl std::fmt::Debug for Clusterer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clusterer").field("config", &self.config).field("has_state", &self.has_state()).finish_non_exhaustive()
    }
}

impl Clusterer {
    pub fn new(config: ClusterConfig) -> Self {
        let partitioner = KMeansPartitioner::from_config(&config);
        Self::with_partitioner(config, partitioner)
    }

    pub fn with_partitioner(config: ClusterConfig, partitioner: impl Partitioner + 'static) -> Self {
        Self { config, partitioner: Box::new(partitioner), state: RwLock::new(None) }
    }

    pub fn config(&self) -> &ClusterConfig { &self.config }

    /// `n / docs_per_cluster` clamped to the configured bounds, never above `n`.
    pub fn cluster_count(&self, n: usize) -> usize {
        let c = &self.config;
        (n / c.docs_per_cluster.max(1)).max(c.min_clusters).min(c.max_clusters.max(1)).min(n)
    }

    /// Partition `documents` into topic clusters and remember the result.
    ///
    /// Fewer than `min_cluster_size` documents is not an error: the result
    /// carries an `InsufficientDocuments` status and the remembered state is
    /// dropped.
    pub fn cluster(&self, documents: &[Document], min_cluster_size: usize) -> Result<ClusteringResult> {
        let n = documents.len();
        let required = min_cluster_size.max(1);
        if n < required {
            info!(found = n, required, "not enough documents for clustering");
            self.clear();
            return Ok(ClusteringResult::insufficient(n, required));
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let Some(matrix) = self.vectorize(&texts)? else {
            warn!(documents = n, "no usable terms, placing every document in one cluster");
            let members = BTreeMap::from([(0, documents.iter().map(|d| d.id.clone()).collect())]);
            let rows = documents.iter().map(|d| (d.id.clone(), SparseVector::default())).collect();
            return Ok(self.finish(members, BTreeMap::from([(0, Vec::new())]), rows, n));
        };

        let k = self.cluster_count(n);
        let points = dense(&matrix);
        let partition = self.partitioner.partition(&points, k).map_err(|e| Error::Operation(format!("clustering failed: {e}")))?;

        // Compact ids in order of first appearance.
        let mut remap: BTreeMap<usize, usize> = BTreeMap::new();
        let mut members: BTreeMap<usize, Vec<DocumentId>> = BTreeMap::new();
        for (doc, &label) in documents.iter().zip(&partition.labels) {
            let next = remap.len();
            let cid = *remap.entry(label).or_insert(next);
            members.entry(cid).or_default().push(doc.id.clone());
        }

        let topics = remap
            .iter()
            .map(|(&label, &cid)| {
                let weights: Vec<f64> = if label < partition.centroids.nrows() { partition.centroids.row(label).to_vec() } else { Vec::new() };
                (cid, top_terms(&weights, &matrix.vocabulary, self.config.topic_terms))
            })
            .collect();
        let rows = documents.iter().zip(matrix.rows).map(|(d, row)| (d.id.clone(), row)).collect();
        debug!(documents = n, k, features = matrix.vocabulary.len(), "k-means partition computed");
        Ok(self.finish(members, topics, rows, n))
    }

    fn finish(
        &self,
        members: BTreeMap<usize, Vec<DocumentId>>,
        topics: BTreeMap<usize, Vec<String>>,
        rows: HashMap<DocumentId, SparseVector>,
        total_documents: usize,
    ) -> ClusteringResult {
        let n_clusters = members.len();
        info!(documents = total_documents, clusters = n_clusters, "clustering complete");
        let result = ClusteringResult {
            status: ClusteringStatus::Clustered,
            message: None,
            clusters: members.clone(),
            topics,
            n_clusters,
            total_documents,
        };
        *self.state.write() = Some(ClusterState::new(members, rows));
        result
    }

    /// Strict pruning first; small or uniform corpora retry with every term allowed.
    fn vectorize(&self, texts: &[&str]) -> Result<Option<TfidfMatrix>> {
        let strict = TfidfOptions {
            max_features: Some(self.config.max_features),
            ngram_max: 2,
            min_df: self.config.min_df,
            max_df: self.config.max_df,
            normalize: true,
        };
        let relaxed = TfidfOptions { min_df: 1, max_df: 1.0, ..strict.clone() };
        for options in [strict, relaxed] {
            match TfidfVectorizer::new(options).fit_transform(texts) {
                Ok(matrix) => return Ok(Some(matrix)),
                Err(VectorizeError::EmptyVocabulary) => debug!("empty vocabulary, relaxing document-frequency bounds"),
                Err(e) => return Err(Error::Operation(format!("vectorization failed: {e}"))),
            }
        }
        Ok(None)
    }

    /// Other members of `document_id`'s cluster, most similar first.
    pub fn get_similar_documents_by_cluster(&self, document_id: &str) -> Vec<DocumentId> {
        self.similar_documents_scored(document_id).into_iter().map(|(id, _)| id).collect()
    }

    /// Cluster peers with the cosine similarity of their TF-IDF rows to the
    /// reference row. Empty when the id was not part of the last run.
    pub fn similar_documents_scored(&self, document_id: &str) -> Vec<(DocumentId, f32)> {
        let guard = self.state.read();
        let Some(state) = guard.as_ref() else { return Vec::new() };
        let Some(cid) = state.assignment.get(document_id) else { return Vec::new() };
        let Some(ids) = state.members.get(cid) else { return Vec::new() };
        let reference = state.rows.get(document_id);

        let mut peers: Vec<(DocumentId, f32)> = ids
            .iter()
            .filter(|id| id.as_str() != document_id)
            .map(|id| {
                let sim = match (reference, state.rows.get(id)) {
                    (Some(r), Some(row)) => r.cosine(row),
                    _ => 0.0,
                };
                (id.clone(), sim)
            })
            .collect();
        peers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        peers
    }

    pub fn has_state(&self) -> bool { self.state.read().is_some() }

    pub fn clear(&self) { *self.state.write() = None; }
}

fn dense(matrix: &TfidfMatrix) -> Array2<f64> {
    let mut points = Array2::zeros((matrix.n_rows(), matrix.n_features()));
    for (i, row) in matrix.rows.iter().enumerate() {
        for &(j, w) in row.entries() { points[[i, j]] = f64::from(w); }
    }
    points
}

/// Highest positive centroid weights; ties go to the earlier vocabulary term.
fn top_terms(weights: &[f64], vocabulary: &[String], n: usize) -> Vec<String> {
    let mut ranked: Vec<(usize, f64)> = weights.iter().copied().enumerate().filter(|&(_, w)| w > 0.0).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).filter_map(|(j, _)| vocabulary.get(j).cloned()).collect()
}
