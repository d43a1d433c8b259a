//! Domain types shared by the store, the text tools and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type DocumentId = String;
pub type Metadata = serde_json::Map<String, Value>;

pub const DEFAULT_DOCUMENT_TYPE: &str = "text";

/// Metadata keys written by ingestion when a summary was produced.
pub const SUMMARY_KEY: &str = "summary";
pub const SUMMARIZED_KEY: &str = "summarized";
pub const ORIGINAL_LENGTH_KEY: &str = "original_length";

/// A stored document. The embedding lives in the store, not here.
///
/// `content` is never replaced by a summary; summaries only ever land in
/// `metadata` under [`SUMMARY_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub source: Option<String>,
    pub document_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn summary(&self) -> Option<&str> { self.metadata.get(SUMMARY_KEY).and_then(Value::as_str) }

    pub fn is_summarized(&self) -> bool { self.metadata.get(SUMMARIZED_KEY).and_then(Value::as_bool).unwrap_or(false) }

    pub fn original_length(&self) -> Option<usize> {
        self.metadata.get(ORIGINAL_LENGTH_KEY).and_then(Value::as_u64).and_then(|n| usize::try_from(n).ok())
    }

    /// Text used when comparing this document against a query.
    ///
    /// Long auto-summarized documents (original longer than `min_len`
    /// characters) are compared through their summary; everything else uses
    /// the full content.
    pub fn comparison_text(&self, min_len: usize) -> &str {
        if self.is_summarized() && self.original_length().is_some_and(|len| len > min_len) {
            if let Some(summary) = self.summary() { return summary; }
        }
        &self.content
    }
}

/// Ingestion input. Ids and timestamps are assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewDocument {
    pub content: String,
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub source: Option<String>,
    pub document_type: Option<String>,
}

impl NewDocument {
    pub fn new(content: impl Into<String>) -> Self { Self { content: content.into(), ..Self::default() } }

    pub fn with_title(mut self, title: impl Into<String>) -> Self { self.title = Some(title.into()); self }

    pub fn with_source(mut self, source: impl Into<String>) -> Self { self.source = Some(source.into()); self }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self { self.document_type = Some(document_type.into()); self }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn document_type_or_default(&self) -> &str { self.document_type.as_deref().unwrap_or(DEFAULT_DOCUMENT_TYPE) }
}

/// Partial update applied by `DocumentStore::update`. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<Metadata>,
    pub source: Option<String>,
    pub document_type: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

impl DocumentUpdate {
    pub fn apply(self, doc: &mut Document) {
        if let Some(title) = self.title { doc.title = Some(title); }
        if let Some(content) = self.content { doc.content = content; }
        if let Some(metadata) = self.metadata { doc.metadata = metadata; }
        if let Some(source) = self.source { doc.source = Some(source); }
        if let Some(document_type) = self.document_type { doc.document_type = document_type; }
        doc.updated_at = Utc::now();
    }
}

/// Equality filters on `document_type` and `source`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub document_type: Option<String>,
    pub source: Option<String>,
}

impl DocumentFilter {
    pub fn new(document_type: Option<String>, source: Option<String>) -> Self { Self { document_type, source } }

    pub fn is_empty(&self) -> bool { self.document_type.is_none() && self.source.is_none() }

    pub fn matches(&self, doc: &Document) -> bool {
        let type_ok = self.document_type.as_deref().map_or(true, |t| t == doc.document_type);
        let source_ok = self.source.as_deref().map_or(true, |s| doc.source.as_deref() == Some(s));
        type_ok && source_ok
    }
}

/// A ranked hit returned by the engine. `score` is always within `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: DocumentId,
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub score: f32,
}

impl SearchResult {
    pub fn from_document(doc: Document, score: f32) -> Self {
        Self { id: doc.id, title: doc.title, content: doc.content, metadata: doc.metadata, score }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    #[default]
    Similar,
    Cluster,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Similar => f.write_str("similar"),
            Self::Cluster => f.write_str("cluster"),
        }
    }
}

impl FromStr for RecommendationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "similar" => Ok(Self::Similar),
            "cluster" => Ok(Self::Cluster),
            other => Err(crate::Error::InvalidConfig(format!("unknown recommendation type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusteringStatus {
    Clustered,
    InsufficientDocuments { found: usize, required: usize },
}

/// Output of one clustering run. Cluster ids are only meaningful within the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub status: ClusteringStatus,
    pub message: Option<String>,
    pub clusters: BTreeMap<usize, Vec<DocumentId>>,
    pub topics: BTreeMap<usize, Vec<String>>,
    pub n_clusters: usize,
    pub total_documents: usize,
}

impl ClusteringResult {
    pub fn insufficient(found: usize, required: usize) -> Self {
        Self {
            status: ClusteringStatus::InsufficientDocuments { found, required },
            message: Some(format!("Not enough documents for clustering: found {found}, need at least {required}")),
            clusters: BTreeMap::new(),
            topics: BTreeMap::new(),
            n_clusters: 0,
            total_documents: found,
        }
    }

    pub fn is_clustered(&self) -> bool { self.status == ClusteringStatus::Clustered }

    pub fn cluster_of(&self, id: &str) -> Option<usize> {
        self.clusters.iter().find(|(_, ids)| ids.iter().any(|d| d == id)).map(|(cid, _)| *cid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPreview {
    pub id: DocumentId,
    pub title: Option<String>,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCluster {
    pub cluster_id: usize,
    pub topics: Vec<String>,
    pub size: usize,
    pub documents: Vec<DocumentPreview>,
}

/// Clustering result enriched with per-cluster document previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicClusters {
    pub result: ClusteringResult,
    pub clusters: Vec<TopicCluster>,
}
