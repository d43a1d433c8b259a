use async_trait::async_trait;

use crate::types::{Document, DocumentFilter, DocumentId, DocumentUpdate, NewDocument};

pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `hash:xxh64:d384`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Embed one text. Fails on empty or oversized input.
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Persistence and nearest-neighbour lookup for documents.
///
/// `nearest` returns `(document, similarity)` pairs ordered by descending
/// similarity, already restricted by `filter`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn add(&self, doc: NewDocument, embedding: Vec<f32>) -> anyhow::Result<DocumentId>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<Document>>;
    async fn update(&self, id: &str, update: DocumentUpdate) -> anyhow::Result<bool>;
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
    async fn list(&self, limit: usize, offset: usize, filter: &DocumentFilter) -> anyhow::Result<Vec<Document>>;
    async fn nearest(&self, query_vector: &[f32], top_k: usize, filter: &DocumentFilter) -> anyhow::Result<Vec<(Document, f32)>>;
}
