use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sieve_core::traits::DocumentStore;
use sieve_core::types::{Document, DocumentFilter, DocumentId, DocumentUpdate, NewDocument};
use sieve_core::vector::cosine_similarity;

#[derive(Debug, Clone)]
struct Stored {
    doc: Document,
    vector: Vec<f32>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    docs: BTreeMap<u64, Stored>,
}

/// Process-local store with sequential ids ("1", "2", ...) and brute-force
/// cosine search. Iteration follows insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dim: Option<usize>,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Reject embeddings whose length differs from `dim`.
    pub fn with_dimension(dim: usize) -> Self { Self { dim: Some(dim), inner: RwLock::default() } }

    pub fn len(&self) -> usize { self.inner.read().docs.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() { bail!("embedding is empty"); }
        if let Some(dim) = self.dim {
            if vector.len() != dim { bail!("embedding has {} dimensions, store expects {dim}", vector.len()); }
        }
        Ok(())
    }
}

fn key(id: &str) -> Option<u64> { id.parse().ok() }

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn add(&self, doc: NewDocument, embedding: Vec<f32>) -> Result<DocumentId> {
        self.check_vector(&embedding)?;
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let n = inner.next_id;
        let now = Utc::now();
        let document_type = doc.document_type_or_default().to_string();
        let stored = Stored {
            doc: Document {
                id: n.to_string(),
                title: doc.title,
                content: doc.content,
                metadata: doc.metadata,
                source: doc.source,
                document_type,
                created_at: now,
                updated_at: now,
            },
            vector: embedding,
        };
        inner.docs.insert(n, stored);
        Ok(n.to_string())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(key(id).and_then(|k| self.inner.read().docs.get(&k).map(|s| s.doc.clone())))
    }

    async fn update(&self, id: &str, mut update: DocumentUpdate) -> Result<bool> {
        let Some(k) = key(id) else { return Ok(false) };
        if let Some(v) = &update.embedding { self.check_vector(v)?; }
        let mut inner = self.inner.write();
        let Some(stored) = inner.docs.get_mut(&k) else { return Ok(false) };
        if let Some(v) = update.embedding.take() { stored.vector = v; }
        update.apply(&mut stored.doc);
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(key(id).is_some_and(|k| self.inner.write().docs.remove(&k).is_some()))
    }

    async fn list(&self, limit: usize, offset: usize, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let inner = self.inner.read();
        Ok(inner.docs.values().filter(|s| filter.matches(&s.doc)).skip(offset).take(limit).map(|s| s.doc.clone()).collect())
    }

    async fn nearest(&self, query_vector: &[f32], top_k: usize, filter: &DocumentFilter) -> Result<Vec<(Document, f32)>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let inner = self.inner.read();
        let mut scored: Vec<(&Stored, f32)> = inner
            .docs
            .values()
            .filter(|s| filter.matches(&s.doc))
            .map(|s| (s, cosine_similarity(query_vector, &s.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored.into_iter().map(|(s, sim)| (s.doc.clone(), sim)).collect())
    }
}
