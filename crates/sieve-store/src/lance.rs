//! LanceDB-backed [`DocumentStore`].
//!
//! One `documents` table holds every field plus the embedding. Vector search
//! uses cosine distance, so similarity is `1 - _distance`.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, RecordBatchReader, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use sieve_core::traits::DocumentStore;
use sieve_core::types::{Document, DocumentFilter, DocumentId, DocumentUpdate, Metadata, NewDocument};
use tracing::debug;

use crate::schema::build_documents_schema;
use crate::table::{ensure_table, filter_predicate, id_predicate, open_db};

pub struct LanceStore {
    db: Connection,
    table_name: String,
    dim: usize,
    schema: Arc<Schema>,
    seq: AtomicU64,
}

impl LanceStore {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let dim_i32 = i32::try_from(dim).map_err(|_| anyhow!("embedding dimension {dim} out of range"))?;
        let db = open_db(uri).await?;
        let schema = build_documents_schema(dim_i32);
        ensure_table(&db, table_name, schema.clone()).await?;
        debug!(uri, table = table_name, dim, "lance store ready");
        Ok(Self { db, table_name: table_name.to_string(), dim, schema, seq: AtomicU64::new(0) })
    }

    async fn table(&self) -> Result<Table> { Ok(self.db.open_table(&self.table_name).execute().await?) }

    fn next_id(&self, doc: &NewDocument) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seed = format!("{nanos}:{seq}:{}", doc.content);
        blake3::hash(seed.as_bytes()).to_hex().as_str()[..16].to_string()
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim { bail!("embedding has {} dimensions, table expects {}", vector.len(), self.dim); }
        Ok(())
    }

    fn to_record_batch(&self, rows: &[(Document, Vec<f32>)]) -> Result<RecordBatch> {
        let mut ids = Vec::new(); let mut titles = Vec::new(); let mut contents = Vec::new(); let mut metadata = Vec::new();
        let mut sources = Vec::new(); let mut types = Vec::new(); let mut created = Vec::new(); let mut updated = Vec::new();
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for (doc, vector) in rows {
            ids.push(doc.id.clone()); titles.push(doc.title.clone()); contents.push(doc.content.clone());
            metadata.push(serde_json::to_string(&doc.metadata)?); sources.push(doc.source.clone()); types.push(doc.document_type.clone());
            created.push(doc.created_at.timestamp_millis()); updated.push(doc.updated_at.timestamp_millis());
            vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }
        let dim = i32::try_from(self.dim)?;
        Ok(RecordBatch::try_new(self.schema.clone(), vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(types)),
            Arc::new(TimestampMillisecondArray::from(created)),
            Arc::new(TimestampMillisecondArray::from(updated)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ])?)
    }

    fn reader(&self, batch: RecordBatch) -> Box<dyn RecordBatchReader + Send> {
        Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), self.schema.clone()))
    }

    /// Document plus stored embedding.
    async fn get_row(&self, id: &str) -> Result<Option<(Document, Vec<f32>)>> {
        let t = self.table().await?;
        let mut stream = t.query().only_if(id_predicate(id)).limit(1).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            let cols = Columns::of(&batch)?;
            if batch.num_rows() > 0 { return Ok(Some((cols.document(0)?, cols.vector(0)?))); }
        }
        Ok(None)
    }
}

/// Typed views over one result batch.
struct Columns<'a> {
    id: &'a StringArray,
    title: &'a StringArray,
    content: &'a StringArray,
    metadata: &'a StringArray,
    source: &'a StringArray,
    document_type: &'a StringArray,
    created_at: &'a TimestampMillisecondArray,
    updated_at: &'a TimestampMillisecondArray,
    vector: Option<&'a FixedSizeListArray>,
    distance: Option<&'a Float32Array>,
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<T>()).ok_or_else(|| anyhow!("documents.{name} column missing"))
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>> { Utc.timestamp_millis_opt(ms).single().ok_or_else(|| anyhow!("invalid timestamp {ms}")) }

fn optional(col: &StringArray, i: usize) -> Option<String> { if col.is_null(i) { None } else { Some(col.value(i).to_string()) } }

impl<'a> Columns<'a> {
    fn of(batch: &'a RecordBatch) -> Result<Self> {
        Ok(Self {
            id: column(batch, "id")?,
            title: column(batch, "title")?,
            content: column(batch, "content")?,
            metadata: column(batch, "metadata")?,
            source: column(batch, "source")?,
            document_type: column(batch, "document_type")?,
            created_at: column(batch, "created_at")?,
            updated_at: column(batch, "updated_at")?,
            vector: column(batch, "vector").ok(),
            distance: column(batch, "_distance").ok(),
        })
    }

    fn document(&self, i: usize) -> Result<Document> {
        let metadata: Metadata = serde_json::from_str(self.metadata.value(i))?;
        Ok(Document {
            id: self.id.value(i).to_string(),
            title: optional(self.title, i),
            content: self.content.value(i).to_string(),
            metadata,
            source: optional(self.source, i),
            document_type: self.document_type.value(i).to_string(),
            created_at: timestamp(self.created_at.value(i))?,
            updated_at: timestamp(self.updated_at.value(i))?,
        })
    }

    fn vector(&self, i: usize) -> Result<Vec<f32>> {
        let col = self.vector.ok_or_else(|| anyhow!("documents.vector column missing"))?;
        Ok(col.value(i).as_primitive::<Float32Type>().values().to_vec())
    }

    fn similarity(&self, i: usize) -> f32 { self.distance.map_or(0.0, |d| 1.0 - d.value(i)) }
}

#[async_trait]
impl DocumentStore for LanceStore {
    async fn add(&self, doc: NewDocument, embedding: Vec<f32>) -> Result<DocumentId> {
        self.check_vector(&embedding)?;
        let now = Utc::now();
        let id = self.next_id(&doc);
        let document_type = doc.document_type_or_default().to_string();
        let document = Document { id: id.clone(), title: doc.title, content: doc.content, metadata: doc.metadata, source: doc.source, document_type, created_at: now, updated_at: now };
        let batch = self.to_record_batch(&[(document, embedding)])?;
        self.table().await?.add(self.reader(batch)).execute().await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> { Ok(self.get_row(id).await?.map(|(doc, _)| doc)) }

    async fn update(&self, id: &str, mut update: DocumentUpdate) -> Result<bool> {
        let Some((mut doc, mut vector)) = self.get_row(id).await? else { return Ok(false) };
        if let Some(v) = update.embedding.take() { self.check_vector(&v)?; vector = v; }
        update.apply(&mut doc);
        let batch = self.to_record_batch(&[(doc, vector)])?;
        let t = self.table().await?;
        // Upsert behavior via merge_insert: id is unique
        let mut mi = t.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(self.reader(batch)).await?;
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let t = self.table().await?;
        let pred = id_predicate(id);
        if t.count_rows(Some(pred.clone())).await? == 0 { return Ok(false); }
        t.delete(&pred).await?;
        Ok(true)
    }

    async fn list(&self, limit: usize, offset: usize, filter: &DocumentFilter) -> Result<Vec<Document>> {
        if limit == 0 { return Ok(Vec::new()); }
        let t = self.table().await?;
        let mut query = t.query().limit(limit).offset(offset);
        if let Some(pred) = filter_predicate(filter) { query = query.only_if(pred); }
        let mut stream = query.execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let cols = Columns::of(&batch)?;
            for i in 0..batch.num_rows() { out.push(cols.document(i)?); }
        }
        out.truncate(limit);
        Ok(out)
    }

    async fn nearest(&self, query_vector: &[f32], top_k: usize, filter: &DocumentFilter) -> Result<Vec<(Document, f32)>> {
        if top_k == 0 { return Ok(Vec::new()); }
        self.check_vector(query_vector)?;
        let t = self.table().await?;
        if t.count_rows(filter_predicate(filter)).await? == 0 { return Ok(Vec::new()); }
        let mut query = t.vector_search(query_vector.to_vec())?.distance_type(DistanceType::Cosine).limit(top_k);
        if let Some(pred) = filter_predicate(filter) { query = query.only_if(pred); }
        let mut stream = query.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let cols = Columns::of(&batch)?;
            for i in 0..batch.num_rows() { hits.push((cols.document(i)?, cols.similarity(i))); }
        }
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}
