//! LanceDB connection helpers and SQL predicate building.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use sieve_core::types::DocumentFilter;
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Quote a string literal for a Lance SQL predicate.
pub fn quote(value: &str) -> String { format!("'{}'", value.replace('\'', "''")) }

pub fn id_predicate(id: &str) -> String { format!("id = {}", quote(id)) }

/// `None` when the filter has no constraints.
pub fn filter_predicate(filter: &DocumentFilter) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(t) = &filter.document_type { parts.push(format!("document_type = {}", quote(t))); }
    if let Some(s) = &filter.source { parts.push(format!("source = {}", quote(s))); }
    if parts.is_empty() { None } else { Some(parts.join(" AND ")) }
}
