//! Output formatting for command results.
//!
//! Every formatter renders either human-readable text or pretty JSON.

use std::path::Path;

use serde::Serialize;
use serde_json::json;
use sieve_core::types::{Document, RecommendationKind, SearchResult, TopicClusters};
use sieve_hybrid::CacheStats;

const SNIPPET_MAX_CHARS: usize = 200;

fn to_json<T: Serialize + ?Sized>(value: &T) -> String { serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string()) }

/// Collapses whitespace and cuts to `max` characters, ellipsis included.
fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

fn label(id: &str, title: Option<&str>) -> String {
    match title {
        Some(t) if !t.is_empty() => format!("{t} [{id}]"),
        _ => format!("[{id}]"),
    }
}

fn plural(n: usize) -> &'static str { if n == 1 { "" } else { "s" } }

fn push_results(out: &mut String, results: &[SearchResult]) {
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("{}. {} (score: {:.3})\n", i + 1, label(&r.id, r.title.as_deref()), r.score));
        out.push_str(&format!("   {}\n\n", snippet(&r.content, SNIPPET_MAX_CHARS)));
    }
}

pub fn format_results(query: &str, results: &[SearchResult], as_json: bool) -> String {
    if as_json {
        return to_json(&json!({ "query": query, "results": results }));
    }
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }
    let mut out = format!("Found {} result{} for \"{query}\":\n\n", results.len(), plural(results.len()));
    push_results(&mut out, results);
    out.trim_end().to_string()
}

pub fn format_recommendations(id: &str, kind: RecommendationKind, results: &[SearchResult], as_json: bool) -> String {
    if as_json {
        return to_json(&json!({ "document_id": id, "kind": kind, "results": results }));
    }
    if results.is_empty() {
        return format!("No {kind} recommendations for [{id}]");
    }
    let mut out = format!("{} {kind} recommendation{} for [{id}]:\n\n", results.len(), plural(results.len()));
    push_results(&mut out, results);
    out.trim_end().to_string()
}

pub fn format_clusters(clusters: &TopicClusters, as_json: bool) -> String {
    if as_json {
        return to_json(clusters);
    }
    if !clusters.result.is_clustered() {
        return clusters.result.message.clone().unwrap_or_else(|| "Clustering was not performed".to_string());
    }
    let mut out = format!("{} cluster{} over {} documents\n\n", clusters.result.n_clusters, plural(clusters.result.n_clusters), clusters.result.total_documents);
    for c in &clusters.clusters {
        let topics = if c.topics.is_empty() { "-".to_string() } else { c.topics.join(", ") };
        out.push_str(&format!("Cluster {} ({} document{}): {topics}\n", c.cluster_id, c.size, plural(c.size)));
        for d in &c.documents {
            out.push_str(&format!("   {}: {}\n", label(&d.id, d.title.as_deref()), snippet(&d.preview, 80)));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn format_document(doc: &Document, as_json: bool) -> String {
    if as_json {
        return to_json(doc);
    }
    let mut out = format!("{}\n", label(&doc.id, doc.title.as_deref()));
    out.push_str(&format!("type: {}\n", doc.document_type));
    if let Some(source) = &doc.source { out.push_str(&format!("source: {source}\n")); }
    out.push_str(&format!("created: {}\n", doc.created_at.to_rfc3339()));
    if let Some(summary) = doc.summary() { out.push_str(&format!("summary: {summary}\n")); }
    out.push('\n');
    out.push_str(&doc.content);
    out
}

pub fn format_deleted(id: &str, removed: bool, as_json: bool) -> String {
    if as_json {
        return to_json(&json!({ "document_id": id, "deleted": removed }));
    }
    if removed { format!("Deleted [{id}]") } else { format!("No document [{id}]") }
}

pub fn format_ingest(dir: &Path, documents: usize, as_json: bool) -> String {
    if as_json {
        return to_json(&json!({ "directory": dir.display().to_string(), "documents": documents }));
    }
    format!("Ingested {documents} document{} from {}", plural(documents), dir.display())
}

pub fn format_stats(stats: &CacheStats, as_json: bool) -> String {
    if as_json {
        return to_json(stats);
    }
    format!(
        "cache entries: {}/{}\navg access count: {:.2}\nmax access count: {}\nttl: {}s\nsimilarity threshold: {:.2}",
        stats.total_entries, stats.capacity, stats.avg_access_count, stats.max_access_count, stats.ttl_secs, stats.similarity_threshold
    )
}
