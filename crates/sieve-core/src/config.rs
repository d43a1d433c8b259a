//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting, e.g. `APP_ENGINE__CACHE__CAPACITY`). Engine tuning
//! lives under `[engine]`; every field has a default.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[engine]` section, falling back to defaults when absent.
    pub fn engine(&self) -> Result<EngineConfig> {
        let engine: EngineConfig = if self.figment.contains("engine") {
            self.figment.extract_inner("engine").map_err(|e| Error::InvalidConfig(e.to_string()))?
        } else {
            EngineConfig::default()
        };
        engine.validate()?;
        Ok(engine)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let engine = self.engine()?;
        if matches!(env, "prod" | "production") && engine.store.backend == StoreBackend::Memory {
            anyhow::bail!("the in-memory store is not durable; set engine.store.backend = \"lance\" in production");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub summarizer: SummarizerConfig,
    pub cluster: ClusterConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f32| if (0.0..=1.0).contains(&v) { Ok(()) } else { Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {v}"))) };
        unit("cache.similarity_threshold", self.cache.similarity_threshold)?;
        unit("search.similarity_threshold", self.search.similarity_threshold)?;
        unit("cluster.max_df", self.cluster.max_df)?;
        if self.cache.capacity == 0 { return Err(Error::InvalidConfig("cache.capacity must be positive".into())); }
        if self.search.vector_weight < 0.0 || self.search.keyword_weight < 0.0 {
            return Err(Error::InvalidConfig("search weights must not be negative".into()));
        }
        if self.cluster.min_clusters < 1 || self.cluster.min_clusters > self.cluster.max_clusters {
            return Err(Error::InvalidConfig(format!("cluster.min_clusters ({}) must be within 1..=max_clusters ({})", self.cluster.min_clusters, self.cluster.max_clusters)));
        }
        if self.cluster.docs_per_cluster == 0 { return Err(Error::InvalidConfig("cluster.docs_per_cluster must be positive".into())); }
        if self.summarizer.max_sentences == 0 { return Err(Error::InvalidConfig("summarizer.max_sentences must be positive".into())); }
        if self.embedding.dimension == 0 { return Err(Error::InvalidConfig("embedding.dimension must be positive".into())); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Summarize when the sentence count exceeds this.
    pub sentence_threshold: usize,
    /// ...or when the content is longer than this many characters.
    pub length_threshold: usize,
    pub max_sentences: usize,
    pub max_summary_length: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self { Self { sentence_threshold: 10, length_threshold: 2000, max_sentences: 3, max_summary_length: 500 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub min_cluster_size: usize,
    pub max_features: usize,
    pub min_df: usize,
    pub max_df: f32,
    pub min_clusters: usize,
    pub max_clusters: usize,
    pub docs_per_cluster: usize,
    pub topic_terms: usize,
    pub max_iterations: u64,
    pub n_runs: usize,
    pub seed: u64,
    /// Upper bound on documents fetched for topic clustering.
    pub document_limit: usize,
    pub min_documents: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            max_features: 1000,
            min_df: 2,
            max_df: 0.8,
            min_clusters: 2,
            max_clusters: 20,
            docs_per_cluster: 3,
            topic_terms: 5,
            max_iterations: 300,
            n_runs: 10,
            seed: 42,
            document_limit: 1000,
            min_documents: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    pub similarity_threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self { Self { capacity: 1000, ttl_secs: 24 * 60 * 60, similarity_threshold: 0.85 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub similarity_threshold: f32,
    /// Candidates fetched per requested result before re-ranking.
    pub candidate_multiplier: usize,
    pub use_cache: bool,
    /// Summaries stand in for content only when the original exceeded this length.
    pub summary_min_content_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5, vector_weight: 0.7, keyword_weight: 0.3, similarity_threshold: 0.6, candidate_multiplier: 3, use_cache: true, summary_min_content_length: 1000 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Lance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self { Self { backend: StoreBackend::Memory, lancedb_dir: "~/.local/share/sieve/lancedb".to_string(), table: "documents".to_string() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimension: usize,
    pub max_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self { Self { dimension: 384, max_chars: 100_000 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn engine_defaults_when_section_missing() {
        let config = Config::from_figment(Figment::new());
        let engine = config.engine().expect("defaults");
        assert_eq!(engine, EngineConfig::default());
        assert_eq!(engine.cache.capacity, 1000);
        assert_eq!(engine.search.top_k, 5);
    }

    #[test]
    fn toml_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", r#"
                [engine.cache]
                capacity = 50
                [engine.search]
                vector_weight = 0.5
            "#)?;
            jail.set_env("APP_ENGINE__CACHE__TTL_SECS", "60");
            jail.set_env("RUST_ENV", "test");
            let config = Config::load().map_err(|e| e.to_string())?;
            let engine = config.engine().map_err(|e| e.to_string())?;
            assert_eq!(engine.cache.capacity, 50);
            assert_eq!(engine.cache.ttl_secs, 60);
            assert!((engine.search.vector_weight - 0.5).abs() < 1e-6);
            assert!((engine.search.keyword_weight - 0.3).abs() < 1e-6);
            Ok(())
        });
    }

    #[test]
    fn prod_rejects_memory_store() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "prod");
            assert!(Config::load().is_err());
            jail.set_env("APP_ENGINE__STORE__BACKEND", "lance");
            assert!(Config::load().is_ok());
            Ok(())
        });
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut engine = EngineConfig::default();
        engine.cache.similarity_threshold = 1.5;
        assert!(matches!(engine.validate(), Err(Error::InvalidConfig(_))));
        let mut engine = EngineConfig::default();
        engine.cluster.min_clusters = 30;
        assert!(engine.validate().is_err());
        let mut engine = EngineConfig::default();
        engine.cache.capacity = 0;
        assert!(engine.validate().is_err());
    }
}
