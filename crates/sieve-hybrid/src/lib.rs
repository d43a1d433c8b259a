//! sieve-hybrid
//!
//! The retrieval engine: semantic response cache, keyword scoring, weighted
//! score fusion and the `HybridSearchEngine` orchestrating them with the
//! summarizer, the clusterer and the embedding/store collaborators.

pub mod cache;
pub mod engine;
pub mod fusion;
pub mod lexical;

pub use cache::{CacheHit, CacheStats, SemanticCache};
pub use engine::{HybridSearchEngine, SearchRequest};
pub use fusion::{fuse, Candidate, FusionWeights};
pub use lexical::{lexical_similarities, KeywordScorer, TfidfKeywordScorer};
