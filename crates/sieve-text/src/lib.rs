//! sieve-text
//!
//! Text analysis on top of tantivy's tokenizer pipeline: sentence splitting,
//! a TF-IDF vectorizer and the extractive summarizer.

pub mod analyzer;
pub mod sentences;
pub mod summarizer;
pub mod tfidf;

pub use analyzer::Analyzer;
pub use summarizer::Summarizer;
pub use tfidf::{SparseVector, TextVectorizer, TfidfMatrix, TfidfOptions, TfidfVectorizer, VectorizeError};
