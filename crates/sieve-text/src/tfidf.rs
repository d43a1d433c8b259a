//! TF-IDF vector space over a small in-memory corpus.
//!
//! Terms are analyzer tokens plus word n-grams built from adjacent tokens
//! (after stop-word removal). IDF is smoothed, `ln((1 + n) / (1 + df)) + 1`, and
//! rows are L2-normalized unless disabled. Vocabulary order is lexicographic.

use std::collections::HashMap;
use thiserror::Error;

use crate::analyzer::Analyzer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VectorizeError {
    #[error("no texts to vectorize")]
    EmptyCorpus,
    #[error("empty vocabulary; texts contain only stop words or every term was pruned")]
    EmptyVocabulary,
}

/// Sparse row: `(feature index, weight)` pairs sorted by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f32)>,
}

impl SparseVector {
    pub fn new(mut entries: Vec<(usize, f32)>) -> Self {
        entries.sort_by_key(|(i, _)| *i);
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f32)] { &self.entries }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn sum(&self) -> f32 { self.entries.iter().map(|(_, w)| w).sum() }

    pub fn norm(&self) -> f32 { self.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt() }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (a, b) = (&self.entries, &other.entries);
        let (mut i, mut j, mut acc) = (0, 0, 0f32);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => { acc += a[i].1 * b[j].1; i += 1; j += 1; }
            }
        }
        acc
    }

    /// Cosine similarity; `0.0` when either side is empty.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let denom = self.norm() * other.norm();
        if denom <= f32::EPSILON { return 0.0; }
        (self.dot(other) / denom).clamp(0.0, 1.0)
    }

    fn normalize(&mut self) {
        let n = self.norm();
        if n > f32::EPSILON { for (_, w) in &mut self.entries { *w /= n; } }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfidfMatrix {
    pub vocabulary: Vec<String>,
    pub idf: Vec<f32>,
    pub rows: Vec<SparseVector>,
}

impl TfidfMatrix {
    pub fn n_features(&self) -> usize { self.vocabulary.len() }

    pub fn n_rows(&self) -> usize { self.rows.len() }
}

/// Turns a batch of texts into a shared numeric vector space.
pub trait TextVectorizer {
    fn fit_transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<TfidfMatrix, VectorizeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfidfOptions {
    /// Keep only the most frequent terms across the corpus.
    pub max_features: Option<usize>,
    /// Longest word n-gram (1 = unigrams only).
    pub ngram_max: usize,
    /// Minimum number of texts a term must appear in.
    pub min_df: usize,
    /// Maximum share of texts a term may appear in.
    pub max_df: f32,
    pub normalize: bool,
}

impl Default for TfidfOptions {
    fn default() -> Self { Self { max_features: None, ngram_max: 1, min_df: 1, max_df: 1.0, normalize: true } }
}

#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    options: TfidfOptions,
}

impl TfidfVectorizer {
    pub fn new(options: TfidfOptions) -> Self { Self { options } }

    pub fn options(&self) -> &TfidfOptions { &self.options }

    fn term_counts(&self, analyzer: &mut Analyzer, text: &str) -> HashMap<String, u32> {
        let tokens = analyzer.tokens(text);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for tok in &tokens { *counts.entry(tok.clone()).or_insert(0) += 1; }
        for n in 2..=self.options.ngram_max.max(1) {
            for gram in tokens.windows(n) { *counts.entry(gram.join(" ")).or_insert(0) += 1; }
        }
        counts
    }
}

impl TextVectorizer for TfidfVectorizer {
    fn fit_transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<TfidfMatrix, VectorizeError> {
        if texts.is_empty() { return Err(VectorizeError::EmptyCorpus); }
        let mut analyzer = Analyzer::new();
        let docs: Vec<HashMap<String, u32>> = texts.iter().map(|t| self.term_counts(&mut analyzer, t.as_ref())).collect();
        let n = docs.len();

        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut total: HashMap<&str, u64> = HashMap::new();
        for doc in &docs {
            for (term, count) in doc {
                *df.entry(term.as_str()).or_insert(0) += 1;
                *total.entry(term.as_str()).or_insert(0) += u64::from(*count);
            }
        }

        let max_doc_count = self.options.max_df * n as f32;
        let mut kept: Vec<&str> = df
            .iter()
            .filter(|(_, &d)| d >= self.options.min_df && d as f32 <= max_doc_count)
            .map(|(t, _)| *t)
            .collect();
        if let Some(max_features) = self.options.max_features {
            if kept.len() > max_features {
                kept.sort_by(|a, b| total[b].cmp(&total[a]).then_with(|| a.cmp(b)));
                kept.truncate(max_features);
            }
        }
        if kept.is_empty() { return Err(VectorizeError::EmptyVocabulary); }
        kept.sort_unstable();

        let index: HashMap<&str, usize> = kept.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        let idf: Vec<f32> = kept.iter().map(|t| ((1.0 + n as f32) / (1.0 + df[t] as f32)).ln() + 1.0).collect();
        let rows = docs
            .iter()
            .map(|doc| {
                let entries = doc.iter().filter_map(|(term, &count)| index.get(term.as_str()).map(|&i| (i, count as f32 * idf[i]))).collect();
                let mut row = SparseVector::new(entries);
                if self.options.normalize { row.normalize(); }
                row
            })
            .collect();
        let vocabulary = kept.into_iter().map(str::to_string).collect();
        Ok(TfidfMatrix { vocabulary, idf, rows })
    }
}
