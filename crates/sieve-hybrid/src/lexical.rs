use sieve_text::tfidf::{TextVectorizer, TfidfOptions, TfidfVectorizer};
use tracing::warn;

/// Keyword relevance of each text to a query, in `[0, 1]`.
pub trait KeywordScorer: Send + Sync {
    fn score(&self, query: &str, texts: &[&str]) -> Vec<f32>;
}

/// TF-IDF cosine over a vocabulary fitted on the candidates plus the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfidfKeywordScorer;

impl KeywordScorer for TfidfKeywordScorer {
    fn score(&self, query: &str, texts: &[&str]) -> Vec<f32> { lexical_similarities(query, texts) }
}

/// Cosine between the query's TF-IDF row and each text's row. Unigrams and
/// bigrams, stop words removed. A degenerate vocabulary degrades to zeros.
pub fn lexical_similarities(query: &str, texts: &[&str]) -> Vec<f32> {
    if texts.is_empty() { return Vec::new(); }
    let mut corpus: Vec<&str> = texts.to_vec();
    corpus.push(query);
    let options = TfidfOptions { ngram_max: 2, ..TfidfOptions::default() };
    match TfidfVectorizer::new(options).fit_transform(&corpus) {
        Ok(matrix) => {
            let Some((q, rows)) = matrix.rows.split_last() else { return vec![0.0; texts.len()] };
            rows.iter().map(|row| q.cosine(row)).collect()
        }
        Err(e) => {
            warn!(error = %e, candidates = texts.len(), "lexical scoring degraded to zeros");
            vec![0.0; texts.len()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_terms_score_higher() {
        let scores = lexical_similarities("rust borrow checker", &["the rust borrow checker explained", "baking sourdough bread", "rust on old bridges"]);
        assert_eq!(scores.len(), 3);
        assert!(scores[0] > scores[2]);
        assert!(scores[2] > scores[1]);
        assert_eq!(scores[1], 0.0);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn degenerate_vocabulary_is_all_zero() {
        assert_eq!(lexical_similarities("the of and", &["is it", "was"]), vec![0.0, 0.0]);
        assert!(lexical_similarities("anything", &[]).is_empty());
    }
}
