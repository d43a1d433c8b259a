use sieve_core::config::SummarizerConfig;
use tracing::{debug, warn};

use crate::sentences::{count_sentences, ends_with_terminal_punctuation, split_sentences, truncate_chars};
use crate::tfidf::{TextVectorizer, TfidfVectorizer, VectorizeError};

pub const ELLIPSIS: &str = "...";

/// Extractive summarizer: picks the highest-weighted sentences and keeps them
/// in their original order.
///
/// Never fails. When sentences cannot be scored (e.g. only stop words) the
/// summary degrades to a truncated prefix of the input.
#[derive(Debug, Clone, Default)]
pub struct Summarizer {
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig) -> Self { Self { config } }

    pub fn config(&self) -> &SummarizerConfig { &self.config }

    pub fn should_summarize(&self, content: &str) -> bool {
        count_sentences(content) > self.config.sentence_threshold || content.chars().count() > self.config.length_threshold
    }

    /// Summary with the configured sentence budget, or `None` for short content.
    pub fn summarize(&self, content: &str) -> Option<String> {
        if !self.should_summarize(content) { return None; }
        let summary = self.extractive_summarize(content, self.config.max_sentences);
        // Few but very long sentences come back unchanged and still need the length bound.
        if summary == content { return Some(self.truncate(content)); }
        Some(summary)
    }

    /// Content with at most `max_sentences` sentences is returned unchanged.
    pub fn extractive_summarize(&self, content: &str, max_sentences: usize) -> String {
        let max_sentences = max_sentences.max(1);
        let sentences = split_sentences(content);
        if sentences.len() <= max_sentences { return content.to_string(); }

        let scores = match sentence_scores(&sentences) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "sentence scoring failed, falling back to truncation");
                return self.truncate(content);
            }
        };

        let mut ranked: Vec<usize> = (0..sentences.len()).collect();
        ranked.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b)));
        ranked.truncate(max_sentences);
        ranked.sort_unstable();

        let mut summary = ranked.iter().map(|&i| sentences[i]).collect::<Vec<_>>().join(" ");
        if !ends_with_terminal_punctuation(&summary) { summary.push('.'); }
        debug!(sentences = sentences.len(), kept = ranked.len(), "extractive summary");
        self.truncate(&summary)
    }

    /// Hard cut to `max_summary_length` characters plus [`ELLIPSIS`].
    fn truncate(&self, text: &str) -> String {
        let max = self.config.max_summary_length;
        if text.chars().count() <= max { return text.to_string(); }
        format!("{}{}", truncate_chars(text, max).trim_end(), ELLIPSIS)
    }
}

/// Each sentence is a pseudo-document; its score is the sum of its TF-IDF weights.
fn sentence_scores(sentences: &[&str]) -> Result<Vec<f32>, VectorizeError> {
    let matrix = TfidfVectorizer::default().fit_transform(sentences)?;
    Ok(matrix.rows.iter().map(|row| row.sum()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summarizer() -> Summarizer { Summarizer::default() }

    #[test]
    fn repeated_sentences_trigger_and_shrink() {
        let s = summarizer();
        let content = "Sentence. ".repeat(15);
        assert!(s.should_summarize(&content));
        let summary = s.extractive_summarize(&content, 3);
        assert!(!summary.is_empty());
        assert!(count_sentences(&summary) <= 3);
        assert!(summary.chars().count() <= 503);
        assert_eq!(summary, "Sentence. Sentence. Sentence.");
    }

    #[test]
    fn short_content_is_unchanged() {
        let s = summarizer();
        for content in ["One.", "One. Two.", "One sentence. Another one! A third?", "no punctuation at all"] {
            assert_eq!(s.extractive_summarize(content, 3), content);
        }
        assert!(!s.should_summarize("One. Two."));
        assert_eq!(s.summarize("One. Two."), None);
    }

    #[test]
    fn long_single_block_triggers_on_length() {
        let s = summarizer();
        let content = "word ".repeat(500);
        assert!(s.should_summarize(&content));
    }

    #[test]
    fn one_long_sentence_is_still_bounded() {
        let s = summarizer();
        let content = format!("{} end.", "word ".repeat(600));
        assert!(content.chars().count() > 2000);
        assert_eq!(count_sentences(&content), 1);
        let summary = s.summarize(&content).expect("length alone triggers");
        assert!(summary.chars().count() <= 500 + ELLIPSIS.len());
        assert!(summary.ends_with(ELLIPSIS));
        assert!(content.starts_with(summary.trim_end_matches(ELLIPSIS)));
    }

    #[test]
    fn keeps_original_order_of_informative_sentences() {
        let s = summarizer();
        let content = "Rust ownership prevents data races at compile time. It is nice. \
            Borrow checking enforces aliasing rules for references and lifetimes. Yes it is. \
            Zero cost abstractions compile generics into specialized machine code. Ok.";
        let summary = s.extractive_summarize(content, 3);
        let own = summary.find("ownership").expect("ownership sentence kept");
        let borrow = summary.find("Borrow").expect("borrow sentence kept");
        let zero = summary.find("Zero").expect("zero-cost sentence kept");
        assert!(own < borrow && borrow < zero, "original order preserved: {summary}");
        assert!(!summary.contains("Ok."));
    }

    #[test]
    fn summary_length_is_bounded() {
        let s = summarizer();
        let long = format!("Lengthy {}end.", "words ".repeat(80));
        let content = std::iter::repeat(long.as_str()).take(6).collect::<Vec<_>>().join(" ");
        let summary = s.extractive_summarize(&content, 3);
        assert!(summary.chars().count() <= 500 + ELLIPSIS.len());
        assert!(summary.ends_with(ELLIPSIS));
    }

    #[test]
    fn stop_word_only_text_falls_back_to_truncation() {
        let s = Summarizer::new(SummarizerConfig { max_summary_length: 20, ..SummarizerConfig::default() });
        let content = "It is. It was. Is it? It is so. He is. She was.";
        let summary = s.extractive_summarize(content, 2);
        assert_eq!(summary, format!("{}{}", truncate_chars(content, 20).trim_end(), ELLIPSIS));
    }

    #[test]
    fn appends_terminal_punctuation() {
        let s = summarizer();
        let content = "Alpha rockets launch. Beta rockets land. Gamma satellites orbit. Delta probes wander";
        let summary = s.extractive_summarize(content, 3);
        assert!(ends_with_terminal_punctuation(&summary));
    }
}
