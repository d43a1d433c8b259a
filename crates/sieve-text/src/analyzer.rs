use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

pub const STOP_WORDS: &[&str] = &[
	"a","about","above","after","again","against","all","am","an","and","any","are","as","at","be","because","been","before","being","below",
	"between","both","but","by","can","could","did","do","does","doing","down","during","each","few","for","from","further","had","has","have",
	"having","he","her","here","hers","herself","him","himself","his","how","i","if","in","into","is","it","its","itself","just","may","me","might",
	"more","most","must","my","myself","no","nor","not","now","of","off","on","once","only","or","other","our","ours","ourselves","out","over","own",
	"same","shall","she","should","so","some","such","than","that","the","their","theirs","them","themselves","then","there","these","they","this",
	"those","through","to","too","under","until","up","very","was","we","were","what","when","where","which","while","who","whom","whose","why",
	"will","with","would","you","your","yours","yourself","yourselves","also","many","much","every","via","using","used","use",
];

const MAX_TOKEN_LEN: usize = 40;

pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}

/// Lowercasing, stop-word-free tokenizer shared by the vectorizer and the summarizer.
///
/// Single-character tokens are dropped, matching the usual `\w\w+` token pattern.
pub struct Analyzer {
	inner: TextAnalyzer,
}

impl Default for Analyzer {
	fn default() -> Self { Self { inner: build_analyzer() } }
}

impl Analyzer {
	pub fn new() -> Self { Self::default() }

	pub fn tokens(&mut self, text: &str) -> Vec<String> {
		let mut out = Vec::new();
		let mut stream = self.inner.token_stream(text);
		while stream.advance() {
			let token = &stream.token().text;
			if token.chars().count() >= 2 { out.push(token.clone()); }
		}
		out
	}
}
