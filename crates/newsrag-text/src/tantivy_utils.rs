use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "lower_whitespace";
pub const CONTENT_FIELD: &str = "content";
pub const ORD_FIELD: &str = "ord";

/// BM25 term-saturation constant used by tantivy's scorer.
pub const BM25_K1: f32 = 1.2;
/// BM25 length-normalization constant used by tantivy's scorer.
pub const BM25_B: f32 = 0.75;

/// `content` is indexed only; `ord` is the chunk's position in the corpus
/// listing and maps a hit back to its chunk.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let indexing = TextFieldIndexing::default()
		.set_tokenizer(TOKENIZER_NAME)
		.set_index_option(IndexRecordOption::WithFreqs);
	let content_options = TextOptions::default().set_indexing_options(indexing);
	let _content_field = schema_builder.add_text_field(CONTENT_FIELD, content_options);
	let _ord_field = schema_builder.add_u64_field(ORD_FIELD, INDEXED | STORED);
	schema_builder.build()
}

/// Whitespace split plus lowercasing. No stemming, no stop words.
pub fn analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(WhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, analyzer());
}

/// Query terms in first-seen order, duplicates removed.
pub fn query_terms(query: &str) -> Vec<String> {
	let mut analyzer = analyzer();
	let mut stream = analyzer.token_stream(query);
	let mut terms: Vec<String> = Vec::new();
	while stream.advance() {
		let text = &stream.token().text;
		if !terms.iter().any(|t| t == text) {
			terms.push(text.clone());
		}
	}
	terms
}
