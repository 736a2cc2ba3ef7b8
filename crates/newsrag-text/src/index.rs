use anyhow::{anyhow, Result};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::debug;

use newsrag_core::types::{Chunk, RetrievalHit, ScoreKind};

use crate::tantivy_utils::{build_schema, query_terms, register_tokenizer, CONTENT_FIELD, ORD_FIELD};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// One immutable BM25 index over a corpus snapshot.
///
/// Rebuilding means constructing a new `LexicalIndex`; an existing one is
/// never mutated, so searches holding it are unaffected by a rebuild.
pub struct LexicalIndex {
	chunks: Vec<Chunk>,
	engine: Option<Engine>,
}

struct Engine {
	searcher: Searcher,
	content_field: Field,
	ord_field: Field,
}

impl LexicalIndex {
	pub fn build(chunks: Vec<Chunk>) -> Result<Self> {
		if chunks.is_empty() {
			debug!("building lexical index over an empty corpus");
			return Ok(Self { chunks, engine: None });
		}
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let content_field = schema.get_field(CONTENT_FIELD)?;
		let ord_field = schema.get_field(ORD_FIELD)?;

		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
		for (ord, chunk) in chunks.iter().enumerate() {
			index_writer.add_document(doc!(
				content_field => chunk.content.clone(),
				ord_field => u64::try_from(ord)?,
			))?;
		}
		index_writer.commit()?;

		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let searcher = reader.searcher();
		debug!(chunks = chunks.len(), "lexical index built");
		Ok(Self { chunks, engine: Some(Engine { searcher, content_field, ord_field }) })
	}

	/// Number of chunks indexed.
	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	/// Top `k` chunks sharing at least one term with `query`, by descending
	/// BM25 score; equal scores keep corpus order.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
		let Some(engine) = &self.engine else { return Ok(Vec::new()) };
		let terms = query_terms(query);
		if k == 0 || terms.is_empty() {
			return Ok(Vec::new());
		}

		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(engine.content_field, t);
				let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		// Collect every match so ties at the cut-off resolve by corpus order.
		let top_docs = engine.searcher.search(&query, &TopDocs::with_limit(self.chunks.len()))?;
		let mut scored: Vec<(f32, usize)> = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = engine.searcher.doc(addr)?;
			let ord = doc
				.get_first(engine.ord_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| anyhow!("indexed document is missing its ord"))?;
			scored.push((score, usize::try_from(ord)?));
		}
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
		scored.truncate(k);

		Ok(scored
			.into_iter()
			.filter_map(|(score, ord)| {
				self.chunks.get(ord).map(|c| RetrievalHit::from_chunk(c, f64::from(score), ScoreKind::Lexical))
			})
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(id: &str, content: &str) -> Chunk {
		Chunk {
			chunk_id: id.to_string(),
			document_id: format!("doc-{id}"),
			content: content.to_string(),
			token_count: content.split_whitespace().count(),
			metadata: Default::default(),
		}
	}

	fn ids(hits: &[RetrievalHit]) -> Vec<&str> {
		hits.iter().map(|h| h.chunk_id.as_str()).collect()
	}

	#[test]
	fn higher_term_frequency_ranks_first() {
		let index = LexicalIndex::build(vec![
			chunk("c1", "weather report for monday"),
			chunk("c2", "funding funding round closes"),
			chunk("c3", "funding news arrives today"),
		])
		.unwrap();
		let hits = index.search("funding", 10).unwrap();
		assert_eq!(ids(&hits), vec!["c2", "c3"]);
		assert!(hits[0].score > hits[1].score);
		assert!(hits.iter().all(|h| h.score_kind == ScoreKind::Lexical));
	}

	#[test]
	fn ties_keep_corpus_order() {
		let index = LexicalIndex::build(vec![
			chunk("z", "apple banana"),
			chunk("a", "apple banana"),
			chunk("m", "cherry"),
			chunk("b", "apple banana"),
		])
		.unwrap();
		let hits = index.search("apple", 2).unwrap();
		assert_eq!(ids(&hits), vec!["z", "a"]);
		let hits = index.search("apple", 10).unwrap();
		assert_eq!(ids(&hits), vec!["z", "a", "b"]);
	}

	#[test]
	fn matching_is_case_insensitive() {
		let index = LexicalIndex::build(vec![chunk("c1", "Anthropic raises Series C")]).unwrap();
		assert_eq!(ids(&index.search("ANTHROPIC series", 5).unwrap()), vec!["c1"]);
	}

	#[test]
	fn empty_inputs_give_empty_results() {
		let empty = LexicalIndex::build(vec![]).unwrap();
		assert!(empty.is_empty());
		assert!(empty.search("anything", 5).unwrap().is_empty());

		let index = LexicalIndex::build(vec![chunk("c1", "hello world")]).unwrap();
		assert!(index.search("", 5).unwrap().is_empty());
		assert!(index.search("hello", 0).unwrap().is_empty());
		assert!(index.search("absent", 5).unwrap().is_empty());
	}

	#[test]
	fn hits_carry_chunk_fields() {
		let mut c = chunk("c1", "robotics startup");
		c.metadata.insert("source".into(), "wire".into());
		let index = LexicalIndex::build(vec![c.clone()]).unwrap();
		let hit = &index.search("robotics", 1).unwrap()[0];
		assert_eq!(hit.document_id, c.document_id);
		assert_eq!(hit.content, c.content);
		assert_eq!(hit.metadata, c.metadata);
	}
}
