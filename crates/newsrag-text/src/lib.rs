//! newsrag-text
//!
//! Tantivy-backed BM25 lexical retrieval over the chunk corpus. `index`
//! holds one immutable in-RAM index; `retriever` owns the current index,
//! builds it lazily from a corpus source and swaps in rebuilds atomically.
pub mod tantivy_utils;
pub mod index;
pub mod retriever;

pub use index::LexicalIndex;
pub use retriever::LexicalRetriever;
