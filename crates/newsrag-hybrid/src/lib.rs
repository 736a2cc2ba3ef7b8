//! Hybrid retrieval over a news chunk corpus.
//!
//! [`RetrievalEngine`] runs lexical and vector retrieval in parallel, fuses
//! them with Reciprocal Rank Fusion, optionally expands the query into
//! variants and reranks with a cross-encoder, and post-filters by date and
//! named entities. Sub-retriever failures degrade to empty lists; only the
//! failure of every branch is reported to the caller.

pub mod date;
pub mod engine;
pub mod expand;
pub mod filters;
pub mod fusion;
pub mod hybrid;
pub mod normalize;
pub mod rerank;
pub mod vector;

pub use date::ChronoDateParser;
pub use engine::{EngineParts, RetrievalEngine};
pub use expand::MultiQueryExpander;
pub use filters::{filter_by_entities, DateRange, EntityFilter, TemporalFilter};
pub use fusion::{fuse, DEFAULT_RRF_K};
pub use hybrid::{HybridOutcome, HybridRetriever};
pub use normalize::{bounded, similarity};
pub use rerank::{ModelStatus, RerankerAdapter};
pub use vector::VectorSearchAdapter;
