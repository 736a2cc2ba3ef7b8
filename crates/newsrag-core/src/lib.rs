//! newsrag-core
//!
//! Domain types, error taxonomy, capability traits, configuration and the
//! TTL caches shared by every other crate in the workspace.

pub mod cache;
pub mod config;
pub mod error;
pub mod traits;
pub mod timing;
pub mod types;

pub use error::{Branch, EmbedError, Error, Result, RetrievalError};
pub use types::{
    Chunk, ChunkFilter, ChunkId, DateFilter, DocumentId, FusedResult, Metadata, Neighbor,
    RankedResult, RetrievalHit, RetrieveOptions, RetrieveResponse, ScoreKind, SearchMode,
};
