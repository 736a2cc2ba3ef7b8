use std::fmt;

use thiserror::Error;

/// The retrieval branch a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Lexical,
    Vector,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Lexical => f.write_str("lexical"),
            Branch::Vector => f.write_str("vector"),
        }
    }
}

/// Failure modes of the retrieval pipeline.
///
/// Only `AllSourcesFailed` reaches callers of the engine; every other
/// variant is logged and degraded locally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrievalError {
    #[error("{branch} retrieval unavailable: {reason}")]
    RetrievalUnavailable { branch: Branch, reason: String },

    #[error("{branch} retrieval timed out after {elapsed_ms} ms")]
    Timeout { branch: Branch, elapsed_ms: u64 },

    #[error("query expansion failed: {0}")]
    ExpansionFailed(String),

    #[error("reranker unavailable: {0}")]
    RerankUnavailable(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("all retrieval sources failed for '{query}' across {variants} variant(s)")]
    AllSourcesFailed { query: String, variants: usize },
}

impl RetrievalError {
    pub fn unavailable(branch: Branch, reason: impl fmt::Display) -> Self {
        Self::RetrievalUnavailable { branch, reason: reason.to_string() }
    }
}

/// Errors raised by embedding services.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Transient(String),

    #[error("embedding failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

pub type Result<T> = std::result::Result<T, Error>;
