//! Domain types shared by the lexical, vector and fusion layers.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;
pub type DocumentId = String;

/// Open key/value metadata attached to a chunk (`published_date`,
/// `companies`, `investors`, `sectors`, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The atomic retrievable unit produced by ingestion.
///
/// - `chunk_id`: globally unique chunk identifier
/// - `document_id`: identity of the parent article
/// - `content`: the text payload of the chunk
/// - `token_count`: size estimate recorded at chunking time
/// - `metadata`: extracted facts about the parent article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
    #[serde(default)]
    pub token_count: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Restricts which chunks a corpus listing returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFilter {
    pub document_ids: Option<Vec<DocumentId>>,
}

/// Indicates which retriever produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Lexical,
    Vector,
}

/// One entry of a single retriever's ranked list.
///
/// Rank is positional within the list it came from and is not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
    pub metadata: Metadata,
    pub score: f64,
    pub score_kind: ScoreKind,
}

impl RetrievalHit {
    pub fn from_chunk(chunk: &Chunk, score: f64, score_kind: ScoreKind) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            document_id: chunk.document_id.clone(),
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            score,
            score_kind,
        }
    }
}

/// A row returned by the external nearest-neighbour service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
    pub metadata: Metadata,
    pub similarity: f32,
}

/// Accumulator for one chunk across every fused source list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
    pub metadata: Metadata,
    pub rrf_score: f64,
    pub lexical_score: Option<f64>,
    pub vector_score: Option<f64>,
}

impl FusedResult {
    /// Starts an accumulator from the first hit seen for a chunk.
    pub fn from_hit(hit: &RetrievalHit) -> Self {
        let (lexical_score, vector_score) = match hit.score_kind {
            ScoreKind::Lexical => (Some(hit.score), None),
            ScoreKind::Vector => (None, Some(hit.score)),
        };
        Self {
            chunk_id: hit.chunk_id.clone(),
            document_id: hit.document_id.clone(),
            content: hit.content.clone(),
            metadata: hit.metadata.clone(),
            rrf_score: 0.0,
            lexical_score,
            vector_score,
        }
    }

    /// Best available ordering score: rrf, then vector, then lexical.
    pub fn priority_score(&self) -> f64 {
        if self.rrf_score > 0.0 {
            return self.rrf_score;
        }
        self.vector_score.or(self.lexical_score).unwrap_or(0.0)
    }
}

/// Final, user-facing result. `similarity` is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub content: String,
    pub metadata: Metadata,
    pub document_id: DocumentId,
    pub chunk_id: ChunkId,
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrf_score: Option<f64>,
}

/// A date constraint as supplied by a caller, before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateFilter {
    /// Named preset such as `last_week`, or a free-form date meaning "since".
    Preset(String),
    Range {
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
}

/// Options accepted by `RetrievalEngine::retrieve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub use_hybrid: bool,
    pub use_multi_query: bool,
    pub use_reranking: bool,
    pub rerank_top_n: usize,
    pub date_filter: Option<DateFilter>,
    pub company_filter: Option<Vec<String>>,
    pub investor_filter: Option<Vec<String>>,
    pub sector_filter: Option<Vec<String>>,
    pub filter_document_ids: Option<Vec<DocumentId>>,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            use_hybrid: true,
            use_multi_query: false,
            use_reranking: false,
            rerank_top_n: 20,
            date_filter: None,
            company_filter: None,
            investor_filter: None,
            sector_filter: None,
            filter_document_ids: None,
        }
    }
}

impl RetrieveOptions {
    /// Canonical form used for cache keys: list filters are trimmed, sorted
    /// and deduplicated, and empty lists collapse to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            company_filter: normalize_terms(self.company_filter.as_deref()),
            investor_filter: normalize_terms(self.investor_filter.as_deref()),
            sector_filter: normalize_terms(self.sector_filter.as_deref()),
            filter_document_ids: normalize_terms(self.filter_document_ids.as_deref()),
            ..self.clone()
        }
    }
}

fn normalize_terms(terms: Option<&[String]>) -> Option<Vec<String>> {
    let mut out: Vec<String> = terms?
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    if out.is_empty() { None } else { Some(out) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Hybrid,
    Vector,
}

/// Result list plus the facts about how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub results: Vec<RankedResult>,
    pub count: usize,
    pub search_mode: SearchMode,
    pub reranking_applied: bool,
    pub variants: Vec<String>,
}
