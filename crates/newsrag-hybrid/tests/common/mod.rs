#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use newsrag_core::cache::{EmbeddingCache, ResultCache};
use newsrag_core::config::Settings;
use newsrag_core::traits::{
    CrossEncoder, CrossEncoderLoader, EmbeddingService, LexicalSearch, QueryExpansionService, VectorStore,
};
use newsrag_core::types::{DocumentId, Metadata, Neighbor, RetrievalHit, ScoreKind};
use newsrag_core::EmbedError;
use newsrag_hybrid::{ChronoDateParser, EngineParts, RetrievalEngine};

pub fn metadata(value: Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

pub fn lexical_hit(id: &str, score: f64, meta: Value) -> RetrievalHit {
    RetrievalHit {
        chunk_id: id.to_string(),
        document_id: format!("doc-{id}"),
        content: format!("content of {id}"),
        metadata: metadata(meta),
        score,
        score_kind: ScoreKind::Lexical,
    }
}

pub fn neighbor(id: &str, similarity: f32, meta: Value) -> Neighbor {
    Neighbor {
        id: id.to_string(),
        document_id: format!("doc-{id}"),
        content: format!("content of {id}"),
        metadata: metadata(meta),
        similarity,
    }
}

/// Lexical search returning canned hits, optionally per query.
#[derive(Default)]
pub struct FakeLexical {
    pub hits: Vec<RetrievalHit>,
    pub by_query: HashMap<String, Vec<RetrievalHit>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeLexical {
    pub fn with_hits(hits: Vec<RetrievalHit>) -> Self {
        Self { hits, ..Self::default() }
    }
}

#[async_trait]
impl LexicalSearch for FakeLexical {
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievalHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("index unavailable");
        }
        let hits = self.by_query.get(query).unwrap_or(&self.hits);
        Ok(hits.iter().take(k).cloned().collect())
    }
}

/// Vector store returning canned neighbours and recording its filters.
#[derive(Default)]
pub struct FakeVectorStore {
    pub neighbors: Vec<Neighbor>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    pub last_filter: Mutex<Option<Vec<DocumentId>>>,
}

impl FakeVectorStore {
    pub fn with_neighbors(neighbors: Vec<Neighbor>) -> Self {
        Self { neighbors, ..Self::default() }
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn nearest_neighbors(
        &self,
        _vector: &[f32],
        k: usize,
        document_ids: Option<&[DocumentId]>,
    ) -> anyhow::Result<Vec<Neighbor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_filter.lock().unwrap() = document_ids.map(<[DocumentId]>::to_vec);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("vector store connection refused");
        }
        Ok(self
            .neighbors
            .iter()
            .filter(|n| document_ids.map_or(true, |ids| ids.contains(&n.document_id)))
            .take(k)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl EmbeddingService for FakeEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbedError::RetriesExhausted { attempts: 4, last: "connection refused".into() });
        }
        Ok(vec![0.5; 4])
    }
}

pub struct FakeExpansion {
    pub variants: anyhow::Result<Vec<String>>,
    pub calls: AtomicUsize,
}

impl FakeExpansion {
    pub fn new(variants: &[&str]) -> Self {
        Self { variants: Ok(variants.iter().map(|v| v.to_string()).collect()), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { variants: Err(anyhow::anyhow!("llm timed out")), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl QueryExpansionService for FakeExpansion {
    async fn generate_variants(&self, _query: &str) -> anyhow::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.variants {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(anyhow::anyhow!("{e}")),
        }
    }
}

/// Scores passages from a fixed table keyed by content; unknown passages
/// score zero.
pub struct TableCrossEncoder(pub HashMap<String, f32>);

impl CrossEncoder for TableCrossEncoder {
    fn score_pairs(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>> {
        Ok(pairs.iter().map(|(_, p)| self.0.get(p).copied().unwrap_or(0.0)).collect())
    }
}

pub struct TableLoader {
    pub scores: HashMap<String, f32>,
    pub loads: Arc<AtomicUsize>,
    pub fail: bool,
}

impl CrossEncoderLoader for TableLoader {
    fn load(&self) -> anyhow::Result<Box<dyn CrossEncoder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("model directory not found");
        }
        Ok(Box::new(TableCrossEncoder(self.scores.clone())))
    }
}

pub fn scores_for(ids_and_scores: &[(&str, f32)]) -> HashMap<String, f32> {
    ids_and_scores.iter().map(|(id, s)| (format!("content of {id}"), *s)).collect()
}

/// Fakes plus the engine wired from them.
pub struct Harness {
    pub lexical: Arc<FakeLexical>,
    pub vector: Arc<FakeVectorStore>,
    pub embedder: Arc<FakeEmbedder>,
    pub expansion: Option<Arc<FakeExpansion>>,
    pub result_cache: Arc<ResultCache>,
    pub embedding_cache: Arc<EmbeddingCache>,
    pub engine: RetrievalEngine,
}

pub struct HarnessBuilder {
    lexical: FakeLexical,
    vector: FakeVectorStore,
    expansion: Option<FakeExpansion>,
    reranker: Option<TableLoader>,
    settings: Settings,
}

impl HarnessBuilder {
    pub fn new(lexical: FakeLexical, vector: FakeVectorStore) -> Self {
        Self { lexical, vector, expansion: None, reranker: None, settings: Settings::default() }
    }

    pub fn expansion(mut self, expansion: FakeExpansion) -> Self {
        self.expansion = Some(expansion);
        self
    }

    pub fn reranker(mut self, loader: TableLoader) -> Self {
        self.reranker = Some(loader);
        self
    }

    pub fn settings(mut self, f: impl FnOnce(&mut Settings)) -> Self {
        f(&mut self.settings);
        self
    }

    pub fn build(self) -> Harness {
        let lexical = Arc::new(self.lexical);
        let vector = Arc::new(self.vector);
        let embedder = Arc::new(FakeEmbedder::default());
        let expansion = self.expansion.map(Arc::new);
        let result_cache = Arc::new(ResultCache::new(Duration::from_secs(60)));
        let embedding_cache = Arc::new(EmbeddingCache::new(Duration::from_secs(600)));
        let engine = RetrievalEngine::new(
            EngineParts {
                lexical: lexical.clone(),
                embedder: embedder.clone(),
                vector_store: vector.clone(),
                expansion: expansion.clone().map(|e| e as Arc<dyn QueryExpansionService>),
                cross_encoder: self.reranker.map(|l| Box::new(l) as Box<dyn CrossEncoderLoader>),
                date_parser: Arc::new(ChronoDateParser),
                result_cache: result_cache.clone(),
                embedding_cache: Some(embedding_cache.clone()),
            },
            &self.settings,
        );
        Harness { lexical, vector, embedder, expansion, result_cache, embedding_cache, engine }
    }
}
