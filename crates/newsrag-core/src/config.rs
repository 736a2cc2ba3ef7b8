//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `NEWSRAG_*` env vars (`__` separates nesting, e.g.
//! `NEWSRAG_RETRIEVAL__TOP_K=5`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against the config directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(base_dir, &env_name)
    }

    pub fn load_for_env(base_dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("NEWSRAG_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration tree.
    pub fn settings(&self) -> Result<Settings, Error> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub cache: CacheSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub reranker: RerankerSettings,
    pub expansion: ExpansionSettings,
    pub filters: FilterSettings,
    pub storage: StorageSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        if r.rrf_k == 0 {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be > 0".into()));
        }
        if !(1..=100).contains(&r.top_k) {
            return Err(Error::InvalidConfig(format!("retrieval.top_k must be in 1..=100, got {}", r.top_k)));
        }
        if r.variant_concurrency == 0 || r.candidate_multiplier == 0 || r.source_oversample == 0 {
            return Err(Error::InvalidConfig(
                "retrieval.variant_concurrency, candidate_multiplier and source_oversample must be > 0".into(),
            ));
        }
        if !(1..=5).contains(&self.expansion.max_variants) {
            return Err(Error::InvalidConfig(format!(
                "expansion.max_variants must be in 1..=5, got {}",
                self.expansion.max_variants
            )));
        }
        if self.cache.enabled && (self.cache.result_ttl_secs == 0 || self.cache.embedding_ttl_secs == 0) {
            return Err(Error::InvalidConfig("cache TTLs must be > 0 when caching is enabled".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// RRF smoothing constant; larger values flatten rank differences.
    pub rrf_k: u32,
    pub top_k: usize,
    pub rerank_top_n: usize,
    /// Candidates gathered per requested result before filtering/reranking.
    pub candidate_multiplier: usize,
    /// Extra depth fetched from each source before fusion.
    pub source_oversample: usize,
    pub variant_concurrency: usize,
    pub branch_timeout_ms: u64,
    pub min_vector_similarity: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            top_k: 10,
            rerank_top_n: 20,
            candidate_multiplier: 2,
            source_oversample: 2,
            variant_concurrency: 3,
            branch_timeout_ms: 10_000,
            min_vector_similarity: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub result_ttl_secs: u64,
    pub embedding_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true, result_ttl_secs: 3600, embedding_ttl_secs: 86_400 * 7 }
    }
}

/// Remote LLM service used for embeddings and query rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_id: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8003".to_string(),
            timeout_secs: 60,
            user_id: "rag-service".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote LLM service.
    Http,
    /// candle model loaded from `embedding.model_dir`.
    Local,
    /// Deterministic hashing embedder for tests and offline development.
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model_dir: String,
    pub dimension: usize,
    pub max_len: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Http,
            model_dir: "models/bge-m3".to_string(),
            dimension: 1024,
            max_len: 256,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    pub enabled: bool,
    pub model_dir: String,
    pub max_len: usize,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self { enabled: true, model_dir: "models/bge-reranker-base".to_string(), max_len: 512 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSettings {
    /// Upper bound on variants, the original query included.
    pub max_variants: usize,
    pub temperature: f32,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self { max_variants: 5, temperature: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Named date presets, in days back from now.
    pub date_presets: BTreeMap<String, u32>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        let date_presets = [
            ("today", 1),
            ("last_24_hours", 1),
            ("last_week", 7),
            ("last_month", 30),
            ("last_3_months", 90),
            ("last_year", 365),
        ]
        .into_iter()
        .map(|(name, days)| (name.to_string(), days))
        .collect();
        Self { date_presets }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub lancedb_dir: String,
    pub chunks_table: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { lancedb_dir: "data/lancedb".to_string(), chunks_table: "chunks".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
