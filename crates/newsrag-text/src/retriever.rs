use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use newsrag_core::traits::{CorpusSource, LexicalSearch};
use newsrag_core::types::RetrievalHit;
use newsrag_core::timing::elapsed_ms;
use newsrag_core::RetrievalError;

use crate::index::LexicalIndex;

/// Lexical retriever over a [`CorpusSource`].
///
/// The first search builds the index if none exists. `refresh` rebuilds it
/// and publishes the new index with a single pointer swap; searches already
/// running keep the index they started with. A failed build leaves the
/// previous index in place. An empty corpus publishes no index, so the
/// next search lists the corpus again.
pub struct LexicalRetriever {
	corpus: Arc<dyn CorpusSource>,
	current: RwLock<Option<Arc<LexicalIndex>>>,
	build_lock: Mutex<()>,
}

impl LexicalRetriever {
	pub fn new(corpus: Arc<dyn CorpusSource>) -> Self {
		Self { corpus, current: RwLock::new(None), build_lock: Mutex::new(()) }
	}

	/// Rebuilds from the corpus source and returns the number of chunks indexed.
	pub async fn refresh(&self) -> Result<usize> {
		let _guard = self.build_lock.lock().await;
		self.rebuild().await
	}

	pub async fn is_built(&self) -> bool {
		self.current.read().await.is_some()
	}

	/// Chunks in the current index, zero when not yet built.
	pub async fn indexed_chunks(&self) -> usize {
		self.current.read().await.as_ref().map_or(0, |idx| idx.len())
	}

	async fn rebuild(&self) -> Result<usize> {
		let started = Instant::now();
		let chunks = match self.corpus.list_chunks(None).await {
			Ok(chunks) => chunks,
			Err(e) => {
				warn!(error = %e, "listing corpus for lexical index failed, keeping previous index");
				return Err(e);
			}
		};
		let count = chunks.len();
		if count == 0 {
			*self.current.write().await = None;
			warn!(reason = %RetrievalError::EmptyCorpus, elapsed_ms = elapsed_ms(started), "lexical index not built, will retry on next search");
			return Ok(0);
		}
		let index = tokio::task::spawn_blocking(move || LexicalIndex::build(chunks)).await??;
		*self.current.write().await = Some(Arc::new(index));
		info!(chunks = count, elapsed_ms = elapsed_ms(started), "lexical index rebuilt");
		Ok(count)
	}

	/// The published index, building it first if there is none. `None` when
	/// the corpus is empty.
	async fn current(&self) -> Result<Option<Arc<LexicalIndex>>> {
		if let Some(idx) = self.current.read().await.as_ref() {
			return Ok(Some(Arc::clone(idx)));
		}
		let _guard = self.build_lock.lock().await;
		if let Some(idx) = self.current.read().await.as_ref() {
			return Ok(Some(Arc::clone(idx)));
		}
		self.rebuild().await?;
		Ok(self.current.read().await.clone())
	}
}

#[async_trait]
impl LexicalSearch for LexicalRetriever {
	async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
		let Some(index) = self.current().await? else {
			return Ok(Vec::new());
		};
		let query = query.to_owned();
		tokio::task::spawn_blocking(move || index.search(&query, k)).await?
	}
}
