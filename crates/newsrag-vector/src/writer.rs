use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::{debug, info};

use newsrag_core::types::Chunk;

use crate::schema::build_chunk_schema;
use crate::table::{open_db, table_exists};

const BATCH_SIZE: usize = 1000;

/// Upserts chunks and their embeddings into the chunk table, keyed by
/// `chunk_id`.
pub struct ChunkWriter {
	db: Connection,
	table_name: String,
	dim: i32,
	show_progress: bool,
}

impl ChunkWriter {
	pub async fn new(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
		let db = open_db(uri).await?;
		Ok(Self { db, table_name: table_name.to_string(), dim: i32::try_from(dim)?, show_progress: false })
	}

	pub fn with_progress(mut self, show: bool) -> Self {
		self.show_progress = show;
		self
	}

	/// Returns the number of rows written.
	pub async fn write(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
		if chunks.is_empty() {
			info!(table = %self.table_name, "no chunks to write");
			return Ok(0);
		}
		ensure!(chunks.len() == embeddings.len(), "chunks ({}) and embeddings ({}) length must match", chunks.len(), embeddings.len());
		let expected = usize::try_from(self.dim)?;
		if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
			anyhow::bail!("embedding has {} dimensions, table expects {}", bad.len(), expected);
		}

		info!(chunks = chunks.len(), table = %self.table_name, "writing chunks to LanceDB");
		let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
		pb.set_style(
			ProgressStyle::default_bar()
				.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
				.progress_chars("#>-"),
		);
		let mut written = 0usize;
		for (chunk_batch, emb_batch) in chunks.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
			self.upsert_batch(chunk_batch, emb_batch).await?;
			written += chunk_batch.len();
			pb.set_position(written as u64);
			debug!(written, "chunk batch upserted");
		}
		pb.finish_with_message("done");
		info!(written, table = %self.table_name, "chunks written");
		Ok(written)
	}

	async fn upsert_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
		let record_batch = self.to_record_batch(chunks, embeddings)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if table_exists(&self.db, &self.table_name).await? {
			let table = self.db.open_table(&self.table_name).execute().await?;
			let mut merge = table.merge_insert(&["chunk_id"]);
			merge.when_matched_update_all(None).when_not_matched_insert_all();
			merge.execute(reader).await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}

	fn to_record_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let schema = build_chunk_schema(self.dim);
		let mut ids = Vec::with_capacity(chunks.len());
		let mut doc_ids = Vec::with_capacity(chunks.len());
		let mut contents = Vec::with_capacity(chunks.len());
		let mut token_counts = Vec::with_capacity(chunks.len());
		let mut metadata = Vec::with_capacity(chunks.len());
		for c in chunks {
			ids.push(c.chunk_id.clone());
			doc_ids.push(c.document_id.clone());
			contents.push(c.content.clone());
			token_counts.push(i32::try_from(c.token_count).unwrap_or(i32::MAX));
			metadata.push(serde_json::to_string(&c.metadata)?);
		}
		let vectors = embeddings.iter().map(|e| Some(e.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_ids)),
			Arc::new(StringArray::from(contents)),
			Arc::new(Int32Array::from(token_counts)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, self.dim)),
		])?;
		Ok(record_batch)
	}
}
