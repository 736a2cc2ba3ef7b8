//! Read side of the chunk table.
use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use tracing::{debug, warn};

use newsrag_core::traits::{CorpusSource, VectorStore};
use newsrag_core::types::{Chunk, ChunkFilter, DocumentId, Metadata, Neighbor};

use crate::schema::{CHUNK_ID, CONTENT, DISTANCE, DOCUMENT_ID, METADATA, TOKEN_COUNT};
use crate::table::{in_list, open_db, table_exists};

pub struct LanceChunkStore {
	db: Connection,
	table_name: String,
}

impl LanceChunkStore {
	pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
		let db = open_db(uri).await?;
		Ok(Self { db, table_name: table_name.to_string() })
	}

	/// Rows in the chunk table; zero when it does not exist.
	pub async fn count(&self) -> Result<usize> {
		if !table_exists(&self.db, &self.table_name).await? {
			return Ok(0);
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		Ok(table.count_rows(None).await?)
	}
}

#[async_trait]
impl CorpusSource for LanceChunkStore {
	async fn list_chunks(&self, filter: Option<&ChunkFilter>) -> Result<Vec<Chunk>> {
		if !table_exists(&self.db, &self.table_name).await? {
			warn!(table = %self.table_name, "chunk table missing, corpus is empty");
			return Ok(Vec::new());
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut query = table
			.query()
			.select(Select::columns(&[CHUNK_ID, DOCUMENT_ID, CONTENT, TOKEN_COUNT, METADATA]));
		if let Some(ids) = filter.and_then(|f| f.document_ids.as_deref()) {
			if ids.is_empty() {
				return Ok(Vec::new());
			}
			query = query.only_if(in_list(DOCUMENT_ID, ids));
		}
		let mut stream = query.execute().await?;
		let mut chunks = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let rows = Rows::new(&batch)?;
			for i in 0..batch.num_rows() {
				chunks.push(Chunk {
					chunk_id: rows.chunk_id.value(i).to_string(),
					document_id: rows.document_id.value(i).to_string(),
					content: rows.content.value(i).to_string(),
					token_count: int_column(&batch, TOKEN_COUNT)?
						.map_or(0, |c| usize::try_from(c.value(i)).unwrap_or(0)),
					metadata: parse_metadata(rows.metadata.value(i)),
				});
			}
		}
		debug!(chunks = chunks.len(), "listed corpus");
		Ok(chunks)
	}
}

#[async_trait]
impl VectorStore for LanceChunkStore {
	async fn nearest_neighbors(
		&self,
		vector: &[f32],
		k: usize,
		document_ids: Option<&[DocumentId]>,
	) -> Result<Vec<Neighbor>> {
		if k == 0 || document_ids.is_some_and(<[DocumentId]>::is_empty) {
			return Ok(Vec::new());
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut query = table
			.vector_search(vector.to_vec())?
			.distance_type(DistanceType::Cosine)
			.limit(k);
		if let Some(ids) = document_ids {
			query = query.only_if(in_list(DOCUMENT_ID, ids));
		}
		let mut stream = query.execute().await?;
		let mut neighbors = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let rows = Rows::new(&batch)?;
			let distance = batch
				.column_by_name(DISTANCE)
				.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| anyhow!("vector search result is missing {DISTANCE}"))?;
			for i in 0..batch.num_rows() {
				neighbors.push(Neighbor {
					id: rows.chunk_id.value(i).to_string(),
					document_id: rows.document_id.value(i).to_string(),
					content: rows.content.value(i).to_string(),
					metadata: parse_metadata(rows.metadata.value(i)),
					similarity: 1.0 - distance.value(i),
				});
			}
		}
		Ok(neighbors)
	}
}

struct Rows<'a> {
	chunk_id: &'a StringArray,
	document_id: &'a StringArray,
	content: &'a StringArray,
	metadata: &'a StringArray,
}

impl<'a> Rows<'a> {
	fn new(batch: &'a RecordBatch) -> Result<Self> {
		Ok(Self {
			chunk_id: string_column(batch, CHUNK_ID)?,
			document_id: string_column(batch, DOCUMENT_ID)?,
			content: string_column(batch, CONTENT)?,
			metadata: string_column(batch, METADATA)?,
		})
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{name} column missing"))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a Int32Array>> {
	match batch.column_by_name(name) {
		None => Ok(None),
		Some(c) => c
			.as_any()
			.downcast_ref::<Int32Array>()
			.map(Some)
			.ok_or_else(|| anyhow!("{name} column has unexpected type {}", c.data_type())),
	}
}

fn parse_metadata(raw: &str) -> Metadata {
	serde_json::from_str(raw).unwrap_or_else(|e| {
		debug!(error = %e, "unparseable chunk metadata, using empty map");
		Metadata::new()
	})
}
