use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const CHUNK_ID: &str = "chunk_id";
pub const DOCUMENT_ID: &str = "document_id";
pub const CONTENT: &str = "content";
pub const TOKEN_COUNT: &str = "token_count";
/// Chunk metadata serialized as a JSON object.
pub const METADATA: &str = "metadata";
pub const VECTOR: &str = "vector";
/// Cosine distance column added by vector search.
pub const DISTANCE: &str = "_distance";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(CHUNK_ID, DataType::Utf8, false),
		Field::new(DOCUMENT_ID, DataType::Utf8, false),
		Field::new(CONTENT, DataType::Utf8, false),
		Field::new(TOKEN_COUNT, DataType::Int32, false),
		Field::new(METADATA, DataType::Utf8, false),
		Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
