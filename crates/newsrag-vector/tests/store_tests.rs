use newsrag_core::traits::{CorpusSource, Embedder, VectorStore};
use newsrag_core::types::{Chunk, ChunkFilter};
use newsrag_embed::HashEmbedder;
use newsrag_vector::{ChunkWriter, LanceChunkStore};
use serde_json::json;
use tempfile::TempDir;

const DIM: usize = 64;
const TABLE: &str = "chunks_test";

fn chunk(id: &str, doc: &str, content: &str) -> Chunk {
    let mut metadata = serde_json::Map::new();
    metadata.insert("published_date".into(), json!("2024-05-01"));
    metadata.insert("companies".into(), json!([{ "name": "Acme Robotics" }]));
    Chunk {
        chunk_id: id.to_string(),
        document_id: doc.to_string(),
        content: content.to_string(),
        token_count: content.split_whitespace().count(),
        metadata,
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("c1", "d1", "acme robotics raises series b"),
        chunk("c2", "d1", "warehouse automation demand grows"),
        chunk("c3", "d2", "solar panel prices fall again"),
        chunk("c4", "d3", "central bank holds interest rates"),
    ]
}

async fn seeded() -> (TempDir, LanceChunkStore, HashEmbedder) {
    let tmp = TempDir::new().expect("tmp");
    let uri = tmp.path().to_string_lossy().to_string();
    let embedder = HashEmbedder::new(DIM);
    let chunks = corpus();
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).expect("embed");
    let writer = ChunkWriter::new(&uri, TABLE, DIM).await.expect("writer");
    assert_eq!(writer.write(&chunks, &embeddings).await.expect("write"), 4);
    let store = LanceChunkStore::open(&uri, TABLE).await.expect("store");
    (tmp, store, embedder)
}

#[tokio::test]
async fn lists_chunks_with_metadata() {
    let (_tmp, store, _) = seeded().await;
    let mut chunks = store.list_chunks(None).await.expect("list");
    chunks.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
    assert_eq!(chunks, corpus());
    assert_eq!(store.count().await.expect("count"), 4);
}

#[tokio::test]
async fn listing_honours_document_filter() {
    let (_tmp, store, _) = seeded().await;
    let filter = ChunkFilter { document_ids: Some(vec!["d1".into()]) };
    let chunks = store.list_chunks(Some(&filter)).await.expect("list");
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.document_id == "d1"));
}

#[tokio::test]
async fn exact_text_is_nearest_neighbor() {
    let (_tmp, store, embedder) = seeded().await;
    let q = embedder.embed_text("solar panel prices fall again");
    let hits = store.nearest_neighbors(&q, 3, None).await.expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "c3");
    assert!((hits[0].similarity - 1.0).abs() < 1e-3);
    assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert_eq!(hits[0].metadata["companies"][0]["name"], "Acme Robotics");
}

#[tokio::test]
async fn nearest_neighbors_respect_document_filter() {
    let (_tmp, store, embedder) = seeded().await;
    let q = embedder.embed_text("solar panel prices fall again");
    let ids = vec!["d1".to_string()];
    let hits = store.nearest_neighbors(&q, 10, Some(&ids)).await.expect("search");
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.document_id == "d1"));
}

#[tokio::test]
async fn rewriting_a_chunk_does_not_duplicate_it() {
    let (tmp, store, embedder) = seeded().await;
    let uri = tmp.path().to_string_lossy().to_string();
    let writer = ChunkWriter::new(&uri, TABLE, DIM).await.expect("writer");
    let updated = vec![chunk("c1", "d1", "acme robotics closes series b")];
    let emb = embedder.embed_batch(&[updated[0].content.clone()]).expect("embed");
    writer.write(&updated, &emb).await.expect("write");
    assert_eq!(store.count().await.expect("count"), 4);
    let chunks = store.list_chunks(None).await.expect("list");
    let c1 = chunks.iter().find(|c| c.chunk_id == "c1").expect("c1");
    assert_eq!(c1.content, "acme robotics closes series b");
}

#[tokio::test]
async fn missing_table_is_an_empty_corpus() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceChunkStore::open(&tmp.path().to_string_lossy(), "absent").await.expect("store");
    assert!(store.list_chunks(None).await.expect("list").is_empty());
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn writer_rejects_wrong_dimension() {
    let tmp = TempDir::new().expect("tmp");
    let writer = ChunkWriter::new(&tmp.path().to_string_lossy(), TABLE, DIM).await.expect("writer");
    let chunks = vec![chunk("c1", "d1", "text")];
    assert!(writer.write(&chunks, &[vec![0.0; DIM + 1]]).await.is_err());
}
