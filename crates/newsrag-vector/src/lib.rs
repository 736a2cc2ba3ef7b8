//! newsrag-vector
//!
//! LanceDB-backed chunk store. The same table serves as the corpus source
//! for the lexical index and as the nearest-neighbour store for vector
//! retrieval.
pub mod schema;
pub mod table;
pub mod writer;
pub mod store;

pub use store::LanceChunkStore;
pub use writer::ChunkWriter;
