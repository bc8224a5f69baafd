//! Vector similarity search for the Weft query engine.
//!
//! # Overview
//!
//! - [`EmbeddingProvider`]: text → embedding
//! - [`VectorStore`]: nearest-neighbour queries over chunk embeddings
//! - [`VectorSearchAdapter`]: the engine-facing semantic signal, with
//!   pooling, retry, and deadline handling
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use weft_core::{Chunk, RequestContext};
//! use weft_vector::{HashEmbeddingProvider, InMemoryVectorStore, VectorSearchAdapter};
//!
//! # tokio_test::block_on(async {
//! let provider = Arc::new(HashEmbeddingProvider::default());
//! let mut store = InMemoryVectorStore::new();
//! store.insert(
//!     Chunk::new("c1", "FastAPI OAuth2", "Password bearer flow")
//!         .with_embedding(provider.embed_text("FastAPI OAuth2")),
//! );
//!
//! let adapter = VectorSearchAdapter::new(Arc::new(store), provider);
//! let ctx = RequestContext::new(Duration::from_secs(1));
//! let embedding = adapter.embed(&ctx, "fastapi oauth2").await.unwrap();
//! let results = adapter.semantic_search(&ctx, &embedding, 5, 0.0).await.unwrap();
//! assert_eq!(results[0].id, "c1");
//! # });
//! ```

pub mod adapter;
pub mod embedding;
pub mod store;

pub use adapter::VectorSearchAdapter;
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use store::{InMemoryVectorStore, ScoredChunk, VectorQuery, VectorStore, cosine_similarity};
