//! Text embedding support for vector search.
//!
//! Tessera does not generate embeddings itself. Callers plug in a provider
//! (a local model, a remote API) through the [`TextEmbedder`] trait, and the
//! index uses it to turn document and query text into vectors.
//!
//! Provider failures are reported as
//! [`EmbeddingError`](crate::error::EmbeddingError) and reach the caller
//! unchanged; the index neither retries nor caches embedding calls.

pub mod text_embedder;

pub use text_embedder::TextEmbedder;
