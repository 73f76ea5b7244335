//! # Tessera
//!
//! An embedded, exact similarity-search index for dense `f32` vectors.
//!
//! ## Features
//!
//! - Six scoring kernels: cosine, jaccard, euclidean, manhattan, chebyshev, canberra
//! - Exhaustive top-k ranking, parallelized with rayon
//! - Deterministic ordering of equal scores (insertion order)
//! - Result cache keyed by query vector content
//! - Two-file, LZ4-compressed, checksummed persistence with a clean/dirty flag
//! - Pluggable text embedders

pub mod embedding;
pub mod error;
pub mod storage;
pub mod vector;

pub mod prelude {
    pub use crate::embedding::TextEmbedder;
    pub use crate::error::{EmbeddingError, ErrorKind, Result, TesseraError};
    pub use crate::storage::PersistenceConfig;
    pub use crate::vector::search::cancel::CancellationToken;
    pub use crate::vector::{
        DistanceMetric, Document, DocumentId, IndexConfig, QueryResult, VectorIndex,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
