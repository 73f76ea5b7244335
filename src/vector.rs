//! Exact vector search over an in-memory record store.
//!
//! Every query is an exhaustive scan: each stored vector is scored against
//! the query under a [`DistanceMetric`], and the best `k` records are returned.
//!
//! # Module Structure
//!
//! - `core`: Core data structures (distance kernels, documents, vector checks)
//! - `store`: The index-aligned vector/document record store
//! - `search`: Ranking, executors, cancellation and the query cache
//! - `index`: The named index façade that ties the pieces together

pub mod core;
pub mod index;
pub mod search;
pub mod store;

pub use self::core::distance::DistanceMetric;
pub use self::core::document::{Document, DocumentId};
pub use self::index::{IndexConfig, VectorIndex};
pub use self::search::QueryResult;
