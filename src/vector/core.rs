//! Core data structures for vector search.
//!
//! This module contains the distance kernels, the document record and the
//! validation helpers for raw vectors.

pub mod distance;
pub mod document;
pub mod vector;
