//! On-disk persistence for vector indexes.
//!
//! Every index is stored in its own directory under a caller-chosen root:
//!
//! ```text
//! <root>/<index name>/vectors.bin    framed, LZ4 block-compressed f32 vectors
//! <root>/<index name>/documents.bin  framed, LZ4 block-compressed documents
//! ```
//!
//! - `codec`: the self-describing frame format shared by both files
//! - `files`: writing and reading the two-file layout of one index

pub mod codec;
pub mod files;

use serde::{Deserialize, Serialize};

/// Default number of raw bytes per compressed block (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 20;

/// Default upper bound on a decoded payload (1 GiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 1 << 30;

/// Settings for saving and loading an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Raw bytes per compressed block when writing.
    pub block_size: usize,
    /// Largest decoded payload accepted when reading. Larger headers are
    /// rejected before anything is allocated.
    pub max_payload_bytes: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}
