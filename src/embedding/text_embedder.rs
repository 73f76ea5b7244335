//! Text embedding trait consumed by the vector index.

use crate::error::Result;

/// Trait for converting text to vector embeddings.
///
/// # Examples
///
/// ```
/// use tessera::embedding::TextEmbedder;
/// use tessera::error::Result;
///
/// struct LengthEmbedder;
///
/// impl TextEmbedder for LengthEmbedder {
///     fn embed(&self, text: &str) -> Result<Vec<f32>> {
///         Ok(vec![text.len() as f32, 1.0])
///     }
/// }
///
/// let vector = LengthEmbedder.embed("hello").unwrap();
/// assert_eq!(vector, vec![5.0, 1.0]);
/// ```
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// Implementations report provider failures as
    /// [`TesseraError::Embedding`](crate::error::TesseraError::Embedding).
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in batch.
    ///
    /// The default implementation calls `embed` sequentially and stops at the
    /// first failure. Override this method for providers with a batch API.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
