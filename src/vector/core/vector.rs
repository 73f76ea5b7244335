//! Validation helpers for raw vectors.

use crate::error::{Result, TesseraError};

/// Reject empty vectors and vectors holding NaN or infinite values.
pub fn validate_vector(data: &[f32]) -> Result<()> {
    if data.is_empty() {
        return Err(TesseraError::invalid_argument(
            "Vector length cannot be zero",
        ));
    }

    if let Some(position) = data.iter().position(|x| !x.is_finite()) {
        return Err(TesseraError::invalid_argument(format!(
            "Vector contains an invalid value (NaN or infinity) at position {position}"
        )));
    }

    Ok(())
}

/// Validate that a vector has the expected dimension.
pub fn validate_dimension(data: &[f32], expected_dim: usize) -> Result<()> {
    if data.len() != expected_dim {
        return Err(TesseraError::invalid_argument(format!(
            "Vector dimension mismatch: expected {}, got {}",
            expected_dim,
            data.len()
        )));
    }
    Ok(())
}
