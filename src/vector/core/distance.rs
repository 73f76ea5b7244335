//! Distance metrics for vector similarity calculation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// Distance metrics for vector similarity calculation.
///
/// Cosine and Jaccard kernels produce a similarity directly. The remaining
/// kernels produce a distance, which [`DistanceMetric::score`] turns into a
/// higher-is-better value by subtracting it from 1 so every metric ranks the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Cosine similarity (dot product over the product of norms)
    #[default]
    Cosine,
    /// Jaccard similarity over the dimensions where either value is nonzero.
    ///
    /// Meant for sparse or binary-like vectors. On dense continuous
    /// embeddings exact equality of coordinates is rare, so scores cluster
    /// near zero and the ranking carries little information.
    Jaccard,
    /// Euclidean (L2) distance
    Euclidean,
    /// Manhattan (L1) distance
    Manhattan,
    /// Chebyshev (L-infinity) distance
    Chebyshev,
    /// Canberra distance. A dimension where both values are zero contributes 0.
    Canberra,
}

impl DistanceMetric {
    /// All supported metrics.
    pub const ALL: [DistanceMetric; 6] = [
        DistanceMetric::Cosine,
        DistanceMetric::Jaccard,
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Chebyshev,
        DistanceMetric::Canberra,
    ];

    /// Whether the raw kernel output is a similarity (higher is closer)
    /// rather than a distance.
    pub fn is_similarity(&self) -> bool {
        matches!(self, DistanceMetric::Cosine | DistanceMetric::Jaccard)
    }

    /// Evaluate the raw kernel for this metric.
    ///
    /// Returns a similarity for [`Cosine`](DistanceMetric::Cosine) and
    /// [`Jaccard`](DistanceMetric::Jaccard), and a distance otherwise.
    pub fn compute(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        check_lengths(a, b)?;

        let result = match self {
            DistanceMetric::Cosine => cosine(a, b),
            DistanceMetric::Jaccard => jaccard(a, b),
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Manhattan => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs())
                .sum(),
            DistanceMetric::Chebyshev => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs())
                .fold(0.0f32, f32::max),
            DistanceMetric::Canberra => canberra(a, b),
        };

        Ok(result)
    }

    /// Ranking score (higher is better) between two vectors.
    pub fn score(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        let raw = self.compute(a, b)?;
        if self.is_similarity() {
            Ok(raw)
        } else {
            Ok(1.0 - raw)
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Jaccard => "jaccard",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Chebyshev => "chebyshev",
            DistanceMetric::Canberra => "canberra",
        }
    }

    /// Parse a distance metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "jaccard" => Ok(DistanceMetric::Jaccard),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            "chebyshev" | "linf" => Ok(DistanceMetric::Chebyshev),
            "canberra" => Ok(DistanceMetric::Canberra),
            _ => Err(TesseraError::invalid_argument(format!(
                "Unknown distance metric: {s}"
            ))),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

fn check_lengths(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(TesseraError::invalid_argument(format!(
            "Vector dimensions must match for distance calculation: {} != {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// Accumulates in `f64`: squares of finite `f32` coordinates above ~1.8e19
/// overflow `f32`.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    // Covers zero vectors and orthogonal pairs alike.
    if dot == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

fn jaccard(a: &[f32], b: &[f32]) -> f32 {
    let mut matches = 0usize;
    let mut considered = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        if *x != 0.0 || *y != 0.0 {
            if x == y {
                matches += 1;
            }
            considered += 1;
        }
    }

    if considered == 0 {
        0.0
    } else {
        matches as f32 / considered as f32
    }
}

fn canberra(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let denominator = x.abs() + y.abs();
            if denominator == 0.0 {
                0.0
            } else {
                (x - y).abs() / denominator
            }
        })
        .sum()
}
