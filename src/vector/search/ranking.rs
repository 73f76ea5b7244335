//! Exhaustive top-k ranking over a record store.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{Result, TesseraError};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::core::vector::{validate_dimension, validate_vector};
use crate::vector::search::QueryResult;
use crate::vector::search::cancel::CancellationToken;
use crate::vector::search::executor::ScoringExecutor;
use crate::vector::store::RecordStore;

/// Check a query before any scoring work is done.
///
/// Rejects `top_k == 0`, empty or non-finite query vectors, and query vectors
/// whose length differs from the dimension of a non-empty store.
pub fn validate_query(store: &RecordStore, query: &[f32], top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(TesseraError::invalid_argument(
            "Number of results requested (k) must be greater than zero",
        ));
    }
    validate_vector(query)?;
    if let Some(dimension) = store.dimension() {
        validate_dimension(query, dimension)?;
    }
    Ok(())
}

/// Scores every stored vector against a query and keeps the best `top_k`.
///
/// Scores are higher-is-better for every metric (see
/// [`DistanceMetric::score`]). Equal scores are ordered by insertion
/// position, so results do not depend on how the executor schedules work.
pub struct RankingEngine<'a> {
    executor: &'a dyn ScoringExecutor,
}

impl<'a> RankingEngine<'a> {
    /// Create a ranking engine that scores through `executor`.
    pub fn new(executor: &'a dyn ScoringExecutor) -> Self {
        Self { executor }
    }

    /// Rank the store against `query`.
    pub fn rank(
        &self,
        store: &RecordStore,
        metric: DistanceMetric,
        query: &[f32],
        top_k: usize,
        cancellation: Option<&CancellationToken>,
    ) -> Result<QueryResult> {
        validate_query(store, query, top_k)?;
        if store.is_empty() {
            return Ok(QueryResult::new());
        }

        let vectors = store.vectors();
        let score = |position: usize| -> Result<f32> {
            if let Some(token) = cancellation {
                token.check()?;
            }
            metric.score(query, &vectors[position])
        };
        let scores = self.executor.score_all(vectors.len(), &score)?;
        if scores.len() != vectors.len() {
            return Err(TesseraError::internal(format!(
                "executor returned {} scores for {} records",
                scores.len(),
                vectors.len()
            )));
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        let order = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
        };
        if top_k < ranked.len() {
            ranked.select_nth_unstable_by(top_k - 1, order);
            ranked.truncate(top_k);
        }
        ranked.sort_unstable_by(order);

        debug!(
            metric = metric.name(),
            records = vectors.len(),
            top_k,
            returned = ranked.len(),
            "ranked records"
        );

        let documents = store.documents();
        let mut result = QueryResult::with_capacity(ranked.len());
        for (position, score) in ranked {
            result.push(documents[position].clone(), score);
        }
        Ok(result)
    }
}
