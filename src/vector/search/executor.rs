//! Executors that fan per-record scoring out over worker threads.

use std::fmt;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, TesseraError};

/// Scoring function for the record at a given position.
pub type ScoreFn<'a> = dyn Fn(usize) -> Result<f32> + Sync + 'a;

/// Runs a scoring function once for every record position.
///
/// Implementations may evaluate positions in any order and on any thread,
/// but must return scores indexed by position. The first error aborts the
/// run.
pub trait ScoringExecutor: Send + Sync + fmt::Debug {
    /// Score positions `0..count`.
    fn score_all(&self, count: usize, score: &ScoreFn<'_>) -> Result<Vec<f32>>;
}

/// Scores every record on the calling thread, in position order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl ScoringExecutor for SequentialExecutor {
    fn score_all(&self, count: usize, score: &ScoreFn<'_>) -> Result<Vec<f32>> {
        (0..count).map(score).collect()
    }
}

/// Scores records with rayon.
///
/// Uses the global rayon pool unless built with a dedicated pool. Stores
/// smaller than `parallel_threshold` are scored on the calling thread.
#[derive(Debug)]
pub struct RayonExecutor {
    pool: Option<ThreadPool>,
    parallel_threshold: usize,
}

impl RayonExecutor {
    /// Executor backed by the global rayon pool.
    pub fn new(parallel_threshold: usize) -> Self {
        Self {
            pool: None,
            parallel_threshold,
        }
    }

    /// Executor backed by a dedicated pool of `num_threads` workers.
    ///
    /// `0` sizes the pool to the number of logical CPUs.
    pub fn with_threads(num_threads: usize, parallel_threshold: usize) -> Result<Self> {
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("tessera-score-{i}"))
            .build()
            .map_err(|e| {
                TesseraError::resource_exhausted(format!("Failed to create thread pool: {e}"))
            })?;

        Ok(Self {
            pool: Some(pool),
            parallel_threshold,
        })
    }

    /// Number of worker threads scoring will use.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl Default for RayonExecutor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ScoringExecutor for RayonExecutor {
    fn score_all(&self, count: usize, score: &ScoreFn<'_>) -> Result<Vec<f32>> {
        if count < self.parallel_threshold {
            return SequentialExecutor.score_all(count, score);
        }

        let run = || {
            (0..count)
                .into_par_iter()
                .map(score)
                .collect::<Result<Vec<_>>>()
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
