//! Named vector index: records, queries, caching and persistence.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::TextEmbedder;
use crate::error::{Result, TesseraError};
use crate::storage::PersistenceConfig;
use crate::storage::files::{load_store, save_store};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::core::document::Document;
use crate::vector::search::QueryResult;
use crate::vector::search::cache::{CacheStats, QueryCache};
use crate::vector::search::cancel::CancellationToken;
use crate::vector::search::executor::{RayonExecutor, ScoringExecutor};
use crate::vector::search::ranking::{RankingEngine, validate_query};
use crate::vector::store::RecordStore;

/// Configuration of a [`VectorIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of distinct cosine queries kept in the result cache.
    pub cache_capacity: usize,
    /// Stores with fewer records than this are scored on the calling thread.
    pub parallel_threshold: usize,
    /// Size of a dedicated scoring pool. `None` uses the global rayon pool,
    /// `Some(0)` sizes a dedicated pool to the number of logical CPUs.
    pub num_threads: Option<usize>,
    /// Save and load settings.
    pub persistence: PersistenceConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            parallel_threshold: 100,
            num_threads: None,
            persistence: PersistenceConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Set the number of cached cosine queries; 0 disables the cache.
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Set the record count from which scoring fans out to worker threads.
    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Score on a dedicated pool of `num_threads` workers (0 for one per CPU).
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set the save and load settings.
    pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    fn build_executor(&self) -> Result<Arc<dyn ScoringExecutor>> {
        Ok(match self.num_threads {
            Some(num_threads) => Arc::new(RayonExecutor::with_threads(
                num_threads,
                self.parallel_threshold,
            )?),
            None => Arc::new(RayonExecutor::new(self.parallel_threshold)),
        })
    }
}

/// A named, self-contained collection of `(vector, document)` records.
///
/// Every query scans all records. Mutations take an exclusive lock on the
/// record store and queries a shared one, so a query never observes a store
/// that is being modified. Cosine queries are cached by the content of the
/// query vector; any mutation drops the whole cache and marks the index
/// dirty, and saving a clean index is a no-op.
///
/// # Examples
///
/// ```
/// use tessera::vector::{DistanceMetric, Document, VectorIndex};
///
/// let index = VectorIndex::new("animals").unwrap();
/// index.add(&[1.0, 0.0], Document::new("A")).unwrap();
/// index.add(&[0.0, 1.0], Document::new("B")).unwrap();
/// index.add(&[1.0, 1.0], Document::new("C")).unwrap();
///
/// let result = index.query(DistanceMetric::Cosine, &[1.0, 0.0], 3).unwrap();
/// let texts: Vec<&str> = result.documents.iter().map(|d| d.text()).collect();
/// assert_eq!(texts, ["A", "C", "B"]);
/// ```
#[derive(Debug)]
pub struct VectorIndex {
    name: String,
    config: IndexConfig,
    store: RwLock<RecordStore>,
    cache: Mutex<QueryCache>,
    clean: AtomicBool,
    /// Held for the whole of a save or load; both files share fixed
    /// temporary paths.
    persist: Mutex<()>,
    executor: Arc<dyn ScoringExecutor>,
}

impl VectorIndex {
    /// Create an empty index with the default configuration.
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        Self::with_config(name, IndexConfig::default())
    }

    /// Create an empty index.
    pub fn with_config<S: Into<String>>(name: S, config: IndexConfig) -> Result<Self> {
        let executor = config.build_executor()?;
        Self::with_executor(name, config, executor)
    }

    /// Create an empty index that scores through `executor`.
    pub fn with_executor<S: Into<String>>(
        name: S,
        config: IndexConfig,
        executor: Arc<dyn ScoringExecutor>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            cache: Mutex::new(QueryCache::new(config.cache_capacity)),
            config,
            store: RwLock::new(RecordStore::new()),
            clean: AtomicBool::new(false),
            persist: Mutex::new(()),
            executor,
        })
    }

    /// Create an index and load its records from `<root>/<name>/`.
    pub fn open<S: Into<String>, P: AsRef<Path>>(
        root: P,
        name: S,
        config: IndexConfig,
    ) -> Result<Self> {
        let index = Self::with_config(name, config)?;
        index.load(root)?;
        Ok(index)
    }

    /// Name of the index, also the name of its directory on disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of records.
    pub fn count(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Dimension of the stored vectors, `None` while the index is empty.
    pub fn dimension(&self) -> Option<usize> {
        self.store.read().dimension()
    }

    /// Whether the in-memory records match the last save or load.
    pub fn is_clean(&self) -> bool {
        self.clean.load(Ordering::Acquire)
    }

    /// Snapshot of all documents in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.store.read().documents().to_vec()
    }

    /// Copy of the record at `position`.
    pub fn get(&self, position: usize) -> Option<(Vec<f32>, Document)> {
        self.store
            .read()
            .get(position)
            .map(|(vector, document)| (vector.to_vec(), document.clone()))
    }

    /// Add a record. The vector is copied.
    pub fn add(&self, vector: &[f32], document: Document) -> Result<()> {
        let mut store = self.store.write();
        store.push(vector, document)?;
        self.invalidate();
        Ok(())
    }

    /// Add several records; on any invalid record none are added.
    pub fn add_batch(&self, records: Vec<(Vec<f32>, Document)>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut store = self.store.write();
        store.extend(records)?;
        self.invalidate();
        Ok(())
    }

    /// Remove the record holding `document` (matched by identity).
    pub fn remove(&self, document: &Document) -> Result<()> {
        let mut store = self.store.write();
        let position = store.position_of_document(document).ok_or_else(|| {
            TesseraError::not_found(format!("Document {} not found", document.id()))
        })?;
        store.remove_at(position)?;
        self.invalidate();
        Ok(())
    }

    /// Remove the first record whose vector equals `vector`, returning its
    /// document.
    pub fn remove_vector(&self, vector: &[f32]) -> Result<Document> {
        let mut store = self.store.write();
        let position = store
            .position_of_vector(vector)
            .ok_or_else(|| TesseraError::not_found("Vector not found"))?;
        let (_, document) = store.remove_at(position)?;
        self.invalidate();
        Ok(document)
    }

    /// Remove the record at `position`, returning its document.
    pub fn remove_at(&self, position: usize) -> Result<Document> {
        let mut store = self.store.write();
        let (_, document) = store.remove_at(position)?;
        self.invalidate();
        Ok(document)
    }

    /// Remove every record. Persisted files are left alone.
    pub fn clear(&self) {
        let mut store = self.store.write();
        store.clear();
        self.invalidate();
    }

    /// Drop cached results and mark the index dirty.
    pub fn reset_caches(&self) {
        let _store = self.store.write();
        self.invalidate();
    }

    /// Callers hold the store write lock.
    fn invalidate(&self) {
        self.cache.lock().clear();
        self.clean.store(false, Ordering::Release);
    }

    /// Cache hit and miss counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// The `top_k` records closest to `query` under `metric`, best first.
    ///
    /// An empty index yields an empty result. `top_k == 0`, an empty or
    /// non-finite query, or a query whose length differs from the stored
    /// vectors is rejected before any scoring.
    pub fn query(
        &self,
        metric: DistanceMetric,
        query: &[f32],
        top_k: usize,
    ) -> Result<QueryResult> {
        self.run_query(metric, query, top_k, None)
    }

    /// Like [`query`](Self::query), but gives up with
    /// [`TesseraError::OperationCancelled`] once `token` is cancelled.
    pub fn query_with_cancellation(
        &self,
        metric: DistanceMetric,
        query: &[f32],
        top_k: usize,
        token: &CancellationToken,
    ) -> Result<QueryResult> {
        self.run_query(metric, query, top_k, Some(token))
    }

    pub fn query_cosine(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        self.query(DistanceMetric::Cosine, query, top_k)
    }

    pub fn query_jaccard(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        self.query(DistanceMetric::Jaccard, query, top_k)
    }

    pub fn query_euclidean(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        self.query(DistanceMetric::Euclidean, query, top_k)
    }

    pub fn query_manhattan(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        self.query(DistanceMetric::Manhattan, query, top_k)
    }

    pub fn query_chebyshev(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        self.query(DistanceMetric::Chebyshev, query, top_k)
    }

    pub fn query_canberra(&self, query: &[f32], top_k: usize) -> Result<QueryResult> {
        self.query(DistanceMetric::Canberra, query, top_k)
    }

    fn run_query(
        &self,
        metric: DistanceMetric,
        query: &[f32],
        top_k: usize,
        cancellation: Option<&CancellationToken>,
    ) -> Result<QueryResult> {
        let store = self.store.read();
        validate_query(&store, query, top_k)?;

        let cacheable = metric == DistanceMetric::Cosine;
        if cacheable && let Some(hit) = self.cache.lock().get(query, top_k) {
            debug!(index = %self.name, top_k, "query served from cache");
            return Ok(hit);
        }

        let result = RankingEngine::new(self.executor.as_ref()).rank(
            &store,
            metric,
            query,
            top_k,
            cancellation,
        )?;

        if cacheable {
            self.cache.lock().insert(query, top_k, result.clone());
        }
        Ok(result)
    }

    /// Persist the records to `<root>/<name>/`. Does nothing while the index
    /// is clean.
    ///
    /// Saves and loads of one index run one at a time; a save that waited on
    /// another finds the index clean and returns without writing.
    pub fn save<P: AsRef<Path>>(&self, root: P) -> Result<()> {
        let _persist = self.persist.lock();
        let store = self.store.read();
        if self.is_clean() {
            debug!(index = %self.name, "index is clean, skipping save");
            return Ok(());
        }

        let dir = save_store(
            root.as_ref(),
            &self.name,
            &store,
            &self.config.persistence,
        )?;
        self.clean.store(true, Ordering::Release);
        info!(
            index = %self.name,
            dir = %dir.display(),
            records = store.len(),
            "saved index"
        );
        Ok(())
    }

    /// Replace the in-memory records with those persisted at
    /// `<root>/<name>/`. On failure the in-memory records are unchanged.
    pub fn load<P: AsRef<Path>>(&self, root: P) -> Result<()> {
        let _persist = self.persist.lock();
        let loaded = load_store(root.as_ref(), &self.name, &self.config.persistence)?;
        let records = loaded.len();

        let mut store = self.store.write();
        *store = loaded;
        self.cache.lock().clear();
        self.clean.store(true, Ordering::Release);
        info!(index = %self.name, records, "loaded index");
        Ok(())
    }

    /// Embed `document.text` with `embedder` and add the record.
    pub fn add_text(&self, embedder: &dyn TextEmbedder, document: Document) -> Result<()> {
        let vector = embedder.embed(document.text())?;
        self.add(&vector, document)
    }

    /// Embed the texts of `documents` in one batch and add the records.
    pub fn add_texts(&self, embedder: &dyn TextEmbedder, documents: Vec<Document>) -> Result<()> {
        let texts: Vec<&str> = documents.iter().map(Document::text).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != documents.len() {
            return Err(TesseraError::internal(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                documents.len()
            )));
        }
        self.add_batch(vectors.into_iter().zip(documents).collect())
    }

    /// Embed `text` and query with the resulting vector.
    pub fn query_text(
        &self,
        embedder: &dyn TextEmbedder,
        metric: DistanceMetric,
        text: &str,
        top_k: usize,
    ) -> Result<QueryResult> {
        if top_k == 0 {
            return Err(TesseraError::invalid_argument(
                "Number of results requested (k) must be greater than zero",
            ));
        }
        let vector = embedder.embed(text)?;
        self.query(metric, &vector, top_k)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(TesseraError::invalid_argument(format!(
            "Invalid index name {name:?}: it must be usable as a single directory name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::{EmbeddingError, ErrorKind};
    use crate::vector::search::executor::{ScoreFn, SequentialExecutor};

    /// Counts scoring-kernel invocations.
    #[derive(Debug, Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    impl ScoringExecutor for CountingExecutor {
        fn score_all(&self, count: usize, score: &ScoreFn<'_>) -> Result<Vec<f32>> {
            let counted = |position: usize| {
                self.calls.fetch_add(1, Ordering::SeqCst);
                score(position)
            };
            SequentialExecutor.score_all(count, &counted)
        }
    }

    fn counting_index() -> (VectorIndex, Arc<CountingExecutor>) {
        let executor = Arc::new(CountingExecutor::default());
        let index =
            VectorIndex::with_executor("test", IndexConfig::default(), executor.clone()).unwrap();
        (index, executor)
    }

    fn populate(index: &VectorIndex) -> Vec<Document> {
        let docs = vec![Document::new("A"), Document::new("B"), Document::new("C")];
        index.add(&[1.0, 0.0], docs[0].clone()).unwrap();
        index.add(&[0.0, 1.0], docs[1].clone()).unwrap();
        index.add(&[1.0, 1.0], docs[2].clone()).unwrap();
        docs
    }

    #[test]
    fn test_repeated_cosine_query_is_cached() {
        let (index, executor) = counting_index();
        populate(&index);

        let first = index.query_cosine(&[1.0, 0.0], 2).unwrap();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);

        let query_copy = vec![1.0, 0.0];
        let second = index.query_cosine(&query_copy, 2).unwrap();
        assert_eq!(first, second);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(index.cache_stats().hits, 1);

        // a smaller k is served from the same entry
        let third = index.query_cosine(&[1.0, 0.0], 1).unwrap();
        assert_eq!(third, first.truncated(1));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_other_metrics_are_not_cached() {
        let (index, executor) = counting_index();
        populate(&index);

        index.query_euclidean(&[1.0, 0.0], 2).unwrap();
        index.query_euclidean(&[1.0, 0.0], 2).unwrap();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_mutations_invalidate_cache() {
        let (index, executor) = counting_index();
        let docs = populate(&index);

        index.query_cosine(&[1.0, 0.0], 3).unwrap();
        index.add(&[2.0, 0.0], Document::new("D")).unwrap();
        let result = index.query_cosine(&[1.0, 0.0], 3).unwrap();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3 + 4);
        assert_eq!(result.len(), 3);

        index.remove(&docs[0]).unwrap();
        let result = index.query_cosine(&[1.0, 0.0], 3).unwrap();
        assert!(!result.documents.contains(&docs[0]));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 7 + 3);

        index.clear();
        assert!(index.query_cosine(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_remove_variants() {
        let index = VectorIndex::new("test").unwrap();
        let docs = populate(&index);

        let removed = index.remove_vector(&[0.0, 1.0]).unwrap();
        assert_eq!(removed, docs[1]);
        let removed = index.remove_at(1).unwrap();
        assert_eq!(removed, docs[2]);
        assert_eq!(index.documents(), vec![docs[0].clone()]);

        assert_eq!(
            index.remove_vector(&[5.0, 5.0]).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(index.remove_at(7).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_remove_missing_document_leaves_count() {
        let index = VectorIndex::new("test").unwrap();
        populate(&index);
        let err = index.remove(&Document::new("A")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(index.count(), 3);
    }

    #[test]
    fn test_cancelled_query_is_not_cached() {
        let (index, executor) = counting_index();
        populate(&index);

        let token = CancellationToken::new();
        token.cancel();
        let err = index
            .query_with_cancellation(DistanceMetric::Cosine, &[1.0, 0.0], 3, &token)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        index.query_cosine(&[1.0, 0.0], 3).unwrap();
        assert_eq!(index.cache_stats().hits, 0);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1 + 3);
    }

    #[test]
    fn test_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new("flags").unwrap();
        assert!(!index.is_clean());

        populate(&index);
        index.save(dir.path()).unwrap();
        assert!(index.is_clean());

        index.add(&[3.0, 3.0], Document::new("D")).unwrap();
        assert!(!index.is_clean());

        index.reset_caches();
        assert!(!index.is_clean());
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert_eq!(
                VectorIndex::new(name).unwrap_err().kind(),
                ErrorKind::InvalidArgument
            );
        }
    }

    #[test]
    fn test_dedicated_pool_config() {
        let config = IndexConfig::default()
            .with_num_threads(2)
            .with_parallel_threshold(0);
        let index = VectorIndex::with_config("pooled", config).unwrap();
        let docs = populate(&index);
        let result = index.query_manhattan(&[1.0, 0.0], 1).unwrap();
        assert_eq!(result.documents, vec![docs[0].clone()]);
    }

    struct FixedEmbedder;

    impl TextEmbedder for FixedEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            match text {
                "dogs" => Ok(vec![1.0, 0.0]),
                "cats" => Ok(vec![0.0, 1.0]),
                "offline" => Err(EmbeddingError::Network("connection refused".into()).into()),
                _ => Ok(vec![1.0, 1.0]),
            }
        }
    }

    #[test]
    fn test_text_helpers() {
        let index = VectorIndex::new("text").unwrap();
        index
            .add_texts(
                &FixedEmbedder,
                vec![Document::new("dogs"), Document::new("cats")],
            )
            .unwrap();
        index
            .add_text(&FixedEmbedder, Document::new("pets"))
            .unwrap();
        assert_eq!(index.count(), 3);

        let result = index
            .query_text(&FixedEmbedder, DistanceMetric::Cosine, "dogs", 1)
            .unwrap();
        assert_eq!(result.documents[0].text(), "dogs");
    }

    #[test]
    fn test_embedder_errors_propagate_unchanged() {
        let index = VectorIndex::new("text").unwrap();
        let err = index
            .add_text(&FixedEmbedder, Document::new("offline"))
            .unwrap_err();
        match err {
            TesseraError::Embedding(EmbeddingError::Network(msg)) => {
                assert_eq!(msg, "connection refused")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(index.is_empty());

        let err = index
            .add_texts(
                &FixedEmbedder,
                vec![Document::new("dogs"), Document::new("offline")],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
        assert!(index.is_empty());
    }
}
