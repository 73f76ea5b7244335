//! Memoized query results keyed by the content of the query vector.

use ahash::AHashMap;

use crate::vector::search::QueryResult;

/// Hash key built from the bit patterns of a query vector.
///
/// `-0.0` is folded onto `0.0` so keys agree with `f32` equality. Stored and
/// query vectors are validated finite, so NaN never reaches a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey(Box<[u32]>);

impl CacheKey {
    fn from_vector(vector: &[f32]) -> Self {
        CacheKey(
            vector
                .iter()
                .map(|x| if *x == 0.0 { 0 } else { x.to_bits() })
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    requested_k: usize,
    result: QueryResult,
}

/// Hit and miss counters of a [`QueryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to scoring.
    pub misses: u64,
}

/// Query results keyed by query vector content.
///
/// The cache is only ever invalidated as a whole. When it reaches its
/// capacity it is cleared before the next insert. A capacity of zero
/// disables caching.
#[derive(Debug)]
pub struct QueryCache {
    entries: AHashMap<CacheKey, CacheEntry>,
    capacity: usize,
    stats: CacheStats,
}

impl QueryCache {
    /// Create a cache holding at most `capacity` distinct queries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            capacity,
            stats: CacheStats::default(),
        }
    }

    /// Look up the first `top_k` hits for `query`.
    ///
    /// An entry answers the lookup when it was computed for at least `top_k`
    /// results.
    pub fn get(&mut self, query: &[f32], top_k: usize) -> Option<QueryResult> {
        let hit = self
            .entries
            .get(&CacheKey::from_vector(query))
            .filter(|entry| entry.requested_k >= top_k)
            .map(|entry| entry.result.truncated(top_k));

        match hit {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }
        hit
    }

    /// Remember the result computed for `query` at `requested_k`.
    pub fn insert(&mut self, query: &[f32], requested_k: usize, result: QueryResult) {
        if self.capacity == 0 {
            return;
        }

        let key = CacheKey::from_vector(query);
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries.clear();
        }
        self.entries.insert(
            key,
            CacheEntry {
                requested_k,
                result,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached queries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit and miss counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
