//! Bounded LRU cache of compiled queries.
//!
//! The cache maps raw query text, byte for byte, to the program it compiles
//! to. Only successful compilations are stored: a query that fails to compile
//! is compiled again every time it is submitted.
//!
//! Concurrent misses on the same text are not deduplicated. Both callers
//! compile, and the later insertion overwrites the earlier one.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::CompileError;
use crate::query::{CompiledQuery, QueryCompiler};

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered without invoking the compiler.
    pub hits: u64,
    /// Lookups that invoked the compiler.
    pub misses: u64,
    /// Misses whose compilation failed.
    pub compile_failures: u64,
    /// Entries dropped to make room for a new one.
    pub evictions: u64,
    /// Number of entries currently cached.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache in front of a [`QueryCompiler`].
///
/// A capacity of zero disables caching: every lookup compiles.
pub struct CompiledQueryCache {
    compiler: Arc<dyn QueryCompiler>,
    entries: Option<Mutex<LruCache<String, Arc<dyn CompiledQuery>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    compile_failures: AtomicU64,
    evictions: AtomicU64,
}

impl CompiledQueryCache {
    /// Create a cache holding at most `capacity` compiled queries.
    pub fn new(compiler: Arc<dyn QueryCompiler>, capacity: usize) -> Self {
        Self {
            compiler,
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compile_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache that never stores anything.
    pub fn pass_through(compiler: Arc<dyn QueryCompiler>) -> Self {
        Self::new(compiler, 0)
    }

    /// Return the program for `raw_query`, compiling it on a miss.
    ///
    /// A hit marks the entry as most recently used. A successful miss inserts
    /// the program, evicting the least recently used entry when full.
    pub fn lookup_or_compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError> {
        let Some(entries) = &self.entries else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.compile(raw_query);
        };

        let cached = entries.lock().get(raw_query).cloned();
        if let Some(program) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(program);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Compile outside the lock so a slow compilation never blocks hits.
        let program = self.compile(raw_query)?;

        let displaced = entries
            .lock()
            .push(raw_query.to_owned(), Arc::clone(&program));
        if let Some((evicted, _)) = displaced {
            if evicted != raw_query {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(query = %evicted, "Evicted compiled query");
            }
        }

        Ok(program)
    }

    fn compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError> {
        self.compiler.compile(raw_query).inspect_err(|err| {
            self.compile_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(query = %raw_query, error = %err, "Query compilation failed");
        })
    }

    /// Whether `raw_query` is cached. Does not touch recency.
    pub fn contains(&self, raw_query: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.lock().contains(raw_query))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity; zero when caching is disabled.
    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.lock().cap().get())
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compile_failures: self.compile_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }
}

impl fmt::Debug for CompiledQueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQueryCache")
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}
