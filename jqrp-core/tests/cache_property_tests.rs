//! Property tests for the compiled-query cache against a reference LRU model.

use std::sync::Arc;

use jqrp_core::CompiledQueryCache;
use jqrp_test_utils::{CannedProgram, StubCompiler};
use proptest::prelude::*;

/// Recency list, least recently used first.
struct LruModel {
    capacity: usize,
    order: Vec<String>,
}

impl LruModel {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: Vec::new(),
        }
    }

    /// Returns true when the model expects the compiler to be invoked.
    fn lookup(&mut self, key: &str, compiles: bool) -> bool {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let entry = self.order.remove(pos);
            self.order.push(entry);
            return false;
        }
        if compiles && self.capacity > 0 {
            self.order.push(key.to_string());
            if self.order.len() > self.capacity {
                self.order.remove(0);
            }
        }
        true
    }

    fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

fn stub_cache(capacity: usize) -> (Arc<StubCompiler>, CompiledQueryCache) {
    let compiler = Arc::new(StubCompiler::new(CannedProgram::default()));
    let cache = CompiledQueryCache::new(compiler.clone(), capacity);
    (compiler, cache)
}

proptest! {
    #[test]
    fn prop_cache_matches_lru_model(
        capacity in 0usize..6,
        keys in prop::collection::vec("!?[a-h]", 0..64),
    ) {
        let (compiler, cache) = stub_cache(capacity);
        let mut model = LruModel::new(capacity);
        let mut expected_calls = 0;

        for key in &keys {
            let compiles = !key.starts_with('!');
            if model.lookup(key, compiles) {
                expected_calls += 1;
            }

            let outcome = cache.lookup_or_compile(key);
            prop_assert_eq!(outcome.is_ok(), compiles);
            prop_assert_eq!(compiler.calls(), expected_calls);
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.len(), model.order.len());
        }

        for key in &keys {
            prop_assert_eq!(cache.contains(key), model.contains(key));
        }
    }

    #[test]
    fn prop_recent_entries_are_never_recompiled(
        capacity in 1usize..8,
        keys in prop::collection::vec("[a-d]", 1..32),
    ) {
        // With at least as many slots as distinct keys, each key compiles once.
        let (compiler, cache) = stub_cache(capacity.max(4));
        for key in &keys {
            cache.lookup_or_compile(key).unwrap();
        }
        let mut distinct = keys.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(compiler.calls(), distinct.len());
        prop_assert_eq!(cache.stats().misses as usize, distinct.len());
        prop_assert_eq!(cache.stats().hits as usize, keys.len() - distinct.len());
    }

    #[test]
    fn prop_overflow_evicts_exactly_the_lru_entry(capacity in 1usize..8) {
        let (_compiler, cache) = stub_cache(capacity);
        let keys: Vec<String> = (0..=capacity).map(|i| format!(".k{}", i)).collect();

        for key in &keys {
            cache.lookup_or_compile(key).unwrap();
        }

        prop_assert!(!cache.contains(&keys[0]));
        for key in &keys[1..] {
            prop_assert!(cache.contains(key));
        }
        prop_assert_eq!(cache.stats().evictions, 1);
    }
}

#[test]
fn test_pass_through_compiles_every_time() {
    let compiler = Arc::new(StubCompiler::new(CannedProgram::default()));
    let cache = CompiledQueryCache::pass_through(compiler.clone());
    for _ in 0..3 {
        cache.lookup_or_compile(".").unwrap();
    }
    assert_eq!(compiler.calls(), 3);
    assert_eq!(cache.stats().hits, 0);
}
