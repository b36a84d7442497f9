//! Process-wide reuse of compiled automata and indexes.
//!
//! Entries are keyed by the signatures of the lowered grammar and of the vocabulary. A key is
//! built at most once even when many threads ask for it at the same time: the first caller builds
//! and the others block until its result is available.
//!
//! Whether an entry came from the cache or was freshly built never changes its content, because
//! building is deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, trace, warn};
use once_cell::sync::{Lazy, OnceCell};
use rustc_hash::FxHashMap as HashMap;

use crate::dfa::{self, Dfa};
use crate::grammar::Grammar;
use crate::index::Index;
use crate::primitives::Signature;
use crate::vocabulary::Vocabulary;
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub grammar: Signature,
    pub vocabulary: Signature,
}

impl CacheKey {
    pub fn new(grammar: &Grammar, vocabulary: &Vocabulary) -> Self {
        Self {
            grammar: grammar.signature(),
            vocabulary: vocabulary.signature(),
        }
    }
}

/// A compiled automaton together with its index over one vocabulary.
#[derive(Debug)]
pub struct CacheEntry {
    pub index: Arc<Index>,
    pub dfa: Arc<Dfa>,
}

type Slot = Arc<OnceCell<Arc<CacheEntry>>>;

#[derive(Debug)]
pub struct IndexCache {
    entries: Mutex<HashMap<CacheKey, Slot>>,
    enabled: AtomicBool,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::default()),
            enabled: AtomicBool::new(true),
        }
    }

    /// A cache that starts out disabled.
    pub fn disabled() -> Self {
        let cache = Self::new();
        cache.enabled.store(false, Ordering::SeqCst);
        cache
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        // Slots are only inserted or removed under the lock, so a panicking holder can't leave
        // the map half updated.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the entry for the key, calling `builder` only if it isn't cached yet.
    ///
    /// Concurrent callers with the same key wait for the one build in flight. A failed build is
    /// returned to its caller and not remembered, waiting callers then try building themselves.
    /// While the cache is disabled `builder` runs every time and nothing is stored.
    pub fn get_or_build<F>(
        &self,
        grammar: Signature,
        vocabulary: Signature,
        builder: F,
    ) -> Result<Arc<CacheEntry>>
    where
        F: FnOnce() -> Result<CacheEntry>,
    {
        if !self.is_enabled() {
            trace!("cache disabled, building {grammar}");
            return builder().map(Arc::new);
        }

        let key = CacheKey {
            grammar,
            vocabulary,
        };
        let slot = self.entries().entry(key.clone()).or_default().clone();
        if let Some(entry) = slot.get() {
            trace!("cache hit for {}", key.grammar);
            return Ok(entry.clone());
        }

        trace!("cache miss for {}", key.grammar);
        let entry = slot.get_or_try_init(|| builder().map(Arc::new));
        if entry.is_err() {
            let mut entries = self.entries();
            if entries
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &slot) && current.get().is_none())
            {
                entries.remove(&key);
            }
        }
        entry.cloned()
    }

    /// Compiles `grammar` and indexes it over `vocabulary`, reusing a cached entry if any.
    pub fn get_or_index(&self, grammar: &Grammar, vocabulary: &Vocabulary) -> Result<Arc<CacheEntry>> {
        self.get_or_build(grammar.signature(), vocabulary.signature(), || {
            let dfa = dfa::compile(grammar, &dfa::Config::default())?;
            let index = Index::from_dfa(&dfa, vocabulary)?;
            Ok(CacheEntry {
                index: Arc::new(index),
                dfa: Arc::new(dfa),
            })
        })
    }

    /// Drops every entry. Builds in flight finish but their results are not kept.
    pub fn clear(&self) {
        let mut entries = self.entries();
        info!("clearing index cache with {} entries", entries.len());
        entries.clear();
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("index cache disabled");
        }
    }

    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!("index cache enabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Number of finished entries.
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|slot| slot.get().is_some())
    }
}

static GLOBAL: Lazy<IndexCache> = Lazy::new(|| {
    if std::env::var_os("GUIDED_DECODING_DISABLE_CACHE").is_some() {
        warn!("GUIDED_DECODING_DISABLE_CACHE is set, index cache starts disabled");
        IndexCache::disabled()
    } else {
        IndexCache::new()
    }
});

/// The process-wide cache, created on first use.
pub fn global() -> &'static IndexCache {
    &GLOBAL
}

pub fn get_cache() -> &'static IndexCache {
    global()
}

pub fn clear_cache() {
    global().clear()
}

pub fn disable_cache() {
    global().disable()
}

pub fn enable_cache() {
    global().enable()
}
