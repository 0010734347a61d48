//! Content Cache
//!
//! Bounded LRU cache for processed skill content, keyed by
//! `(skill_name, normalized_arguments)`. Entries remember the mtime of the
//! file they were computed from; a lookup with a strictly newer mtime drops
//! the entry and reports a miss.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    fn new(size: usize, max_size: usize, hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        Self {
            size,
            max_size,
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Composite cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub skill_name: String,
    pub arguments: String,
}

impl CacheKey {
    pub fn new(skill_name: &str, arguments: &str) -> Self {
        Self {
            skill_name: skill_name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    content: String,
    mtime: f64,
    /// Position in the recency order; larger is more recent
    tick: u64,
}

/// LRU content cache with mtime invalidation
///
/// Recency is a monotonically increasing tick, so two entries never share a
/// position and eviction order among entries touched "at the same time" is
/// their physical insertion order.
#[derive(Debug)]
pub struct ContentCache {
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl ContentCache {
    /// Create new cache holding at most `max_size` entries
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            max_size,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up content, validating it against the live file mtime
    pub fn get(&mut self, skill_name: &str, arguments: &str, current_mtime: f64) -> Option<String> {
        let key = CacheKey::new(skill_name, arguments);

        let Some(entry) = self.entries.get(&key) else {
            self.misses += 1;
            debug!("Cache MISS: {} [{}]", skill_name, arguments);
            return None;
        };

        if entry.mtime < current_mtime {
            let (tick, cached_mtime) = (entry.tick, entry.mtime);
            self.entries.remove(&key);
            self.recency.remove(&tick);
            self.misses += 1;
            debug!(
                "Cache STALE: {} [{}] (cached mtime {} < {})",
                skill_name, arguments, cached_mtime, current_mtime
            );
            return None;
        }

        let tick = self.bump_tick();
        let entry = self.entries.get_mut(&key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        let content = entry.content.clone();
        self.recency.insert(tick, key);
        self.hits += 1;
        debug!("Cache HIT: {} [{}]", skill_name, arguments);
        Some(content)
    }

    /// Store content computed from a file with the given mtime
    pub fn put(&mut self, skill_name: &str, arguments: &str, content: String, mtime: f64) {
        let key = CacheKey::new(skill_name, arguments);
        let tick = self.bump_tick();

        if let Some(entry) = self.entries.get_mut(&key) {
            self.recency.remove(&entry.tick);
            entry.content = content;
            entry.mtime = mtime;
            entry.tick = tick;
            self.recency.insert(tick, key);
            debug!("Cache UPDATE: {} [{}]", skill_name, arguments);
            return;
        }

        self.entries.insert(key.clone(), CacheEntry { content, mtime, tick });
        self.recency.insert(tick, key);
        debug!("Cache SET: {} [{}]", skill_name, arguments);

        while self.entries.len() > self.max_size {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!("Cache EVICT: {} [{}]", oldest.skill_name, oldest.arguments);
        }
    }

    /// Remove all entries, or only those belonging to one skill
    pub fn clear(&mut self, skill_name: Option<&str>) -> usize {
        match skill_name {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                self.recency.clear();
                count
            }
            Some(name) => {
                let before = self.entries.len();
                self.entries.retain(|key, _| key.skill_name != name);
                let entries = &self.entries;
                self.recency.retain(|_, key| entries.contains_key(key));
                before - self.entries.len()
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats::new(self.entries.len(), self.max_size, self.hits, self.misses)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bump_tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}
