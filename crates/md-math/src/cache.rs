use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// SHA-256 of the inputs that determine a cached value.
pub type CacheKey = [u8; 32];

pub fn equation_key(source: &str, display_mode: bool) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update([u8::from(display_mode)]);
    hasher.update(source.as_bytes());
    hasher.finalize().into()
}

pub fn content_key(content: &str) -> CacheKey {
    Sha256::digest(content.as_bytes()).into()
}

/// Bounded map that evicts in insertion order.
#[derive(Debug, Clone)]
pub struct FifoCache<V> {
    entries: IndexMap<CacheKey, V>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<V: Clone> FifoCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
