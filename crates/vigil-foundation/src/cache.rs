//! Bounded LRU cache of generated responses.
//!
//! Keys are SHA-256 fingerprints of the prompt together with the generation
//! options, so the same prompt asked at a different tier or temperature is a
//! different entry.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use vigil_kernel::{CacheControl, GatewayResult, GenerateOptions};

/// Default number of cached responses
pub const DEFAULT_CACHE_SIZE: usize = 100;

#[derive(Debug)]
struct CacheEntry {
    response: String,
    last_used: u64,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_to(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > capacity {
            let lru = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match lru {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

/// Response cache shared between the protected gateway and memory recovery.
#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// A capacity of 0 disables caching: inserts are dropped.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                capacity,
                clock: 0,
            }),
        }
    }

    /// Stable fingerprint of a prompt and its options.
    pub fn fingerprint(prompt: &str, options: &GenerateOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
        // Options are plain data; serialization cannot fail.
        if let Ok(encoded) = serde_json::to_vec(options) {
            hasher.update(&encoded);
        }
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, prompt: &str, options: &GenerateOptions) -> Option<String> {
        let key = Self::fingerprint(prompt, options);
        let mut state = self.state.lock();
        let now = state.tick();
        state.entries.get_mut(&key).map(|entry| {
            entry.last_used = now;
            entry.response.clone()
        })
    }

    pub fn insert(&self, prompt: &str, options: &GenerateOptions, response: impl Into<String>) {
        let key = Self::fingerprint(prompt, options);
        let mut state = self.state.lock();
        if state.capacity == 0 {
            return;
        }
        let now = state.tick();
        state.entries.insert(
            key,
            CacheEntry {
                response: response.into(),
                last_used: now,
            },
        );
        let capacity = state.capacity;
        state.evict_to(capacity);
    }

    /// Change the capacity, evicting least recently used entries as needed.
    pub fn resize(&self, capacity: usize) -> usize {
        let mut state = self.state.lock();
        state.capacity = capacity;
        let evicted = state.evict_to(capacity);
        if evicted > 0 {
            tracing::debug!(capacity, evicted, "response cache resized");
        }
        evicted
    }

    /// Drop every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[async_trait]
impl CacheControl for ResponseCache {
    async fn clear_cache(&self) -> GatewayResult<usize> {
        let cleared = self.clear();
        tracing::info!(cleared, "response cache cleared");
        Ok(cleared)
    }
}
