//! Byte-budgeted LRU cache of rendered canvas bitmaps.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use hashbrown::HashMap;

struct Entry {
    bytes: Arc<[u8]>,
    tick: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, Entry>,
    recency: BTreeMap<u64, String>,
    used_bytes: usize,
    next_tick: u64,
}

impl LruState {
    fn touch(&mut self, name: &str) -> Option<Arc<[u8]>> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(name)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, name.to_string());
        self.next_tick += 1;
        Some(Arc::clone(&entry.bytes))
    }

    fn remove(&mut self, name: &str) {
        if let Some(old) = self.entries.remove(name) {
            self.recency.remove(&old.tick);
            self.used_bytes -= old.bytes.len();
        }
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.used_bytes > capacity {
            let Some((_, name)) = self.recency.pop_first() else {
                break;
            };
            if let Some(old) = self.entries.remove(&name) {
                self.used_bytes -= old.bytes.len();
            }
        }
    }
}

/// Maps canvas names to rendered bytes, charging each entry by its length.
///
/// Safe to share between tasks; all bookkeeping sits behind an internal lock
/// that is never held across an await point.
pub struct RenderCache {
    capacity_bytes: usize,
    state: Mutex<LruState>,
}

impl RenderCache {
    /// Creates an empty cache holding at most `capacity_bytes`.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            state: Mutex::new(LruState::default()),
        }
    }

    /// Returns cached bytes and marks the entry most recently used.
    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.lock().touch(name)
    }

    /// Stores `bytes` under `name`, evicting least recently used entries
    /// until the budget holds. Entries larger than the whole budget are
    /// not cached.
    pub fn put(&self, name: &str, bytes: Arc<[u8]>) {
        let mut state = self.lock();
        state.remove(name);
        if bytes.len() > self.capacity_bytes {
            return;
        }

        let tick = state.next_tick;
        state.next_tick += 1;
        state.used_bytes += bytes.len();
        state.recency.insert(tick, name.to_string());
        state.entries.insert(name.to_string(), Entry { bytes, tick });
        state.evict_to(self.capacity_bytes);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget.
    pub fn used_bytes(&self) -> usize {
        self.lock().used_bytes
    }

    /// Configured budget.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    fn lock(&self) -> MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
