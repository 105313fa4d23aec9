use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};

#[derive(Clone, Copy, Debug, Default)]
pub struct GroundCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Bounded cache for per-column ground heights, keyed by packed (x, z).
///
/// Adjacent cubes re-evaluate the same columns, so the depth-noise result is
/// worth keeping. Concurrent misses on one key coalesce onto a single
/// computation; waiters block until the owner publishes the value.
pub struct GroundCache {
    entries: RwLock<HashMap<u64, i32>>,
    order: Mutex<VecDeque<u64>>,
    inflight: Mutex<HashMap<u64, Arc<Slot>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

struct Slot {
    value: Mutex<Option<i32>>,
    ready: Condvar,
}

#[inline]
pub fn pack_column(x: i32, z: i32) -> u64 {
    ((x as u32 as u64) << 32) | (z as u32 as u64)
}

impl GroundCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            inflight: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get_or_compute(&self, key: u64, compute: impl FnOnce() -> i32) -> i32 {
        if let Some(v) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return v;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let (slot, owner) = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(&key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot {
                        value: Mutex::new(None),
                        ready: Condvar::new(),
                    });
                    inflight.insert(key, Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if !owner {
            let mut guard = slot.value.lock().unwrap();
            while guard.is_none() {
                guard = slot.ready.wait(guard).unwrap();
            }
            return guard.unwrap_or_default();
        }

        let v = compute();
        self.insert(key, v);
        {
            let mut guard = slot.value.lock().unwrap();
            *guard = Some(v);
        }
        slot.ready.notify_all();
        self.inflight.lock().unwrap().remove(&key);
        v
    }

    pub fn stats(&self) -> GroundCacheStats {
        GroundCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.read().map(|m| m.len()).unwrap_or(0),
        }
    }

    fn lookup(&self, key: u64) -> Option<i32> {
        self.entries
            .read()
            .ok()
            .and_then(|map| map.get(&key).copied())
    }

    fn insert(&self, key: u64, v: i32) {
        {
            let mut entries = self.entries.write().unwrap();
            entries.insert(key, v);
        }
        {
            let mut order = self.order.lock().unwrap();
            if let Some(pos) = order.iter().position(|k| *k == key) {
                order.remove(pos);
            }
            order.push_back(key);
        }
        self.enforce_capacity();
    }

    fn enforce_capacity(&self) {
        let mut victims: Vec<u64> = Vec::new();
        {
            let mut order = self.order.lock().unwrap();
            while order.len() > self.capacity {
                if let Some(old) = order.pop_front() {
                    victims.push(old);
                }
            }
        }
        if victims.is_empty() {
            return;
        }
        let mut entries = self.entries.write().unwrap();
        for key in victims {
            if entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
