use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use strata_world::CubePos;

/// Bounded, time-expiring cache of recently saved cube records. Serves
/// read-after-write before the flush worker lands the batch.
pub struct SavedCubeCache {
    entries: Mutex<HashMap<CubePos, (Instant, Arc<Vec<u8>>)>>,
    ttl: Duration,
    capacity: usize,
}

impl SavedCubeCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, pos: CubePos) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.lock().unwrap();
        let (stamp, value) = entries.get(&pos)?;
        if stamp.elapsed() > self.ttl {
            return None;
        }
        Some(Arc::clone(value))
    }

    pub fn put(&self, pos: CubePos, value: Arc<Vec<u8>>) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, (stamp, _)| stamp.elapsed() <= self.ttl);
        if entries.len() >= self.capacity {
            // Expiry didn't free room; drop the stalest entry.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, (stamp, _))| *stamp)
                .map(|(pos, _)| *pos)
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(pos, (Instant::now(), value));
    }
}
