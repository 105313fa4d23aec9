use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use strata_cube::{Column, Cube};
use strata_world::{ColumnPos, CubePos};

use crate::StoreError;
use crate::cache::SavedCubeCache;
use crate::keys::{column_key, cube_key};
use crate::region::RegionLog;
use crate::tag;

/// Per-cycle flush caps; large bursts drain over several cycles so one
/// cycle never monopolizes the worker.
const COLUMNS_BATCH: usize = 25;
const CUBES_BATCH: usize = 250;

const SAVED_CACHE_TTL: Duration = Duration::from_secs(10);
const SAVED_CACHE_CAPACITY: usize = 512;

#[derive(Clone, Copy, Debug, Default)]
pub struct StoreConfig {
    /// Accept and drop every save; reads still work. Lets a world be
    /// inspected without ever mutating it.
    pub read_only: bool,
}

enum Signal {
    Work,
    Shutdown,
}

struct Inner {
    columns: Mutex<RegionLog>,
    cubes: Mutex<RegionLog>,
    pending_columns: Mutex<HashMap<ColumnPos, Arc<Vec<u8>>>>,
    pending_cubes: Mutex<HashMap<CubePos, Arc<Vec<u8>>>>,
    saved_cubes: SavedCubeCache,
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl Inner {
    fn pending_empty(&self) -> bool {
        self.pending_columns.lock().unwrap().is_empty()
            && self.pending_cubes.lock().unwrap().is_empty()
    }

    fn pending_total(&self) -> usize {
        self.pending_columns.lock().unwrap().len() + self.pending_cubes.lock().unwrap().len()
    }

    /// Write one bounded batch per namespace. Returns whether work remains.
    fn flush_cycle(&self) -> bool {
        let column_batch: Vec<(ColumnPos, Arc<Vec<u8>>)> = {
            let pending = self.pending_columns.lock().unwrap();
            pending
                .iter()
                .take(COLUMNS_BATCH)
                .map(|(pos, v)| (*pos, Arc::clone(v)))
                .collect()
        };
        if !column_batch.is_empty() {
            let records: Vec<(Vec<u8>, Vec<u8>)> = column_batch
                .iter()
                .map(|(pos, v)| (column_key(*pos).to_vec(), (**v).clone()))
                .collect();
            match self.columns.lock().unwrap().write_batch(&records) {
                Ok(()) => {
                    let mut pending = self.pending_columns.lock().unwrap();
                    for (pos, written) in &column_batch {
                        // A newer save for the same column stays queued.
                        if pending.get(pos).is_some_and(|v| Arc::ptr_eq(v, written)) {
                            pending.remove(pos);
                        }
                    }
                }
                Err(e) => {
                    log::error!("failed to persist column batch: {e}");
                    return false;
                }
            }
        }

        let cube_batch: Vec<(CubePos, Arc<Vec<u8>>)> = {
            let pending = self.pending_cubes.lock().unwrap();
            pending
                .iter()
                .take(CUBES_BATCH)
                .map(|(pos, v)| (*pos, Arc::clone(v)))
                .collect()
        };
        if !cube_batch.is_empty() {
            let records: Vec<(Vec<u8>, Vec<u8>)> = cube_batch
                .iter()
                .map(|(pos, v)| (cube_key(*pos).to_vec(), (**v).clone()))
                .collect();
            match self.cubes.lock().unwrap().write_batch(&records) {
                Ok(()) => {
                    let mut pending = self.pending_cubes.lock().unwrap();
                    for (pos, written) in &cube_batch {
                        if pending.get(pos).is_some_and(|v| Arc::ptr_eq(v, written)) {
                            pending.remove(pos);
                        }
                    }
                }
                Err(e) => {
                    log::error!("failed to persist cube batch: {e}");
                    return false;
                }
            }
        }

        !self.pending_empty()
    }
}

/// Durable store for one world/dimension: a "region2d" log for columns and
/// a "region3d" log for cubes, written behind the simulation by one flush
/// worker.
pub struct CubeStore {
    inner: Arc<Inner>,
    tx: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
    read_only: bool,
}

impl CubeStore {
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let columns = RegionLog::open(dir.join("region2d").join("columns.log"))?;
        let cubes = RegionLog::open(dir.join("region3d").join("cubes.log"))?;
        let inner = Arc::new(Inner {
            columns: Mutex::new(columns),
            cubes: Mutex::new(cubes),
            pending_columns: Mutex::new(HashMap::new()),
            pending_cubes: Mutex::new(HashMap::new()),
            saved_cubes: SavedCubeCache::new(SAVED_CACHE_TTL, SAVED_CACHE_CAPACITY),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
        });
        let (tx, rx) = unbounded::<Signal>();
        let worker = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("strata-io".to_string())
                .spawn(move || worker_loop(&inner, &rx))?
        };
        Ok(Self {
            inner,
            tx,
            worker: Some(worker),
            read_only: config.read_only,
        })
    }

    /// Queue a column snapshot. Blocks only for encoding; the write happens
    /// on the flush worker.
    pub fn save_column(&self, column: &Column) -> Result<(), StoreError> {
        if self.read_only {
            return Ok(());
        }
        let bytes = Arc::new(tag::encode_column(column)?);
        self.inner
            .pending_columns
            .lock()
            .unwrap()
            .insert(column.pos(), bytes);
        let _ = self.tx.send(Signal::Work);
        Ok(())
    }

    /// Queue a cube snapshot; the record is also kept in the read cache so
    /// an immediate re-load sees it before the batch lands.
    pub fn save_cube(&self, cube: &Cube) -> Result<(), StoreError> {
        if self.read_only {
            return Ok(());
        }
        let bytes = Arc::new(tag::encode_cube(cube)?);
        self.inner
            .pending_cubes
            .lock()
            .unwrap()
            .insert(cube.pos(), Arc::clone(&bytes));
        self.inner.saved_cubes.put(cube.pos(), bytes);
        let _ = self.tx.send(Signal::Work);
        Ok(())
    }

    /// Load a column. Corrupt or unreadable records are logged and reported
    /// as absent; the caller regenerates.
    pub fn load_column(&self, pos: ColumnPos) -> Option<Column> {
        let bytes = {
            let pending = self.inner.pending_columns.lock().unwrap();
            pending.get(&pos).map(Arc::clone)
        };
        let bytes = match bytes {
            Some(b) => (*b).clone(),
            None => {
                let mut log = self.inner.columns.lock().unwrap();
                match log.get(&column_key(pos)) {
                    Ok(Some(b)) => b,
                    Ok(None) => return None,
                    Err(e) => {
                        log::warn!("column read failed at {pos:?}: {e}; treating as absent");
                        return None;
                    }
                }
            }
        };
        match tag::decode_column(&bytes) {
            Ok(column) => Some(column),
            Err(e) => {
                log::warn!("corrupt column record at {pos:?}: {e}; treating as absent");
                None
            }
        }
    }

    pub fn load_cube(&self, pos: CubePos) -> Option<Cube> {
        let bytes = {
            let pending = self.inner.pending_cubes.lock().unwrap();
            pending.get(&pos).map(Arc::clone)
        }
        .or_else(|| self.inner.saved_cubes.get(pos));
        let bytes = match bytes {
            Some(b) => (*b).clone(),
            None => {
                let mut log = self.inner.cubes.lock().unwrap();
                match log.get(&cube_key(pos)) {
                    Ok(Some(b)) => b,
                    Ok(None) => return None,
                    Err(e) => {
                        log::warn!("cube read failed at {pos:?}: {e}; treating as absent");
                        return None;
                    }
                }
            }
        };
        match tag::decode_cube(&bytes) {
            Ok(cube) => Some(cube),
            Err(e) => {
                log::warn!("corrupt cube record at {pos:?}: {e}; treating as absent");
                None
            }
        }
    }

    /// Point probe against the durable log only. A record still in the
    /// pending queue reports false; callers needing read-your-writes also
    /// consult `load_*`, which checks the queue.
    pub fn column_exists(&self, pos: ColumnPos) -> bool {
        self.inner.columns.lock().unwrap().contains(&column_key(pos))
    }

    pub fn cube_exists(&self, pos: CubePos) -> bool {
        self.inner.cubes.lock().unwrap().contains(&cube_key(pos))
    }

    pub fn pending_column_count(&self) -> usize {
        self.inner.pending_columns.lock().unwrap().len()
    }

    pub fn pending_cube_count(&self) -> usize {
        self.inner.pending_cubes.lock().unwrap().len()
    }

    /// Block until the pending queues drain. Bails out (with an error log)
    /// if the worker stops making progress, e.g. on a persistent I/O error.
    pub fn flush(&self) {
        if self.worker.is_none() {
            return;
        }
        let mut stalled = 0u32;
        let mut last_total = usize::MAX;
        let mut guard = self.inner.drain_lock.lock().unwrap();
        while !self.inner.pending_empty() {
            let _ = self.tx.send(Signal::Work);
            let (g, _) = self
                .inner
                .drained
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = g;
            let total = self.inner.pending_total();
            if total >= last_total {
                stalled += 1;
                if stalled > 40 {
                    log::error!("store flush stalled with {total} records pending");
                    break;
                }
            } else {
                stalled = 0;
            }
            last_total = total;
        }
    }

    /// Flush, stop the worker, and sync the logs. Safe to call twice; the
    /// second call is a no-op.
    pub fn close(&mut self) -> Result<(), StoreError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.flush_with_worker();
        let _ = self.tx.send(Signal::Shutdown);
        if worker.join().is_err() {
            log::error!("store worker panicked during shutdown");
        }
        self.inner.columns.lock().unwrap().sync()?;
        self.inner.cubes.lock().unwrap().sync()?;
        Ok(())
    }

    fn flush_with_worker(&self) {
        // flush() checks self.worker, which close() has already taken.
        let mut guard = self.inner.drain_lock.lock().unwrap();
        let mut rounds = 0u32;
        while !self.inner.pending_empty() && rounds < 200 {
            let _ = self.tx.send(Signal::Work);
            let (g, _) = self
                .inner
                .drained
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = g;
            rounds += 1;
        }
    }
}

impl Drop for CubeStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("store close failed: {e}");
        }
    }
}

fn worker_loop(inner: &Inner, rx: &Receiver<Signal>) {
    loop {
        match rx.recv() {
            Ok(Signal::Work) => {
                while inner.flush_cycle() {}
                inner.drained.notify_all();
            }
            Ok(Signal::Shutdown) | Err(_) => {
                while inner.flush_cycle() {}
                inner.drained.notify_all();
                break;
            }
        }
    }
}
