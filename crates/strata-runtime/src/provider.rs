use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use hashbrown::HashMap;
use rayon::prelude::*;
use strata_blocks::{Block, BlockRegistry};
use strata_cube::{Column, Cube, CubeState};
use strata_store::CubeStore;
use strata_world::gen::{TerrainGenerator, WorldView};
use strata_world::{ColumnPos, CubePos, World};

use crate::ProviderError;
use crate::inflight::{Claim, InflightTable};

type ColumnEntry = Arc<Mutex<Column>>;

thread_local! {
    /// Request nesting depth on this thread; population only drains at the
    /// top level so recursive materialization can never stack unboundedly.
    static REQUEST_DEPTH: Cell<u32> = const { Cell::new(0) };
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProviderStats {
    pub resident_columns: usize,
    pub resident_cubes: usize,
    pub generated: u64,
    pub loaded: u64,
    pub evicted: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EvictStats {
    pub cubes_evicted: usize,
    pub cubes_saved: usize,
    pub columns_dropped: usize,
}

/// Handle to a cube lookup result. A blank handle reads as air; it means
/// the coordinate is (still) without data from the caller's point of view.
#[derive(Clone)]
pub struct CubeHandle {
    column: Option<ColumnEntry>,
    pos: CubePos,
}

impl CubeHandle {
    fn resident(column: ColumnEntry, pos: CubePos) -> Self {
        Self {
            column: Some(column),
            pos,
        }
    }

    fn blank(pos: CubePos) -> Self {
        Self { column: None, pos }
    }

    #[inline]
    pub fn pos(&self) -> CubePos {
        self.pos
    }

    pub fn is_blank(&self) -> bool {
        match &self.column {
            Some(entry) => entry
                .lock()
                .unwrap()
                .cube_map()
                .get_loaded(self.pos.y)
                .is_none(),
            None => true,
        }
    }

    /// Run a closure against the cube's current state.
    pub fn with_cube<R>(&self, f: impl FnOnce(CubeState<'_>) -> R) -> R {
        match &self.column {
            Some(entry) => {
                let column = entry.lock().unwrap();
                f(column.cube_map().get(self.pos.y))
            }
            None => f(CubeState::Blank),
        }
    }

    pub fn block(&self, lx: usize, ly: usize, lz: usize) -> Block {
        self.with_cube(|state| state.block(lx, ly, lz))
    }

    pub fn is_populated(&self) -> bool {
        self.with_cube(|state| state.resident().map(|c| c.is_populated()).unwrap_or(false))
    }
}

/// Serves cubes from memory, the store, or the generator, in that order.
/// At most one materialization runs per coordinate at any moment.
pub struct CubeProvider {
    world: Arc<World>,
    reg: Arc<BlockRegistry>,
    generator: TerrainGenerator,
    store: CubeStore,
    columns: RwLock<HashMap<ColumnPos, ColumnEntry>>,
    inflight: InflightTable,
    pending_population: Mutex<VecDeque<CubePos>>,
    generated: AtomicU64,
    loaded: AtomicU64,
    evicted: AtomicU64,
}

impl CubeProvider {
    pub fn new(world: Arc<World>, reg: Arc<BlockRegistry>, store: CubeStore) -> Self {
        let generator = TerrainGenerator::new(Arc::clone(&world), Arc::clone(&reg));
        Self {
            world,
            reg,
            generator,
            store,
            columns: RwLock::new(HashMap::new()),
            inflight: InflightTable::new(),
            pending_population: Mutex::new(VecDeque::new()),
            generated: AtomicU64::new(0),
            loaded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    #[inline]
    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// Blocking fetch: memory, then store, then fresh generation. Returns a
    /// blank handle only for a re-entrant request on a coordinate this
    /// thread is already materializing.
    pub fn get_cube(&self, pos: CubePos) -> CubeHandle {
        REQUEST_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let handle = self.ensure_cube(pos);
        let depth = REQUEST_DEPTH.with(|depth| {
            depth.set(depth.get() - 1);
            depth.get()
        });
        if depth == 0 {
            self.drain_population();
        }
        handle
    }

    /// Non-generating lookup.
    pub fn get_loaded_cube(&self, pos: CubePos) -> Option<CubeHandle> {
        let entry = self.lookup_column(pos.column())?;
        let resident = entry
            .lock()
            .unwrap()
            .cube_map()
            .get_loaded(pos.y)
            .is_some();
        resident.then(|| CubeHandle::resident(entry, pos))
    }

    pub fn cube_exists(&self, pos: CubePos) -> bool {
        self.get_loaded_cube(pos).is_some() || self.store.cube_exists(pos)
    }

    pub fn column_exists(&self, pos: ColumnPos) -> bool {
        self.lookup_column(pos).is_some() || self.store.column_exists(pos)
    }

    fn ensure_cube(&self, pos: CubePos) -> CubeHandle {
        loop {
            if let Some(handle) = self.get_loaded_cube(pos) {
                return handle;
            }
            match self.inflight.claim(pos) {
                Claim::Reentrant => return CubeHandle::blank(pos),
                Claim::Busy(gate) => {
                    gate.wait();
                    continue;
                }
                Claim::Owned => {
                    let handle = self.materialize(pos);
                    self.inflight.finish(pos);
                    return handle;
                }
            }
        }
    }

    fn materialize(&self, pos: CubePos) -> CubeHandle {
        let entry = self.column_entry(pos.column());
        if let Some(cube) = self.store.load_cube(pos) {
            {
                let mut column = entry.lock().unwrap();
                if column.cube_map().get_loaded(pos.y).is_none() {
                    column.insert_cube(&self.reg, cube);
                }
            }
            self.loaded.fetch_add(1, Ordering::Relaxed);
            self.generator.recreate_structures(pos);
        } else {
            let ctx = self.world.make_gen_ctx();
            let primer = self.generator.generate_cube(&ctx, pos);
            let (cube, biomes) = Cube::from_primer(pos, primer);
            {
                let mut column = entry.lock().unwrap();
                if column.cube_map().get_loaded(pos.y).is_none() {
                    column.set_biomes(biomes);
                    column.insert_cube(&self.reg, cube);
                }
            }
            self.generated.fetch_add(1, Ordering::Relaxed);
        }
        self.queue_population_around(pos);
        CubeHandle::resident(entry, pos)
    }

    fn lookup_column(&self, pos: ColumnPos) -> Option<ColumnEntry> {
        self.columns.read().unwrap().get(&pos).cloned()
    }

    /// Fetch or create the column entry, loading column-level data (height
    /// index, biomes) from the store on first touch.
    fn column_entry(&self, pos: ColumnPos) -> ColumnEntry {
        if let Some(entry) = self.lookup_column(pos) {
            return entry;
        }
        let column = self
            .store
            .load_column(pos)
            .unwrap_or_else(|| Column::new(pos));
        let mut columns = self.columns.write().unwrap();
        match columns.entry(pos) {
            hashbrown::hash_map::Entry::Occupied(e) => Arc::clone(e.get()),
            hashbrown::hash_map::Entry::Vacant(v) => {
                Arc::clone(v.insert(Arc::new(Mutex::new(column))))
            }
        }
    }

    // ---- population ------------------------------------------------------

    fn is_resident(&self, pos: CubePos) -> bool {
        self.lookup_column(pos.column())
            .map(|entry| {
                entry
                    .lock()
                    .unwrap()
                    .cube_map()
                    .get_loaded(pos.y)
                    .is_some()
            })
            .unwrap_or(false)
    }

    fn neighborhood_resident(&self, pos: CubePos) -> bool {
        for dx in -1..=1 {
            for dz in -1..=1 {
                if (dx, dz) != (0, 0) && !self.is_resident(pos.offset(dx, 0, dz)) {
                    return false;
                }
            }
        }
        true
    }

    /// A newly resident cube may complete the neighborhood of itself or any
    /// horizontal neighbor; queue whichever became ready.
    fn queue_population_around(&self, pos: CubePos) {
        let mut queue = self.pending_population.lock().unwrap();
        for dx in -1..=1 {
            for dz in -1..=1 {
                let candidate = pos.offset(dx, 0, dz);
                if !self.is_resident(candidate) {
                    continue;
                }
                if self.is_populated(candidate) {
                    continue;
                }
                if self.neighborhood_resident(candidate) && !queue.contains(&candidate) {
                    queue.push_back(candidate);
                }
            }
        }
    }

    fn is_populated(&self, pos: CubePos) -> bool {
        self.lookup_column(pos.column())
            .map(|entry| {
                entry
                    .lock()
                    .unwrap()
                    .cube_map()
                    .get_loaded(pos.y)
                    .map(|c| c.is_populated())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn drain_population(&self) {
        loop {
            let Some(pos) = self.pending_population.lock().unwrap().pop_front() else {
                return;
            };
            // Conditions may have changed while queued.
            if !self.is_resident(pos) || !self.neighborhood_resident(pos) {
                continue;
            }
            // Claim the flag first so a racing drain can never decorate the
            // same cube twice; population is not retried on failure.
            let claimed = self
                .lookup_column(pos.column())
                .map(|entry| {
                    let mut column = entry.lock().unwrap();
                    match column.cube_map_mut().get_loaded_mut(pos.y) {
                        Some(cube) if !cube.is_populated() => {
                            cube.mark_populated();
                            true
                        }
                        _ => false,
                    }
                })
                .unwrap_or(false);
            if !claimed {
                continue;
            }
            let mut view = ProviderView { provider: self };
            self.generator.populate(&mut view, pos);
        }
    }

    // ---- block access ----------------------------------------------------

    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Block {
        match self.lookup_column(ColumnPos::from_block(x, z)) {
            Some(entry) => entry.lock().unwrap().block(x, y, z),
            None => Block::AIR,
        }
    }

    /// Write through to the owning column. Returns false when the target
    /// cube is not resident (the write is dropped, never queued).
    pub fn set_block_at(&self, x: i32, y: i32, z: i32, b: Block) -> bool {
        match self.lookup_column(ColumnPos::from_block(x, z)) {
            Some(entry) => entry
                .lock()
                .unwrap()
                .set_block(&self.reg, x, y, z, b)
                .is_some(),
            None => false,
        }
    }

    pub fn top_block_y(&self, x: i32, z: i32) -> Option<i32> {
        self.lookup_column(ColumnPos::from_block(x, z))
            .and_then(|entry| entry.lock().unwrap().top_block_y(x, z))
    }

    // ---- bulk operations -------------------------------------------------

    /// Materialize every cube in a box around the center, fanning out over
    /// the rayon pool. The in-flight table keeps duplicate work out.
    pub fn pregenerate(&self, center: CubePos, radius: i32) {
        let mut positions = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                for dz in -radius..=radius {
                    positions.push(center.offset(dx, dy, dz));
                }
            }
        }
        positions.par_iter().for_each(|&pos| {
            let _ = self.get_cube(pos);
        });
    }

    /// Drop cubes outside the retention box. Dirty data is queued to the
    /// store before removal, so a subsequent load observes it; columns with
    /// outstanding handles are left alone.
    pub fn evict_outside(&self, center: CubePos, radius: i32) -> Result<EvictStats, ProviderError> {
        let mut stats = EvictStats::default();
        let entries: Vec<(ColumnPos, ColumnEntry)> = {
            let columns = self.columns.read().unwrap();
            columns.iter().map(|(p, e)| (*p, Arc::clone(e))).collect()
        };
        let mut drop_columns = Vec::new();
        for (cpos, entry) in entries {
            // Map + our snapshot hold two refs; more means live handles.
            if Arc::strong_count(&entry) > 2 {
                continue;
            }
            let mut column = entry.lock().unwrap();
            let column_outside = (cpos.x - center.x).abs() > radius
                || (cpos.z - center.z).abs() > radius;
            let evict_ys: Vec<i32> = column
                .cube_map()
                .ys()
                .filter(|cy| column_outside || (cy - center.y).abs() > radius)
                .filter(|&cy| !self.inflight.is_inflight(cpos.with_y(cy)))
                .collect();
            if evict_ys.is_empty() {
                continue;
            }
            for cy in evict_ys {
                if let Some(mut cube) = column.remove_cube(cy) {
                    if cube.is_dirty() {
                        self.store.save_cube(&cube)?;
                        cube.mark_saved();
                        stats.cubes_saved += 1;
                    }
                    cube.mark_unloaded();
                    stats.cubes_evicted += 1;
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                }
            }
            self.store.save_column(&column)?;
            if column.cube_map().is_empty() {
                drop_columns.push(cpos);
            }
        }
        if !drop_columns.is_empty() {
            let mut columns = self.columns.write().unwrap();
            for cpos in drop_columns {
                let still_unreferenced = columns
                    .get(&cpos)
                    .map(|e| Arc::strong_count(e) == 1)
                    .unwrap_or(false);
                if still_unreferenced {
                    columns.remove(&cpos);
                    stats.columns_dropped += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Save every dirty cube and every column, then block until the store
    /// drains its queues.
    pub fn save_all(&self) -> Result<(), ProviderError> {
        let entries: Vec<ColumnEntry> = {
            let columns = self.columns.read().unwrap();
            columns.values().cloned().collect()
        };
        for entry in entries {
            let mut column = entry.lock().unwrap();
            for cube in column.cube_map_mut().iter_mut() {
                if cube.is_dirty() {
                    self.store.save_cube(cube)?;
                    cube.mark_saved();
                }
            }
            self.store.save_column(&column)?;
        }
        self.store.flush();
        Ok(())
    }

    /// Save everything and shut the store down. Idempotent.
    pub fn close(&mut self) -> Result<(), ProviderError> {
        self.save_all()?;
        self.store.close()?;
        Ok(())
    }

    pub fn stats(&self) -> ProviderStats {
        let columns = self.columns.read().unwrap();
        let resident_cubes = columns
            .values()
            .map(|entry| entry.lock().unwrap().cube_map().len())
            .sum();
        ProviderStats {
            resident_columns: columns.len(),
            resident_cubes,
            generated: self.generated.load(Ordering::Relaxed),
            loaded: self.loaded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

struct ProviderView<'a> {
    provider: &'a CubeProvider,
}

impl WorldView for ProviderView<'_> {
    fn block(&self, x: i32, y: i32, z: i32) -> Block {
        self.provider.block_at(x, y, z)
    }

    fn set_block(&mut self, x: i32, y: i32, z: i32, b: Block) {
        let _ = self.provider.set_block_at(x, y, z, b);
    }

    fn top_block_y(&self, x: i32, z: i32) -> Option<i32> {
        self.provider.top_block_y(x, z)
    }
}
