use std::cell::Cell;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use strata_blocks::{Block, BlockRegistry};
use strata_height::{HeightIndex, ServerHeightMap};
use strata_world::coords::{block_to_cube, block_to_local};
use strata_world::{ColumnPos, CubePos};

use crate::cube::{Cube, CubeState};

/// Sparse set of cubes keyed by cube-Y. Cubes live in an arena; a BTree maps
/// Y to the arena slot so range queries iterate in ascending Y.
#[derive(Debug, Default)]
pub struct CubeMap {
    slots: Vec<Cube>,
    by_y: BTreeMap<i32, usize>,
    generation: u64,
}

impl CubeMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Always answers: a missing cube is Blank, never null.
    pub fn get(&self, cy: i32) -> CubeState<'_> {
        match self.by_y.get(&cy) {
            Some(&slot) => CubeState::Resident(&self.slots[slot]),
            None => CubeState::Blank,
        }
    }

    /// Resident cube or nothing; never triggers generation.
    pub fn get_loaded(&self, cy: i32) -> Option<&Cube> {
        self.by_y.get(&cy).map(|&slot| &self.slots[slot])
    }

    pub fn get_loaded_mut(&mut self, cy: i32) -> Option<&mut Cube> {
        match self.by_y.get(&cy) {
            Some(&slot) => Some(&mut self.slots[slot]),
            None => None,
        }
    }

    #[inline]
    pub(crate) fn slot_of(&self, cy: i32) -> Option<usize> {
        self.by_y.get(&cy).copied()
    }

    #[inline]
    pub(crate) fn by_slot(&self, slot: usize, cy: i32) -> Option<&Cube> {
        self.slots.get(slot).filter(|c| c.pos().y == cy)
    }

    /// Insert a cube at its Y. Replacing live data would lose writes, so a
    /// collision with a resident cube is a logic bug and panics.
    pub fn insert(&mut self, cube: Cube) {
        let cy = cube.pos().y;
        assert!(
            !self.by_y.contains_key(&cy),
            "cube map already holds a resident cube at y={cy}"
        );
        self.slots.push(cube);
        self.by_y.insert(cy, self.slots.len() - 1);
        self.generation += 1;
    }

    pub fn remove(&mut self, cy: i32) -> Option<Cube> {
        let slot = self.by_y.remove(&cy)?;
        let cube = self.slots.swap_remove(slot);
        // The displaced tail cube (if any) moved into the freed slot.
        if slot < self.slots.len() {
            let moved_y = self.slots[slot].pos().y;
            self.by_y.insert(moved_y, slot);
        }
        self.generation += 1;
        Some(cube)
    }

    /// Resident cubes with Y in range, ascending. Blank positions are not
    /// reported.
    pub fn cubes(&self, range: RangeInclusive<i32>) -> impl Iterator<Item = &Cube> {
        self.by_y.range(range).map(|(_, &slot)| &self.slots[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cube> {
        self.by_y.values().map(|&slot| &self.slots[slot])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cube> {
        // Arena order is fine for mutation sweeps (saving, flag resets).
        self.slots.iter_mut()
    }

    pub fn ys(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_y.keys().copied()
    }
}

/// The vertical stack of cubes sharing one (x, z), plus the column-level
/// data every cube in the stack shares: height index and biomes.
#[derive(Debug)]
pub struct Column {
    pos: ColumnPos,
    cubes: CubeMap,
    height: ServerHeightMap,
    biomes: [u8; 256],
    cubic: bool,
    // Hot-cube hint: (cube Y, arena slot, map generation). Validated against
    // the map generation before use, so it can never dangle.
    hot: Cell<Option<(i32, usize, u64)>>,
}

impl Column {
    pub fn new(pos: ColumnPos) -> Self {
        Self {
            pos,
            cubes: CubeMap::new(),
            height: ServerHeightMap::new(),
            biomes: [0; 256],
            cubic: true,
            hot: Cell::new(None),
        }
    }

    /// Rebuild from deserialized parts.
    pub fn from_parts(pos: ColumnPos, height: ServerHeightMap, biomes: [u8; 256]) -> Self {
        Self {
            pos,
            cubes: CubeMap::new(),
            height,
            biomes,
            cubic: true,
            hot: Cell::new(None),
        }
    }

    #[inline]
    pub fn pos(&self) -> ColumnPos {
        self.pos
    }

    /// Distinguishes unbounded cubic columns from fixed-height legacy chunks
    /// when both coexist in one world.
    #[inline]
    pub fn is_cubic(&self) -> bool {
        self.cubic
    }

    #[inline]
    pub fn cube_map(&self) -> &CubeMap {
        &self.cubes
    }

    #[inline]
    pub fn cube_map_mut(&mut self) -> &mut CubeMap {
        &mut self.cubes
    }

    #[inline]
    pub fn height(&self) -> &ServerHeightMap {
        &self.height
    }

    #[inline]
    pub fn biomes(&self) -> &[u8; 256] {
        &self.biomes
    }

    pub fn set_biomes(&mut self, biomes: [u8; 256]) {
        self.biomes = biomes;
    }

    /// Insert a cube and absorb its opaque blocks into the height index.
    /// Absorption is idempotent, so re-inserting loaded data is safe.
    pub fn insert_cube(&mut self, reg: &BlockRegistry, cube: Cube) {
        let cy = cube.pos().y;
        for lx in 0..16 {
            for lz in 0..16 {
                for ly in 0..16 {
                    let opacity = reg.opacity(cube.block(lx, ly, lz));
                    if opacity > 0 {
                        self.height.on_opacity_change(
                            lx,
                            strata_world::coords::local_to_block(cy, ly),
                            lz,
                            opacity,
                        );
                    }
                }
            }
        }
        self.cubes.insert(cube);
    }

    /// Read a block anywhere in the column; Blank cubes read as air.
    pub fn block(&self, bx: i32, by: i32, bz: i32) -> Block {
        let cy = block_to_cube(by);
        let lx = block_to_local(bx);
        let ly = block_to_local(by);
        let lz = block_to_local(bz);
        if let Some((hot_y, slot, generation)) = self.hot.get() {
            if hot_y == cy && generation == self.cubes.generation() {
                if let Some(cube) = self.cubes.by_slot(slot, cy) {
                    return cube.block(lx, ly, lz);
                }
            }
        }
        match self.cubes.slot_of(cy) {
            Some(slot) => {
                self.hot.set(Some((cy, slot, self.cubes.generation())));
                self.cubes.by_slot(slot, cy).map(|c| c.block(lx, ly, lz)).unwrap_or(Block::AIR)
            }
            None => Block::AIR,
        }
    }

    /// Write a block if its cube is resident, keeping the height index in
    /// step. Returns the previous block, or `None` when the target cube is
    /// Blank (the write is dropped; Blank cubes have no storage).
    pub fn set_block(
        &mut self,
        reg: &BlockRegistry,
        bx: i32,
        by: i32,
        bz: i32,
        b: Block,
    ) -> Option<Block> {
        let cy = block_to_cube(by);
        let lx = block_to_local(bx);
        let ly = block_to_local(by);
        let lz = block_to_local(bz);
        let cube = self.cubes.get_loaded_mut(cy)?;
        let prev = cube.set_block(lx, ly, lz, b);
        if prev != b {
            let opacity = reg.opacity(b);
            if opacity != reg.opacity(prev) || opacity > 0 {
                self.height.on_opacity_change(lx, by, lz, opacity);
            }
        }
        Some(prev)
    }

    pub fn top_block_y(&self, bx: i32, bz: i32) -> Option<i32> {
        self.height.top_block_y(block_to_local(bx), block_to_local(bz))
    }

    pub fn top_block_y_below(&self, bx: i32, bz: i32, below: i32) -> Option<i32> {
        self.height
            .top_block_y_below(block_to_local(bx), block_to_local(bz), below)
    }

    /// Replace the height index wholesale (structural load path only).
    pub fn set_height(&mut self, height: ServerHeightMap) {
        self.height = height;
    }

    pub fn remove_cube(&mut self, cy: i32) -> Option<Cube> {
        self.cubes.remove(cy)
    }

    pub fn cube_pos(&self, cy: i32) -> CubePos {
        self.pos.with_y(cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_world::gen::CubePrimer;

    fn column_with_cube(reg: &BlockRegistry, cy: i32) -> Column {
        let mut column = Column::new(ColumnPos::new(0, 0));
        let primer = CubePrimer::new();
        let (cube, biomes) = Cube::from_primer(CubePos::new(0, cy, 0), primer);
        column.set_biomes(biomes);
        column.insert_cube(reg, cube);
        column
    }

    #[test]
    fn get_is_blank_when_absent_and_loaded_is_none() {
        let map = CubeMap::new();
        assert!(!map.get(3).is_resident());
        assert!(map.get_loaded(3).is_none());
    }

    #[test]
    #[should_panic(expected = "already holds a resident cube")]
    fn double_insert_at_same_y_is_fatal() {
        let mut map = CubeMap::new();
        let (a, _) = Cube::from_primer(CubePos::new(0, 1, 0), CubePrimer::new());
        let (b, _) = Cube::from_primer(CubePos::new(0, 1, 0), CubePrimer::new());
        map.insert(a);
        map.insert(b);
    }

    #[test]
    fn range_iteration_is_ascending_and_skips_blanks() {
        let mut map = CubeMap::new();
        for cy in [5, -3, 9, 0] {
            let (cube, _) = Cube::from_primer(CubePos::new(0, cy, 0), CubePrimer::new());
            map.insert(cube);
        }
        let ys: Vec<i32> = map.cubes(-3..=5).map(|c| c.pos().y).collect();
        assert_eq!(ys, vec![-3, 0, 5]);
    }

    #[test]
    fn remove_keeps_arena_consistent() {
        let mut map = CubeMap::new();
        for cy in [1, 2, 3] {
            let (cube, _) = Cube::from_primer(CubePos::new(0, cy, 0), CubePrimer::new());
            map.insert(cube);
        }
        assert!(map.remove(1).is_some());
        assert!(map.remove(1).is_none());
        let ys: Vec<i32> = map.iter().map(|c| c.pos().y).collect();
        assert_eq!(ys, vec![2, 3]);
    }

    #[test]
    fn set_block_updates_height_index() {
        let reg = BlockRegistry::builtin();
        let mut column = column_with_cube(&reg, 4);
        let stone = reg.block_by_name("stone");
        assert_eq!(column.set_block(&reg, 3, 70, 5, stone), Some(Block::AIR));
        assert_eq!(column.top_block_y(3, 5), Some(70));
        assert_eq!(column.block(3, 70, 5), stone);
        // Replace with air: the top must drop away.
        assert_eq!(column.set_block(&reg, 3, 70, 5, Block::AIR), Some(stone));
        assert_eq!(column.top_block_y(3, 5), None);
    }

    #[test]
    fn writes_to_blank_cubes_are_dropped() {
        let reg = BlockRegistry::builtin();
        let mut column = column_with_cube(&reg, 4);
        let stone = reg.block_by_name("stone");
        assert_eq!(column.set_block(&reg, 0, 0, 0, stone), None);
        assert_eq!(column.block(0, 0, 0), Block::AIR);
    }

    #[test]
    fn inserting_a_generated_cube_feeds_the_height_index() {
        let reg = BlockRegistry::builtin();
        let stone = reg.block_by_name("stone");
        let mut primer = CubePrimer::new();
        primer.set(7, 11, 2, stone);
        primer.set(7, 3, 2, stone);
        let (cube, _) = Cube::from_primer(CubePos::new(0, 2, 0), primer);
        let mut column = Column::new(ColumnPos::new(0, 0));
        column.insert_cube(&reg, cube);
        assert_eq!(column.top_block_y(7, 2), Some(32 + 11));
        assert_eq!(column.top_block_y_below(7, 2, 32 + 11), Some(32 + 3));
    }

    #[test]
    fn hot_cube_hint_survives_structural_changes() {
        let reg = BlockRegistry::builtin();
        let mut column = column_with_cube(&reg, 0);
        let stone = reg.block_by_name("stone");
        column.set_block(&reg, 0, 1, 0, stone);
        assert_eq!(column.block(0, 1, 0), stone); // prime the hint
        // Structural change invalidates the hint; reads stay correct.
        let (other, _) = Cube::from_primer(CubePos::new(0, 5, 0), CubePrimer::new());
        column.insert_cube(&reg, other);
        assert_eq!(column.block(0, 1, 0), stone);
        column.remove_cube(0);
        assert_eq!(column.block(0, 1, 0), Block::AIR);
    }
}
