use serde::{Deserialize, Serialize};
use strata_blocks::Block;
use strata_world::CubePos;
use strata_world::gen::{CubePrimer, primer_index};

pub const CUBE_VOLUME: usize = 16 * 16 * 16;

/// Minimal serializable record for an entity riding in a cube. Behavior
/// lives elsewhere; the cube only stores and round-trips these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: u64,
    pub kind: String,
    pub pos: [f64; 3],
}

/// One materialized 16x16x16 section.
#[derive(Clone, Debug)]
pub struct Cube {
    pos: CubePos,
    blocks: Vec<Block>,
    entities: Vec<EntityRecord>,
    populated: bool,
    dirty: bool,
    loaded: bool,
}

impl Cube {
    /// Finalize a primer into a cube, splitting off the biome strip for the
    /// owning column.
    pub fn from_primer(pos: CubePos, primer: CubePrimer) -> (Self, [u8; 256]) {
        let (blocks, biomes) = primer.into_blocks();
        (
            Self {
                pos,
                blocks,
                entities: Vec::new(),
                populated: false,
                dirty: true,
                loaded: true,
            },
            biomes,
        )
    }

    /// Rebuild a cube from deserialized parts. Loaded cubes start clean.
    pub fn from_parts(
        pos: CubePos,
        blocks: Vec<Block>,
        entities: Vec<EntityRecord>,
        populated: bool,
    ) -> Self {
        let mut blocks = blocks;
        if blocks.len() != CUBE_VOLUME {
            blocks.resize(CUBE_VOLUME, Block::AIR);
        }
        Self {
            pos,
            blocks,
            entities,
            populated,
            dirty: false,
            loaded: true,
        }
    }

    #[inline]
    pub fn pos(&self) -> CubePos {
        self.pos
    }

    #[inline]
    pub fn block(&self, lx: usize, ly: usize, lz: usize) -> Block {
        self.blocks[primer_index(lx, ly, lz)]
    }

    /// Write a block, returning the previous value. Marks the cube dirty.
    pub fn set_block(&mut self, lx: usize, ly: usize, lz: usize, b: Block) -> Block {
        let slot = &mut self.blocks[primer_index(lx, ly, lz)];
        let prev = *slot;
        if prev != b {
            *slot = b;
            self.dirty = true;
        }
        prev
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    pub fn entities(&self) -> &[EntityRecord] {
        &self.entities
    }

    pub fn add_entity(&mut self, entity: EntityRecord) {
        self.entities.push(entity);
        self.dirty = true;
    }

    pub fn take_entities(&mut self) -> Vec<EntityRecord> {
        self.dirty = true;
        std::mem::take(&mut self.entities)
    }

    #[inline]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn mark_populated(&mut self) {
        if !self.populated {
            self.populated = true;
            self.dirty = true;
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn mark_unloaded(&mut self) {
        self.loaded = false;
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }
}

/// A cube lookup result: either real data or the definite absence of it.
/// Blank reads as air everywhere without allocating storage.
#[derive(Clone, Copy, Debug)]
pub enum CubeState<'a> {
    Resident(&'a Cube),
    Blank,
}

impl<'a> CubeState<'a> {
    #[inline]
    pub fn block(&self, lx: usize, ly: usize, lz: usize) -> Block {
        match self {
            CubeState::Resident(cube) => cube.block(lx, ly, lz),
            CubeState::Blank => Block::AIR,
        }
    }

    #[inline]
    pub fn is_resident(&self) -> bool {
        matches!(self, CubeState::Resident(_))
    }

    #[inline]
    pub fn resident(&self) -> Option<&'a Cube> {
        match self {
            CubeState::Resident(cube) => Some(cube),
            CubeState::Blank => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primer_finalization_keeps_contents() {
        let mut primer = CubePrimer::new();
        let b = Block::new(2);
        primer.set(3, 4, 5, b);
        primer.set_biome(1, 1, 7);
        let (cube, biomes) = Cube::from_primer(CubePos::new(0, 0, 0), primer);
        assert_eq!(cube.block(3, 4, 5), b);
        assert_eq!(cube.block(5, 4, 3), Block::AIR);
        assert_eq!(biomes[(1 << 4) | 1], 7);
        assert!(cube.is_dirty());
        assert!(!cube.is_populated());
    }

    #[test]
    fn set_block_tracks_dirtiness() {
        let mut cube = Cube::from_parts(CubePos::new(0, 0, 0), Vec::new(), Vec::new(), true);
        assert!(!cube.is_dirty());
        // Writing the same value is not a change.
        assert_eq!(cube.set_block(0, 0, 0, Block::AIR), Block::AIR);
        assert!(!cube.is_dirty());
        cube.set_block(0, 0, 0, Block::new(1));
        assert!(cube.is_dirty());
        cube.mark_saved();
        assert!(!cube.is_dirty());
    }

    #[test]
    fn blank_state_is_air() {
        let state = CubeState::Blank;
        assert_eq!(state.block(0, 0, 0), Block::AIR);
        assert!(!state.is_resident());
        assert!(state.resident().is_none());
    }
}
