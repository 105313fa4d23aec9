//! Stronghold placement and room layout.
//!
//! The world is divided into spacing-sized cells of cube columns; each cell
//! rolls one candidate placement from the world seed, filtered by biome
//! suitability. The room layout is laid out deterministically from the same
//! seed, so any cube the structure crosses can stamp its intersection
//! without the rest of the structure existing anywhere.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use strata_blocks::Block;

use crate::coords::{CUBE_SIZE, CubePos};
use crate::gen::biome::BiomeSource;
use crate::gen::primer::CubePrimer;
use crate::world::World;
use crate::worldgen::Strongholds;

const STRONGHOLD_SALT: u64 = 0x73_74_72_68; // "strh"

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Box3 {
    pub min: (i32, i32, i32),
    pub max: (i32, i32, i32),
}

impl Box3 {
    fn around(center: (i32, i32, i32), half_x: i32, half_y: i32, half_z: i32) -> Self {
        Self {
            min: (center.0 - half_x, center.1 - half_y, center.2 - half_z),
            max: (center.0 + half_x, center.1 + half_y, center.2 + half_z),
        }
    }

    fn intersects_cube(&self, pos: CubePos) -> bool {
        let (cx0, cy0, cz0) = pos.min_block();
        let (cx1, cy1, cz1) = pos.max_block();
        self.min.0 <= cx1
            && self.max.0 >= cx0
            && self.min.1 <= cy1
            && self.max.1 >= cy0
            && self.min.2 <= cz1
            && self.max.2 >= cz0
    }

    #[inline]
    fn on_shell(&self, x: i32, y: i32, z: i32) -> bool {
        x == self.min.0
            || x == self.max.0
            || y == self.min.1
            || y == self.max.1
            || z == self.min.2
            || z == self.max.2
    }
}

#[derive(Clone, Debug)]
pub struct Stronghold {
    /// Cube containing the start room.
    pub anchor: CubePos,
    rooms: Vec<Box3>,
}

impl Stronghold {
    pub fn center_block(&self) -> (i32, i32, i32) {
        self.anchor.center_block()
    }
}

pub struct StrongholdGenerator {
    cfg: Strongholds,
    cells: Mutex<HashMap<(i32, i32), Option<Stronghold>>>,
}

impl StrongholdGenerator {
    pub fn new(cfg: Strongholds) -> Self {
        Self {
            cfg: Strongholds {
                spacing: cfg.spacing.max(4),
                ..cfg
            },
            cells: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn cell_of(&self, cube_x: i32, cube_z: i32) -> (i32, i32) {
        (
            cube_x.div_euclid(self.cfg.spacing),
            cube_z.div_euclid(self.cfg.spacing),
        )
    }

    /// Placement for one grid cell, computed on first use and cached.
    pub fn for_cell(
        &self,
        world: &World,
        biomes: &BiomeSource,
        cell: (i32, i32),
    ) -> Option<Stronghold> {
        {
            let cells = self.cells.lock().unwrap();
            if let Some(cached) = cells.get(&cell) {
                return cached.clone();
            }
        }
        let computed = self.layout_cell(world, biomes, cell);
        let mut cells = self.cells.lock().unwrap();
        cells.entry(cell).or_insert(computed).clone()
    }

    fn layout_cell(
        &self,
        world: &World,
        biomes: &BiomeSource,
        cell: (i32, i32),
    ) -> Option<Stronghold> {
        let seed_pos = CubePos::new(cell.0, i32::MIN / 2, cell.1);
        let mut rng = ChaCha8Rng::seed_from_u64(world.cube_seed(seed_pos) ^ STRONGHOLD_SALT);
        if rng.gen::<f32>() >= self.cfg.chance {
            return None;
        }
        let spacing = self.cfg.spacing;
        let margin = (spacing / 4).clamp(1, 4);
        let cube_x = cell.0 * spacing + rng.gen_range(margin..spacing - margin);
        let cube_z = cell.1 * spacing + rng.gen_range(margin..spacing - margin);
        let cube_y = rng.gen_range(self.cfg.cube_y_min..=self.cfg.cube_y_max.max(self.cfg.cube_y_min));
        let anchor = CubePos::new(cube_x, cube_y, cube_z);
        let (bx, by, bz) = anchor.center_block();
        if biomes.at(bx, bz).no_structures {
            return None;
        }

        let mut rooms = Vec::new();
        rooms.push(Box3::around((bx, by, bz), 5, 3, 5));
        let corridors = rng.gen_range(2..=4u32);
        for _ in 0..corridors {
            let dir = rng.gen_range(0..4u32);
            let length = rng.gen_range(8..=24);
            let (dx, dz) = match dir {
                0 => (1, 0),
                1 => (-1, 0),
                2 => (0, 1),
                _ => (0, -1),
            };
            let end = (bx + dx * (5 + length), by, bz + dz * (5 + length));
            let mid = (bx + dx * (5 + length / 2), by, bz + dz * (5 + length / 2));
            let (half_x, half_z) = if dz == 0 {
                (length / 2 + 1, 1)
            } else {
                (1, length / 2 + 1)
            };
            rooms.push(Box3::around(mid, half_x, 2, half_z));
            rooms.push(Box3::around(end, 3, 2, 3));
        }
        Some(Stronghold { anchor, rooms })
    }

    /// Stamp every room intersection into the cube being generated.
    pub fn generate_into(
        &self,
        world: &World,
        biomes: &BiomeSource,
        pos: CubePos,
        primer: &mut CubePrimer,
        wall: Block,
    ) {
        let home = self.cell_of(pos.x, pos.z);
        for dcx in -1..=1 {
            for dcz in -1..=1 {
                let cell = (home.0 + dcx, home.1 + dcz);
                let Some(sh) = self.for_cell(world, biomes, cell) else {
                    continue;
                };
                for room in &sh.rooms {
                    stamp_box(primer, pos, room, wall);
                }
            }
        }
    }

    /// Nearest placement to a block position, searching outward by cell
    /// rings. `max_rings` bounds the search for worlds with strongholds
    /// disabled in practice.
    pub fn closest(
        &self,
        world: &World,
        biomes: &BiomeSource,
        from: (i32, i32, i32),
        max_rings: i32,
    ) -> Option<(i32, i32, i32)> {
        let home = self.cell_of(
            crate::coords::block_to_cube(from.0),
            crate::coords::block_to_cube(from.2),
        );
        for ring in 0..=max_rings {
            let mut best: Option<(i64, (i32, i32, i32))> = None;
            for dcx in -ring..=ring {
                for dcz in -ring..=ring {
                    if dcx.abs() != ring && dcz.abs() != ring {
                        continue;
                    }
                    let cell = (home.0 + dcx, home.1 + dcz);
                    if let Some(sh) = self.for_cell(world, biomes, cell) {
                        let c = sh.center_block();
                        let dx = i64::from(c.0 - from.0);
                        let dz = i64::from(c.2 - from.2);
                        let d = dx * dx + dz * dz;
                        if best.map(|(bd, _)| d < bd).unwrap_or(true) {
                            best = Some((d, c));
                        }
                    }
                }
            }
            if let Some((_, c)) = best {
                return Some(c);
            }
        }
        None
    }
}

fn stamp_box(primer: &mut CubePrimer, pos: CubePos, room: &Box3, wall: Block) {
    if !room.intersects_cube(pos) {
        return;
    }
    let (bx0, by0, bz0) = pos.min_block();
    let x0 = room.min.0.max(bx0);
    let x1 = room.max.0.min(bx0 + CUBE_SIZE - 1);
    let y0 = room.min.1.max(by0);
    let y1 = room.max.1.min(by0 + CUBE_SIZE - 1);
    let z0 = room.min.2.max(bz0);
    let z1 = room.max.2.min(bz0 + CUBE_SIZE - 1);
    for x in x0..=x1 {
        for z in z0..=z1 {
            for y in y0..=y1 {
                let b = if room.on_shell(x, y, z) {
                    wall
                } else {
                    Block::AIR
                };
                primer.set(
                    (x - bx0) as usize,
                    (y - by0) as usize,
                    (z - bz0) as usize,
                    b,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worldgen::GeneratorParams;
    use strata_blocks::BlockRegistry;

    fn setup() -> (World, BiomeSource) {
        let world = World::new(42, GeneratorParams::default());
        let reg = BlockRegistry::builtin();
        let biomes = BiomeSource::new(42, &world.params, &reg);
        (world, biomes)
    }

    #[test]
    fn cell_placement_is_deterministic() {
        let (world, biomes) = setup();
        let a = StrongholdGenerator::new(world.params.strongholds.clone());
        let b = StrongholdGenerator::new(world.params.strongholds.clone());
        for cx in -3..3 {
            for cz in -3..3 {
                let pa = a.for_cell(&world, &biomes, (cx, cz)).map(|s| s.anchor);
                let pb = b.for_cell(&world, &biomes, (cx, cz)).map(|s| s.anchor);
                assert_eq!(pa, pb);
            }
        }
    }

    #[test]
    fn placements_stay_inside_their_cell() {
        let (world, biomes) = setup();
        let gen = StrongholdGenerator::new(world.params.strongholds.clone());
        let spacing = world.params.strongholds.spacing;
        for cx in -4..4 {
            for cz in -4..4 {
                if let Some(sh) = gen.for_cell(&world, &biomes, (cx, cz)) {
                    assert_eq!(gen.cell_of(sh.anchor.x, sh.anchor.z), (cx, cz));
                    assert!(sh.anchor.x >= cx * spacing && sh.anchor.x < (cx + 1) * spacing);
                }
            }
        }
    }

    #[test]
    fn closest_finds_a_placement_when_one_exists() {
        let (world, biomes) = setup();
        let gen = StrongholdGenerator::new(world.params.strongholds.clone());
        // With a 60% per-cell chance, a handful of rings around the origin is
        // effectively certain to contain one.
        let found = gen.closest(&world, &biomes, (0, 64, 0), 8);
        assert!(found.is_some());
        assert_eq!(found, gen.closest(&world, &biomes, (0, 64, 0), 8));
    }
}
