//! Post-generation decoration: ore veins, pools, dungeons, vegetation.
//!
//! Runs against a `WorldView` so placements may spill into neighboring
//! cubes; the provider guarantees the 3x3 horizontal neighborhood is
//! resident before scheduling population. Every roll comes from the cube's
//! deterministic RNG, so regeneration reproduces the same decorations.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use strata_blocks::Block;

use crate::coords::{CUBE_SIZE, CubePos};
use crate::gen::WorldView;
use crate::gen::biome::BiomeParams;
use crate::worldgen::{OreConfig, Population};

pub(super) struct PopulateBlocks {
    pub stone: Block,
    pub water: Block,
    pub lava: Block,
    pub cobblestone: Block,
    pub mossy_cobblestone: Block,
    pub tall_grass: Block,
    pub flower: Block,
    pub grass: Block,
    pub ores: Vec<(Block, OreConfig)>,
}

pub(super) fn run(
    view: &mut dyn WorldView,
    pos: CubePos,
    rng: &mut ChaCha8Rng,
    cfg: &Population,
    blocks: &PopulateBlocks,
    biome: &BiomeParams,
    lakes: bool,
    dungeons: bool,
) {
    place_ores(view, pos, rng, blocks);
    if lakes {
        place_pool(view, pos, rng, cfg.pool_chance, blocks.water, blocks);
        place_pool(view, pos, rng, cfg.lava_pool_chance, blocks.lava, blocks);
    }
    if dungeons {
        place_dungeon(view, pos, rng, cfg, blocks);
    }
    place_vegetation(view, pos, rng, cfg, blocks, biome);
}

fn place_ores(view: &mut dyn WorldView, pos: CubePos, rng: &mut ChaCha8Rng, blocks: &PopulateBlocks) {
    let (bx0, by0, bz0) = pos.min_block();
    for (ore, cfg) in &blocks.ores {
        for _ in 0..cfg.tries {
            if rng.gen::<f32>() >= cfg.probability {
                continue;
            }
            let mut x = bx0 + rng.gen_range(0..CUBE_SIZE);
            let mut y = by0 + rng.gen_range(0..CUBE_SIZE);
            let mut z = bz0 + rng.gen_range(0..CUBE_SIZE);
            if y < cfg.min_y || y > cfg.max_y {
                continue;
            }
            // Vein: a short random walk replacing stone only.
            for _ in 0..cfg.cluster_size {
                if view.block(x, y, z) == blocks.stone {
                    view.set_block(x, y, z, *ore);
                }
                match rng.gen_range(0..6u32) {
                    0 => x += 1,
                    1 => x -= 1,
                    2 => y += 1,
                    3 => y -= 1,
                    4 => z += 1,
                    _ => z -= 1,
                }
            }
        }
    }
}

fn place_pool(
    view: &mut dyn WorldView,
    pos: CubePos,
    rng: &mut ChaCha8Rng,
    chance: f32,
    fluid: Block,
    blocks: &PopulateBlocks,
) {
    if rng.gen::<f32>() >= chance {
        return;
    }
    let (bx0, by0, bz0) = pos.min_block();
    let cx = bx0 + rng.gen_range(3..CUBE_SIZE - 3);
    let cy = by0 + rng.gen_range(3..CUBE_SIZE - 3);
    let cz = bz0 + rng.gen_range(3..CUBE_SIZE - 3);
    let radius = rng.gen_range(2..=3);
    // Only flood into solid ground; an exposed pocket would just leak.
    if view.block(cx, cy + radius, cz) == Block::AIR {
        return;
    }
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            for dy in -radius..=0 {
                if dx * dx + dy * dy * 4 + dz * dz <= radius * radius
                    && view.block(cx + dx, cy + dy, cz + dz) == blocks.stone
                {
                    view.set_block(cx + dx, cy + dy, cz + dz, fluid);
                }
            }
        }
    }
}

fn place_dungeon(
    view: &mut dyn WorldView,
    pos: CubePos,
    rng: &mut ChaCha8Rng,
    cfg: &Population,
    blocks: &PopulateBlocks,
) {
    if rng.gen::<f32>() >= cfg.dungeon_chance {
        return;
    }
    let (bx0, by0, bz0) = pos.min_block();
    let cx = bx0 + rng.gen_range(4..CUBE_SIZE - 4);
    let cy = by0 + rng.gen_range(3..CUBE_SIZE - 4);
    let cz = bz0 + rng.gen_range(4..CUBE_SIZE - 4);
    let half = 3;
    // Require a buried site: all eight shell corners solid.
    for &dx in &[-half, half] {
        for &dy in &[-2, 3] {
            for &dz in &[-half, half] {
                let b = view.block(cx + dx, cy + dy, cz + dz);
                if b == Block::AIR {
                    return;
                }
            }
        }
    }
    for dx in -half..=half {
        for dz in -half..=half {
            for dy in -2..=3 {
                let shell =
                    dx.abs() == half || dz.abs() == half || dy == -2 || dy == 3;
                let b = if shell {
                    if rng.gen::<f32>() < 0.25 {
                        blocks.mossy_cobblestone
                    } else {
                        blocks.cobblestone
                    }
                } else {
                    Block::AIR
                };
                view.set_block(cx + dx, cy + dy, cz + dz, b);
            }
        }
    }
}

fn place_vegetation(
    view: &mut dyn WorldView,
    pos: CubePos,
    rng: &mut ChaCha8Rng,
    cfg: &Population,
    blocks: &PopulateBlocks,
    biome: &BiomeParams,
) {
    let tries = (cfg.vegetation_tries as f32 * biome.vegetation).round() as u32;
    let (bx0, by0, bz0) = pos.min_block();
    for _ in 0..tries {
        let x = bx0 + rng.gen_range(0..CUBE_SIZE);
        let z = bz0 + rng.gen_range(0..CUBE_SIZE);
        let Some(top) = view.top_block_y(x, z) else {
            continue;
        };
        // Only decorate surfaces that belong to this cube.
        if top < by0 || top >= by0 + CUBE_SIZE {
            continue;
        }
        if view.block(x, top, z) != blocks.grass {
            continue;
        }
        if view.block(x, top + 1, z) != Block::AIR {
            continue;
        }
        let plant = if rng.gen::<f32>() < cfg.flower_chance {
            blocks.flower
        } else {
            blocks.tall_grass
        };
        view.set_block(x, top + 1, z, plant);
    }
}
