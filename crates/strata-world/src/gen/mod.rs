mod biome;
mod carve;
mod density;
mod populate;
mod primer;
mod sampler;
mod stronghold;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_blocks::{Block, BlockRegistry};

pub use self::biome::{BiomeParams, BiomeSource};
pub use self::density::{density, ground_height};
pub use self::primer::{CubePrimer, primer_index};
pub use self::sampler::sample_scaled;
pub use self::stronghold::StrongholdGenerator;

use self::populate::PopulateBlocks;
use crate::coords::{CUBE_SIZE, CubePos, block_to_local};
use crate::world::{GenCtx, World};

const POPULATE_SALT: u64 = 0x70_6f_70_75; // "popu"

/// Density field sampling grid: every 4 blocks horizontally, 8 vertically.
const SCALE: (usize, usize, usize) = (4, 8, 4);

/// Block access the generator needs from whoever owns the loaded cubes.
/// Population writes may spill outside the cube being decorated.
pub trait WorldView {
    fn block(&self, x: i32, y: i32, z: i32) -> Block;
    fn set_block(&mut self, x: i32, y: i32, z: i32, b: Block);
    /// Topmost occluding Y for a world column, if known.
    fn top_block_y(&self, x: i32, z: i32) -> Option<i32>;
}

/// Everything a voxel knows when the replacer chain runs.
pub struct ReplacerCtx<'a> {
    pub y: i32,
    pub density: f64,
    pub grad_y: f64,
    pub biome: &'a BiomeParams,
}

/// One stage of the block replacement pipeline. Stages run in a fixed order
/// and each may return `prev` unchanged.
pub trait BiomeBlockReplacer: Send + Sync {
    fn replace(&self, prev: Block, ctx: &ReplacerCtx<'_>) -> Block;
}

/// Density to provisional material: solid becomes stone, the rest is air or
/// sea water.
struct TerrainShapeReplacer {
    stone: Block,
    water: Block,
    sea_level: i32,
}

impl BiomeBlockReplacer for TerrainShapeReplacer {
    fn replace(&self, prev: Block, ctx: &ReplacerCtx<'_>) -> Block {
        if ctx.density > 0.0 {
            self.stone
        } else if ctx.y <= self.sea_level {
            self.water
        } else {
            prev
        }
    }
}

/// Swap the top of each solid run for the biome surface blocks. The field is
/// linear inside a sampling cell, so `density + k * grad_y` is the density k
/// blocks up and identifies the surface band without any extra lookups.
struct SurfaceReplacer {
    stone: Block,
}

impl BiomeBlockReplacer for SurfaceReplacer {
    fn replace(&self, prev: Block, ctx: &ReplacerCtx<'_>) -> Block {
        if prev != self.stone {
            return prev;
        }
        if ctx.density + ctx.grad_y <= 0.0 {
            return ctx.biome.top;
        }
        let filler_reach = f64::from(ctx.biome.filler_depth + 1);
        if ctx.density + ctx.grad_y * filler_reach <= 0.0 {
            return ctx.biome.filler;
        }
        prev
    }
}

struct Palette {
    stone: Block,
    water: Block,
    lava: Block,
    barrier: Block,
    floor: Block,
    grass: Block,
    cobblestone: Block,
    mossy_cobblestone: Block,
    tall_grass: Block,
    flower: Block,
    stone_bricks: Block,
}

/// The terrain generator: a pure function from (seed, config, cube position)
/// to voxel content, plus structure bookkeeping.
pub struct TerrainGenerator {
    world: Arc<World>,
    reg: Arc<BlockRegistry>,
    biomes: BiomeSource,
    strongholds: StrongholdGenerator,
    palette: Palette,
    replacers: Vec<Box<dyn BiomeBlockReplacer>>,
    populate_blocks: PopulateBlocks,
}

impl TerrainGenerator {
    pub fn new(world: Arc<World>, reg: Arc<BlockRegistry>) -> Self {
        let p = Arc::clone(&world.params);
        let biomes = BiomeSource::new(world.seed, &p, &reg);
        let palette = Palette {
            stone: reg.block_by_name("stone"),
            water: reg.block_by_name("water"),
            lava: reg.block_by_name("lava"),
            barrier: reg.block_by_name(&p.barrier_block),
            floor: reg.block_by_name(&p.floor_block),
            grass: reg.block_by_name("grass"),
            cobblestone: reg.block_by_name("cobblestone"),
            mossy_cobblestone: reg.block_by_name("mossy_cobblestone"),
            tall_grass: reg.block_by_name("tall_grass"),
            flower: reg.block_by_name("flower"),
            stone_bricks: reg.block_by_name("stone_bricks"),
        };
        let replacers: Vec<Box<dyn BiomeBlockReplacer>> = vec![
            Box::new(TerrainShapeReplacer {
                stone: palette.stone,
                water: palette.water,
                sea_level: p.sea_level,
            }),
            Box::new(SurfaceReplacer {
                stone: palette.stone,
            }),
        ];
        let populate_blocks = PopulateBlocks {
            stone: palette.stone,
            water: palette.water,
            lava: palette.lava,
            cobblestone: palette.cobblestone,
            mossy_cobblestone: palette.mossy_cobblestone,
            tall_grass: palette.tall_grass,
            flower: palette.flower,
            grass: palette.grass,
            ores: p
                .ores
                .iter()
                .map(|o| (reg.block_by_name(&o.block), o.clone()))
                .collect(),
        };
        let strongholds = StrongholdGenerator::new(p.strongholds.clone());
        Self {
            world,
            reg,
            biomes,
            strongholds,
            palette,
            replacers,
            populate_blocks,
        }
    }

    #[inline]
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    #[inline]
    pub fn biome_source(&self) -> &BiomeSource {
        &self.biomes
    }

    /// True when a cube lies outside the configured world bounds and gets
    /// filler material instead of terrain.
    pub fn is_out_of_bounds(&self, pos: CubePos) -> bool {
        pos.z.abs() > self.world.params.horizontal_limit
    }

    /// Build the full voxel content for one cube: base terrain then the
    /// structure passes.
    pub fn generate_cube(&self, ctx: &GenCtx, pos: CubePos) -> CubePrimer {
        let mut primer = self.generate_terrain(ctx, pos);
        self.generate_structures(&mut primer, pos);
        primer
    }

    fn generate_terrain(&self, ctx: &GenCtx, pos: CubePos) -> CubePrimer {
        let mut primer = CubePrimer::new();
        let p = &self.world.params;

        if self.is_out_of_bounds(pos) {
            primer.fill(self.palette.barrier);
            return primer;
        }
        if pos.y < p.floor_cube_y {
            primer.fill(self.palette.floor);
            return primer;
        }

        let (bx0, _, bz0) = pos.min_block();
        let mut biome_idx = [0u8; 256];
        for lz in 0..CUBE_SIZE as usize {
            for lx in 0..CUBE_SIZE as usize {
                let idx = self.biomes.index_at(bx0 + lx as i32, bz0 + lz as i32);
                biome_idx[(lz << 4) | lx] = idx;
                primer.set_biome(lx, lz, idx);
            }
        }

        let biomes = &self.biomes;
        let replacers = &self.replacers;
        let mut field = |x: i32, y: i32, z: i32| density(ctx, biomes, x, y, z);
        let mut consumer = |x: i32, y: i32, z: i32, _dx: f64, dy: f64, _dz: f64, v: f64| {
            let lx = block_to_local(x);
            let ly = block_to_local(y);
            let lz = block_to_local(z);
            let biome = biomes.get(biome_idx[(lz << 4) | lx]);
            let rctx = ReplacerCtx {
                y,
                density: v,
                grad_y: dy,
                biome,
            };
            let mut b = Block::AIR;
            for r in replacers.iter() {
                b = r.replace(b, &rctx);
            }
            if b != Block::AIR {
                primer.set(lx, ly, lz, b);
            }
        };
        let min = (pos.x * 4, pos.y * 2, pos.z * 4);
        let max = (pos.x * 4 + 4, pos.y * 2 + 2, pos.z * 4 + 4);
        sample_scaled(min, max, SCALE, &mut field, &mut consumer);
        primer
    }

    /// Structure passes run isolated: a panicking pass is logged and the
    /// remaining passes still commit, leaving the primer usable.
    fn generate_structures(&self, primer: &mut CubePrimer, pos: CubePos) {
        let p = &self.world.params;
        if self.is_out_of_bounds(pos) || pos.y < p.floor_cube_y {
            return;
        }
        if p.caves_enable {
            isolate("caves", || {
                carve::carve_caves(&self.world, &self.reg, self.palette.barrier, pos, primer);
            });
        }
        if p.ravines_enable {
            isolate("ravines", || {
                carve::carve_ravines(&self.world, &self.reg, self.palette.barrier, pos, primer);
            });
        }
        if p.strongholds_enable {
            isolate("strongholds", || {
                self.strongholds.generate_into(
                    &self.world,
                    &self.biomes,
                    pos,
                    primer,
                    self.palette.stone_bricks,
                );
            });
        }
    }

    /// Decoration pass for a cube whose horizontal neighborhood is resident.
    pub fn populate(&self, view: &mut dyn WorldView, pos: CubePos) {
        let p = &self.world.params;
        if self.is_out_of_bounds(pos) || pos.y < p.floor_cube_y {
            return;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.world.cube_seed(pos) ^ POPULATE_SALT);
        let (bx, _, bz) = pos.center_block();
        let biome = self.biomes.at(bx, bz);
        populate::run(
            view,
            pos,
            &mut rng,
            &p.population,
            &self.populate_blocks,
            biome,
            p.lakes_enable,
            p.dungeons_enable,
        );
    }

    /// Rebuild structure bookkeeping for a cube loaded from storage, so
    /// structure queries see the same placements generation would.
    pub fn recreate_structures(&self, pos: CubePos) {
        if !self.world.params.strongholds_enable {
            return;
        }
        let home = self.strongholds.cell_of(pos.x, pos.z);
        for dcx in -1..=1 {
            for dcz in -1..=1 {
                let _ = self
                    .strongholds
                    .for_cell(&self.world, &self.biomes, (home.0 + dcx, home.1 + dcz));
            }
        }
    }

    /// Nearest known structure of the named kind. The unexplored filter is
    /// not tracked here; callers get the nearest deterministic placement.
    pub fn closest_structure(
        &self,
        name: &str,
        pos: (i32, i32, i32),
        _find_unexplored: bool,
    ) -> Option<(i32, i32, i32)> {
        if !name.eq_ignore_ascii_case("stronghold") || !self.world.params.strongholds_enable {
            return None;
        }
        self.strongholds.closest(&self.world, &self.biomes, pos, 8)
    }
}

fn isolate(name: &str, pass: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(pass)).is_err() {
        log::error!("structure pass '{name}' failed; continuing with remaining passes");
    }
}
