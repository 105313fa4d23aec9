use fastnoise_lite::{FastNoiseLite, NoiseType};
use strata_blocks::{Block, BlockRegistry};

use crate::worldgen::GeneratorParams;

/// One biome definition with its block names resolved against the registry.
#[derive(Clone, Debug)]
pub struct BiomeParams {
    pub name: String,
    pub top: Block,
    pub filler: Block,
    pub filler_depth: i32,
    pub base_height: f32,
    pub height_variation: f32,
    pub vegetation: f32,
    pub no_structures: bool,
}

/// Maps world columns to biomes by sampling two climate noises and matching
/// the configured temperature/moisture ranges in order. The last definition
/// acts as the fallback.
pub struct BiomeSource {
    temp: FastNoiseLite,
    moisture: FastNoiseLite,
    defs: Vec<BiomeDefRanges>,
    params: Vec<BiomeParams>,
}

#[derive(Clone, Debug)]
struct BiomeDefRanges {
    temp_min: f32,
    temp_max: f32,
    moisture_min: f32,
    moisture_max: f32,
}

fn climate_noise(seed: i32, frequency: f32) -> FastNoiseLite {
    let mut noise = FastNoiseLite::with_seed(seed);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(frequency));
    noise
}

impl BiomeSource {
    pub fn new(world_seed: i64, gen: &GeneratorParams, reg: &BlockRegistry) -> Self {
        let seed = world_seed as i32;
        let mut defs = Vec::with_capacity(gen.biomes.len());
        let mut params = Vec::with_capacity(gen.biomes.len());
        for def in &gen.biomes {
            defs.push(BiomeDefRanges {
                temp_min: def.temp_min.unwrap_or(0.0),
                temp_max: def.temp_max.unwrap_or(1.0),
                moisture_min: def.moisture_min.unwrap_or(0.0),
                moisture_max: def.moisture_max.unwrap_or(1.0),
            });
            params.push(BiomeParams {
                name: def.name.clone(),
                top: reg.block_by_name(&def.top_block),
                filler: reg.block_by_name(&def.filler_block),
                filler_depth: def.filler_depth as i32,
                base_height: def.base_height,
                height_variation: def.height_variation,
                vegetation: def.vegetation,
                no_structures: def.no_structures,
            });
        }
        if params.is_empty() {
            // A world with no biome definitions still needs one answer.
            defs.push(BiomeDefRanges {
                temp_min: 0.0,
                temp_max: 1.0,
                moisture_min: 0.0,
                moisture_max: 1.0,
            });
            params.push(BiomeParams {
                name: "plains".to_string(),
                top: reg.block_by_name("grass"),
                filler: reg.block_by_name("dirt"),
                filler_depth: 3,
                base_height: 0.0,
                height_variation: 1.0,
                vegetation: 1.0,
                no_structures: false,
            });
        }
        Self {
            temp: climate_noise(seed ^ 0x1203_5f31, gen.temp_frequency),
            moisture: climate_noise(seed ^ 0x12e3_a1b2_u32 as i32, gen.moisture_frequency),
            defs,
            params,
        }
    }

    /// Biome index for a world column. Stable for the world's lifetime.
    pub fn index_at(&self, bx: i32, bz: i32) -> u8 {
        let temp = (self.temp.get_noise_2d(bx as f32, bz as f32) * 0.5 + 0.5).clamp(0.0, 1.0);
        let moisture = (self.moisture.get_noise_2d(bx as f32, bz as f32) * 0.5 + 0.5).clamp(0.0, 1.0);
        let last = self.defs.len() - 1;
        for (i, d) in self.defs.iter().enumerate() {
            if temp >= d.temp_min
                && temp < d.temp_max
                && moisture >= d.moisture_min
                && moisture < d.moisture_max
            {
                return i as u8;
            }
        }
        last as u8
    }

    #[inline]
    pub fn get(&self, index: u8) -> &BiomeParams {
        let i = (index as usize).min(self.params.len() - 1);
        &self.params[i]
    }

    #[inline]
    pub fn at(&self, bx: i32, bz: i32) -> &BiomeParams {
        self.get(self.index_at(bx, bz))
    }
}
