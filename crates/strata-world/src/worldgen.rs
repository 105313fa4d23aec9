use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub noise: NoiseLayers,
    #[serde(default)]
    pub boundary: Boundary,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub caves: Caves,
    #[serde(default)]
    pub ravines: Ravines,
    #[serde(default)]
    pub strongholds: Strongholds,
    #[serde(default = "default_ores")]
    pub ores: Vec<OreConfig>,
    #[serde(default)]
    pub population: Population,
    #[serde(default)]
    pub biomes: Biomes,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            shape: Shape::default(),
            noise: NoiseLayers::default(),
            boundary: Boundary::default(),
            features: Features::default(),
            caves: Caves::default(),
            ravines: Ravines::default(),
            strongholds: Strongholds::default(),
            ores: default_ores(),
            population: Population::default(),
            biomes: Biomes::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Shape {
    #[serde(default = "default_sea_level")]
    pub sea_level: i32,
    #[serde(default = "default_height_scale")]
    pub height_scale: f32,
    #[serde(default = "default_height_factor")]
    pub height_factor: f32,
    #[serde(default = "default_volatility")]
    pub volatility: f32,
    #[serde(default = "default_density_offset")]
    pub density_offset: f32,
}
fn default_sea_level() -> i32 {
    64
}
fn default_height_scale() -> f32 {
    48.0
}
fn default_height_factor() -> f32 {
    0.125
}
fn default_volatility() -> f32 {
    0.6
}
fn default_density_offset() -> f32 {
    0.0
}
impl Default for Shape {
    fn default() -> Self {
        Self {
            sea_level: default_sea_level(),
            height_scale: default_height_scale(),
            height_factor: default_height_factor(),
            volatility: default_volatility(),
            density_offset: default_density_offset(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NoiseLayers {
    #[serde(default = "default_low")]
    pub low: NoiseLayer,
    #[serde(default = "default_high")]
    pub high: NoiseLayer,
    #[serde(default = "default_selector")]
    pub selector: NoiseLayer,
    #[serde(default = "default_depth")]
    pub depth: NoiseLayer,
}

impl Default for NoiseLayers {
    fn default() -> Self {
        Self {
            low: default_low(),
            high: default_high(),
            selector: default_selector(),
            depth: default_depth(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NoiseLayer {
    #[serde(default = "d_freq")]
    pub frequency: f32,
    #[serde(default = "d_oct")]
    pub octaves: i32,
    #[serde(default = "d_gain")]
    pub gain: f32,
    #[serde(default = "d_lac")]
    pub lacunarity: f32,
}
fn d_freq() -> f32 {
    0.006
}
fn d_oct() -> i32 {
    6
}
fn d_gain() -> f32 {
    0.5
}
fn d_lac() -> f32 {
    2.0
}
impl Default for NoiseLayer {
    fn default() -> Self {
        Self {
            frequency: d_freq(),
            octaves: d_oct(),
            gain: d_gain(),
            lacunarity: d_lac(),
        }
    }
}
fn default_low() -> NoiseLayer {
    NoiseLayer::default()
}
fn default_high() -> NoiseLayer {
    NoiseLayer {
        frequency: 0.0055,
        ..NoiseLayer::default()
    }
}
fn default_selector() -> NoiseLayer {
    NoiseLayer {
        frequency: 0.012,
        octaves: 3,
        ..NoiseLayer::default()
    }
}
fn default_depth() -> NoiseLayer {
    NoiseLayer {
        frequency: 0.004,
        octaves: 4,
        ..NoiseLayer::default()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Boundary {
    /// Cubes with |z| beyond this limit are filled with the barrier block.
    #[serde(default = "default_horizontal_limit")]
    pub horizontal_limit: i32,
    /// Cubes below this Y are filled solid without evaluating noise.
    #[serde(default = "default_floor_cube_y")]
    pub floor_cube_y: i32,
    #[serde(default = "default_barrier_block")]
    pub barrier_block: String,
    #[serde(default = "default_floor_block")]
    pub floor_block: String,
}
fn default_horizontal_limit() -> i32 {
    1_875_000
}
fn default_floor_cube_y() -> i32 {
    -8
}
fn default_barrier_block() -> String {
    "barrier".into()
}
fn default_floor_block() -> String {
    "stone".into()
}
impl Default for Boundary {
    fn default() -> Self {
        Self {
            horizontal_limit: default_horizontal_limit(),
            floor_cube_y: default_floor_cube_y(),
            barrier_block: default_barrier_block(),
            floor_block: default_floor_block(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Features {
    #[serde(default = "d_true")]
    pub caves: bool,
    #[serde(default = "d_true")]
    pub ravines: bool,
    #[serde(default = "d_true")]
    pub strongholds: bool,
    #[serde(default = "d_true")]
    pub lakes: bool,
    #[serde(default = "d_true")]
    pub dungeons: bool,
}
fn d_true() -> bool {
    true
}
impl Default for Features {
    fn default() -> Self {
        Self {
            caves: true,
            ravines: true,
            strongholds: true,
            lakes: true,
            dungeons: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Caves {
    /// Chance that a source cube spawns a tunnel system.
    #[serde(default = "default_cave_rarity")]
    pub rarity: f32,
    #[serde(default = "default_cave_systems")]
    pub max_systems: u32,
    #[serde(default = "default_cave_radius")]
    pub radius: f32,
    #[serde(default = "default_cave_length")]
    pub max_length: u32,
}
fn default_cave_rarity() -> f32 {
    0.06
}
fn default_cave_systems() -> u32 {
    2
}
fn default_cave_radius() -> f32 {
    2.5
}
fn default_cave_length() -> u32 {
    80
}
impl Default for Caves {
    fn default() -> Self {
        Self {
            rarity: default_cave_rarity(),
            max_systems: default_cave_systems(),
            radius: default_cave_radius(),
            max_length: default_cave_length(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Ravines {
    #[serde(default = "default_ravine_rarity")]
    pub rarity: f32,
    #[serde(default = "default_ravine_depth")]
    pub depth: f32,
    #[serde(default = "default_ravine_length")]
    pub max_length: u32,
}
fn default_ravine_rarity() -> f32 {
    0.008
}
fn default_ravine_depth() -> f32 {
    12.0
}
fn default_ravine_length() -> u32 {
    120
}
impl Default for Ravines {
    fn default() -> Self {
        Self {
            rarity: default_ravine_rarity(),
            depth: default_ravine_depth(),
            max_length: default_ravine_length(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Strongholds {
    /// Grid cell edge in cubes; one candidate placement per cell.
    #[serde(default = "default_stronghold_spacing")]
    pub spacing: i32,
    #[serde(default = "default_stronghold_chance")]
    pub chance: f32,
    #[serde(default = "default_stronghold_y_min")]
    pub cube_y_min: i32,
    #[serde(default = "default_stronghold_y_max")]
    pub cube_y_max: i32,
}
fn default_stronghold_spacing() -> i32 {
    32
}
fn default_stronghold_chance() -> f32 {
    0.6
}
fn default_stronghold_y_min() -> i32 {
    -2
}
fn default_stronghold_y_max() -> i32 {
    1
}
impl Default for Strongholds {
    fn default() -> Self {
        Self {
            spacing: default_stronghold_spacing(),
            chance: default_stronghold_chance(),
            cube_y_min: default_stronghold_y_min(),
            cube_y_max: default_stronghold_y_max(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct OreConfig {
    pub block: String,
    #[serde(default = "default_ore_tries")]
    pub tries: u32,
    #[serde(default = "default_ore_probability")]
    pub probability: f32,
    #[serde(default = "default_ore_cluster")]
    pub cluster_size: u32,
    #[serde(default = "default_ore_min_y")]
    pub min_y: i32,
    #[serde(default = "default_ore_max_y")]
    pub max_y: i32,
}
fn default_ore_tries() -> u32 {
    8
}
fn default_ore_probability() -> f32 {
    1.0
}
fn default_ore_cluster() -> u32 {
    9
}
fn default_ore_min_y() -> i32 {
    i32::MIN / 2
}
fn default_ore_max_y() -> i32 {
    i32::MAX / 2
}

fn default_ores() -> Vec<OreConfig> {
    fn ore(block: &str, tries: u32, cluster: u32, min_y: i32, max_y: i32) -> OreConfig {
        OreConfig {
            block: block.into(),
            tries,
            probability: 1.0,
            cluster_size: cluster,
            min_y,
            max_y,
        }
    }
    vec![
        ore("coal_ore", 16, 16, -128, 128),
        ore("iron_ore", 12, 8, -128, 64),
        ore("gold_ore", 3, 8, -128, 32),
        ore("redstone_ore", 6, 7, -128, 16),
        ore("diamond_ore", 2, 7, -128, 16),
    ]
}

#[derive(Clone, Debug, Deserialize)]
pub struct Population {
    #[serde(default = "default_vegetation_tries")]
    pub vegetation_tries: u32,
    #[serde(default = "default_flower_chance")]
    pub flower_chance: f32,
    #[serde(default = "default_pool_chance")]
    pub pool_chance: f32,
    #[serde(default = "default_lava_pool_chance")]
    pub lava_pool_chance: f32,
    #[serde(default = "default_dungeon_chance")]
    pub dungeon_chance: f32,
}
fn default_vegetation_tries() -> u32 {
    10
}
fn default_flower_chance() -> f32 {
    0.15
}
fn default_pool_chance() -> f32 {
    0.04
}
fn default_lava_pool_chance() -> f32 {
    0.01
}
fn default_dungeon_chance() -> f32 {
    0.02
}
impl Default for Population {
    fn default() -> Self {
        Self {
            vegetation_tries: default_vegetation_tries(),
            flower_chance: default_flower_chance(),
            pool_chance: default_pool_chance(),
            lava_pool_chance: default_lava_pool_chance(),
            dungeon_chance: default_dungeon_chance(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Biomes {
    #[serde(default = "default_climate_freq")]
    pub temp_frequency: f32,
    #[serde(default = "default_climate_freq")]
    pub moisture_frequency: f32,
    #[serde(default = "default_biome_defs")]
    pub defs: Vec<BiomeDef>,
}
fn default_climate_freq() -> f32 {
    0.0015
}
impl Default for Biomes {
    fn default() -> Self {
        Self {
            temp_frequency: default_climate_freq(),
            moisture_frequency: default_climate_freq(),
            defs: default_biome_defs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BiomeDef {
    pub name: String,
    #[serde(default)]
    pub temp_min: Option<f32>,
    #[serde(default)]
    pub temp_max: Option<f32>,
    #[serde(default)]
    pub moisture_min: Option<f32>,
    #[serde(default)]
    pub moisture_max: Option<f32>,
    #[serde(default = "default_top_block")]
    pub top_block: String,
    #[serde(default = "default_filler_block")]
    pub filler_block: String,
    #[serde(default = "default_filler_depth")]
    pub filler_depth: u32,
    #[serde(default)]
    pub base_height: f32,
    #[serde(default = "d_one")]
    pub height_variation: f32,
    #[serde(default = "d_one")]
    pub vegetation: f32,
    /// Biomes unfit for stronghold starts, e.g. oceans.
    #[serde(default)]
    pub no_structures: bool,
}
fn default_top_block() -> String {
    "grass".into()
}
fn default_filler_block() -> String {
    "dirt".into()
}
fn default_filler_depth() -> u32 {
    3
}
fn d_one() -> f32 {
    1.0
}

fn default_biome_defs() -> Vec<BiomeDef> {
    fn biome(name: &str) -> BiomeDef {
        BiomeDef {
            name: name.into(),
            temp_min: None,
            temp_max: None,
            moisture_min: None,
            moisture_max: None,
            top_block: default_top_block(),
            filler_block: default_filler_block(),
            filler_depth: default_filler_depth(),
            base_height: 0.0,
            height_variation: 1.0,
            vegetation: 1.0,
            no_structures: false,
        }
    }
    vec![
        BiomeDef {
            temp_min: Some(0.7),
            moisture_max: Some(0.35),
            top_block: "sand".into(),
            filler_block: "sand".into(),
            base_height: 2.0,
            height_variation: 0.4,
            vegetation: 0.05,
            ..biome("desert")
        },
        BiomeDef {
            temp_max: Some(0.25),
            top_block: "snow".into(),
            base_height: 14.0,
            height_variation: 2.2,
            vegetation: 0.3,
            ..biome("mountains")
        },
        BiomeDef {
            moisture_min: Some(0.8),
            base_height: -18.0,
            height_variation: 0.5,
            vegetation: 0.0,
            no_structures: true,
            top_block: "gravel".into(),
            filler_block: "gravel".into(),
            ..biome("ocean")
        },
        // Fallback: matches everything that falls through the ranges above.
        biome("plains"),
    ]
}

/// Flattened snapshot of `GeneratorConfig` used in tight loops.
#[derive(Clone, Debug)]
pub struct GeneratorParams {
    pub sea_level: i32,
    pub height_scale: f32,
    pub height_factor: f32,
    pub volatility: f32,
    pub density_offset: f32,
    pub low: NoiseLayer,
    pub high: NoiseLayer,
    pub selector: NoiseLayer,
    pub depth: NoiseLayer,
    pub horizontal_limit: i32,
    pub floor_cube_y: i32,
    pub barrier_block: String,
    pub floor_block: String,
    pub caves_enable: bool,
    pub ravines_enable: bool,
    pub strongholds_enable: bool,
    pub lakes_enable: bool,
    pub dungeons_enable: bool,
    pub caves: Caves,
    pub ravines: Ravines,
    pub strongholds: Strongholds,
    pub ores: Vec<OreConfig>,
    pub population: Population,
    pub temp_frequency: f32,
    pub moisture_frequency: f32,
    pub biomes: Vec<BiomeDef>,
}

impl GeneratorParams {
    pub fn from_config(cfg: &GeneratorConfig) -> Self {
        Self {
            sea_level: cfg.shape.sea_level,
            height_scale: cfg.shape.height_scale,
            height_factor: cfg.shape.height_factor,
            volatility: cfg.shape.volatility,
            density_offset: cfg.shape.density_offset,
            low: cfg.noise.low.clone(),
            high: cfg.noise.high.clone(),
            selector: cfg.noise.selector.clone(),
            depth: cfg.noise.depth.clone(),
            horizontal_limit: cfg.boundary.horizontal_limit,
            floor_cube_y: cfg.boundary.floor_cube_y,
            barrier_block: cfg.boundary.barrier_block.clone(),
            floor_block: cfg.boundary.floor_block.clone(),
            caves_enable: cfg.features.caves,
            ravines_enable: cfg.features.ravines,
            strongholds_enable: cfg.features.strongholds,
            lakes_enable: cfg.features.lakes,
            dungeons_enable: cfg.features.dungeons,
            caves: cfg.caves.clone(),
            ravines: cfg.ravines.clone(),
            strongholds: cfg.strongholds.clone(),
            ores: cfg.ores.clone(),
            population: cfg.population.clone(),
            temp_frequency: cfg.biomes.temp_frequency,
            moisture_frequency: cfg.biomes.moisture_frequency,
            biomes: cfg.biomes.defs.clone(),
        }
    }
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }
}

pub fn load_params_from_path(path: &Path) -> Result<GeneratorParams, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: GeneratorConfig = toml::from_str(&s)?;
    Ok(GeneratorParams::from_config(&cfg))
}
