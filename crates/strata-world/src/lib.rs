//! World description, coordinate math, and the terrain generation pipeline.
#![forbid(unsafe_code)]

pub mod coords;
pub mod gen;
pub mod worldgen;

mod ground_cache;
mod world;

pub use coords::{ColumnPos, CubePos, CUBE_SIZE};
pub use gen::{CubePrimer, TerrainGenerator, WorldView};
pub use ground_cache::{GroundCache, GroundCacheStats};
pub use world::{GenCtx, World};
pub use worldgen::{GeneratorConfig, GeneratorParams, load_params_from_path};
