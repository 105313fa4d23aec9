//! CLI front end: open or create a world, pregenerate cubes, probe storage.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use strata_blocks::BlockRegistry;
use strata_runtime::CubeProvider;
use strata_store::{CubeStore, StoreConfig};
use strata_world::{CubePos, GeneratorParams, World, load_params_from_path};

#[derive(Parser)]
#[command(name = "strata", about = "Cubic voxel world toolkit")]
struct Cli {
    /// World directory (created on demand).
    #[arg(long, default_value = "world")]
    world: PathBuf,
    /// World seed.
    #[arg(long, default_value_t = 0)]
    seed: i64,
    /// Generator configuration TOML; defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Block registry TOML; the built-in set applies when absent.
    #[arg(long)]
    blocks: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate (or load) every cube in a box and save the results.
    Generate {
        #[arg(long, default_value = "0,4,0", value_parser = parse_pos)]
        center: CubePos,
        #[arg(long, default_value_t = 2)]
        radius: i32,
        /// Evict everything after saving instead of keeping it resident.
        #[arg(long)]
        evict: bool,
    },
    /// Inspect one stored cube without generating anything.
    Probe {
        #[arg(value_parser = parse_pos)]
        pos: CubePos,
    },
    /// Find the nearest stronghold to a block position.
    Locate {
        #[arg(default_value = "0,64,0", value_parser = parse_block)]
        from: (i32, i32, i32),
    },
}

fn parse_block(s: &str) -> Result<(i32, i32, i32), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("expected x,y,z".to_string());
    }
    let mut v = [0i32; 3];
    for (slot, part) in v.iter_mut().zip(&parts) {
        *slot = part.trim().parse().map_err(|e| format!("{e}"))?;
    }
    Ok((v[0], v[1], v[2]))
}

fn parse_pos(s: &str) -> Result<CubePos, String> {
    parse_block(s).map(|(x, y, z)| CubePos::new(x, y, z))
}

fn load_registry(cli: &Cli) -> Arc<BlockRegistry> {
    match &cli.blocks {
        Some(path) => match BlockRegistry::load_from_path(path) {
            Ok(reg) => Arc::new(reg),
            Err(e) => {
                log::warn!(
                    "failed to load {}: {e}; using built-in blocks",
                    path.display()
                );
                Arc::new(BlockRegistry::builtin())
            }
        },
        None => Arc::new(BlockRegistry::builtin()),
    }
}

fn load_gen_params(cli: &Cli) -> GeneratorParams {
    match &cli.config {
        Some(path) => match load_params_from_path(path) {
            Ok(params) => params,
            Err(e) => {
                log::warn!(
                    "failed to load {}: {e}; using generator defaults",
                    path.display()
                );
                GeneratorParams::default()
            }
        },
        None => GeneratorParams::default(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let reg = load_registry(&cli);
    let world = Arc::new(World::new(cli.seed, load_gen_params(&cli)));

    match cli.command {
        Command::Generate {
            center,
            radius,
            evict,
        } => {
            let store = CubeStore::open(&cli.world, StoreConfig::default())?;
            let mut provider = CubeProvider::new(world, reg, store);
            let t0 = Instant::now();
            provider.pregenerate(center, radius);
            let elapsed = t0.elapsed();
            let stats = provider.stats();
            println!(
                "{} cubes resident in {} columns ({} generated, {} loaded) in {:.2?}",
                stats.resident_cubes, stats.resident_columns, stats.generated, stats.loaded, elapsed
            );
            if evict {
                let evicted = provider.evict_outside(center, -1)?;
                println!(
                    "evicted {} cubes ({} saved), dropped {} columns",
                    evicted.cubes_evicted, evicted.cubes_saved, evicted.columns_dropped
                );
            }
            provider.close()?;
        }
        Command::Probe { pos } => {
            let store = CubeStore::open(&cli.world, StoreConfig { read_only: true })?;
            if let Some(cube) = store.load_cube(pos) {
                let non_air = cube.blocks().iter().filter(|b| !b.is_air()).count();
                println!(
                    "cube {:?}: {} non-air voxels, populated: {}, {} entities",
                    pos,
                    non_air,
                    cube.is_populated(),
                    cube.entities().len()
                );
            } else {
                println!("cube {pos:?}: not stored");
            }
            if !store.column_exists(pos.column()) {
                println!("column {:?}: not stored", pos.column());
            }
        }
        Command::Locate { from } => {
            let store = CubeStore::open(&cli.world, StoreConfig { read_only: true })?;
            let provider = CubeProvider::new(world, reg, store);
            match provider
                .generator()
                .closest_structure("stronghold", from, false)
            {
                Some((x, y, z)) => println!("nearest stronghold near block ({x}, {y}, {z})"),
                None => println!("no stronghold within search range"),
            }
        }
    }
    Ok(())
}
