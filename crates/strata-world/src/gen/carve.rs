//! Cave and ravine carving.
//!
//! Every cube within reach acts as a potential tunnel source, seeded purely
//! from the world seed and its own coordinates. The walk is replayed in full
//! for each generated cube, but only voxels inside the current cube are
//! touched, so tunnels line up across cube boundaries without any neighbor
//! being resident.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f32::consts::{PI, TAU};
use strata_blocks::{Block, BlockRegistry};

use crate::coords::{CUBE_SIZE, CubePos};
use crate::gen::primer::CubePrimer;
use crate::world::World;

const CAVE_SALT: u64 = 0x63_61_76_65; // "cave"
const RAVINE_SALT: u64 = 0x72_61_76_69; // "ravi"

pub(super) fn carve_caves(
    world: &World,
    reg: &BlockRegistry,
    barrier: Block,
    pos: CubePos,
    primer: &mut CubePrimer,
) {
    let cfg = &world.params.caves;
    let range = cfg.max_length as i32 / CUBE_SIZE + 1;
    for_each_source(pos, range, |source| {
        let mut rng = ChaCha8Rng::seed_from_u64(world.cube_seed(source) ^ CAVE_SALT);
        if rng.gen::<f32>() >= cfg.rarity {
            return;
        }
        let systems = rng.gen_range(1..=cfg.max_systems.max(1));
        for _ in 0..systems {
            let (sx, sy, sz) = source.min_block();
            let start = (
                f64::from(sx + rng.gen_range(0..CUBE_SIZE)) + 0.5,
                f64::from(sy + rng.gen_range(0..CUBE_SIZE)) + 0.5,
                f64::from(sz + rng.gen_range(0..CUBE_SIZE)) + 0.5,
            );
            let lo = (cfg.max_length / 2).max(1);
            let length = rng.gen_range(lo..=cfg.max_length.max(lo));
            let base_radius = 1.0 + rng.gen::<f32>() * cfg.radius;
            let mut yaw = rng.gen::<f32>() * TAU;
            let mut pitch = (rng.gen::<f32>() - 0.5) * 0.6;
            let (mut x, mut y, mut z) = start;
            for step in 0..length {
                x += f64::from(yaw.cos() * pitch.cos());
                z += f64::from(yaw.sin() * pitch.cos());
                y += f64::from(pitch.sin());
                yaw += (rng.gen::<f32>() - 0.5) * 0.4;
                pitch = ((pitch + (rng.gen::<f32>() - 0.5) * 0.3) * 0.92).clamp(-1.2, 1.2);
                let t = step as f32 / length as f32;
                let r = f64::from((base_radius * (PI * t).sin()).max(1.0));
                carve_ball(primer, pos, reg, barrier, x, y, z, r, r);
            }
        }
    });
}

pub(super) fn carve_ravines(
    world: &World,
    reg: &BlockRegistry,
    barrier: Block,
    pos: CubePos,
    primer: &mut CubePrimer,
) {
    let cfg = &world.params.ravines;
    let reach = cfg.max_length.max(cfg.depth as u32) as i32;
    let range = reach / CUBE_SIZE + 1;
    for_each_source(pos, range, |source| {
        let mut rng = ChaCha8Rng::seed_from_u64(world.cube_seed(source) ^ RAVINE_SALT);
        if rng.gen::<f32>() >= cfg.rarity {
            return;
        }
        let (sx, sy, sz) = source.min_block();
        let mut x = f64::from(sx + rng.gen_range(0..CUBE_SIZE)) + 0.5;
        let mut y = f64::from(sy + rng.gen_range(0..CUBE_SIZE)) + 0.5;
        let mut z = f64::from(sz + rng.gen_range(0..CUBE_SIZE)) + 0.5;
        let lo = (cfg.max_length / 2).max(1);
        let length = rng.gen_range(lo..=cfg.max_length.max(lo));
        let half_depth = f64::from(cfg.depth) * 0.5;
        let mut yaw = rng.gen::<f32>() * TAU;
        // Ravines run nearly level and cut a tall, narrow slot.
        let mut pitch = (rng.gen::<f32>() - 0.5) * 0.1;
        for step in 0..length {
            x += f64::from(yaw.cos() * pitch.cos());
            z += f64::from(yaw.sin() * pitch.cos());
            y += f64::from(pitch.sin());
            yaw += (rng.gen::<f32>() - 0.5) * 0.2;
            pitch = ((pitch + (rng.gen::<f32>() - 0.5) * 0.1) * 0.9).clamp(-0.3, 0.3);
            let t = step as f32 / length as f32;
            let width = f64::from((2.8 * (PI * t).sin()).max(1.0));
            carve_ball(primer, pos, reg, barrier, x, y, z, width, half_depth);
        }
    });
}

fn for_each_source(pos: CubePos, range: i32, mut visit: impl FnMut(CubePos)) {
    for scy in (pos.y - range)..=(pos.y + range) {
        for scx in (pos.x - range)..=(pos.x + range) {
            for scz in (pos.z - range)..=(pos.z + range) {
                visit(CubePos::new(scx, scy, scz));
            }
        }
    }
}

/// Remove carvable blocks inside an axis-aligned ellipsoid, clamped to the
/// cube being generated. Liquids and the barrier block are never carved.
#[allow(clippy::too_many_arguments)]
fn carve_ball(
    primer: &mut CubePrimer,
    pos: CubePos,
    reg: &BlockRegistry,
    barrier: Block,
    cx: f64,
    cy: f64,
    cz: f64,
    radius_h: f64,
    radius_v: f64,
) {
    let (bx0, by0, bz0) = pos.min_block();
    let clamp16 = |v: i32| v.clamp(0, CUBE_SIZE - 1);
    let x_min = clamp16((cx - radius_h).floor() as i32 - bx0);
    let x_max = clamp16((cx + radius_h).ceil() as i32 - bx0);
    let y_min = clamp16((cy - radius_v).floor() as i32 - by0);
    let y_max = clamp16((cy + radius_v).ceil() as i32 - by0);
    let z_min = clamp16((cz - radius_h).floor() as i32 - bz0);
    let z_max = clamp16((cz + radius_h).ceil() as i32 - bz0);
    if (cx + radius_h) < f64::from(bx0)
        || (cx - radius_h) > f64::from(bx0 + CUBE_SIZE)
        || (cy + radius_v) < f64::from(by0)
        || (cy - radius_v) > f64::from(by0 + CUBE_SIZE)
        || (cz + radius_h) < f64::from(bz0)
        || (cz - radius_h) > f64::from(bz0 + CUBE_SIZE)
    {
        return;
    }
    for lx in x_min..=x_max {
        let dx = (f64::from(bx0 + lx) + 0.5 - cx) / radius_h;
        for lz in z_min..=z_max {
            let dz = (f64::from(bz0 + lz) + 0.5 - cz) / radius_h;
            for ly in y_min..=y_max {
                let dy = (f64::from(by0 + ly) + 0.5 - cy) / radius_v;
                if dx * dx + dy * dy + dz * dz >= 1.0 {
                    continue;
                }
                let b = primer.get(lx as usize, ly as usize, lz as usize);
                if b != barrier && reg.is_solid(b) {
                    primer.set(lx as usize, ly as usize, lz as usize, Block::AIR);
                }
            }
        }
    }
}
