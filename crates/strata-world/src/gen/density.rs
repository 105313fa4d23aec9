use crate::gen::biome::BiomeSource;
use crate::ground_cache::pack_column;
use crate::world::GenCtx;

/// Ground height for a world column: sea level shifted by the biome base and
/// the 2D depth noise scaled by the biome's height variation. Cached, since
/// neighboring cubes resample the same columns.
pub fn ground_height(ctx: &GenCtx, biomes: &BiomeSource, bx: i32, bz: i32) -> i32 {
    ctx.ground.get_or_compute(pack_column(bx, bz), || {
        let biome = biomes.at(bx, bz);
        let depth = ctx.depth.get_noise_2d(bx as f32, bz as f32);
        let p = &ctx.params;
        let h = p.sea_level as f32
            + biome.base_height
            + depth * p.height_scale * biome.height_variation;
        h.floor() as i32
    })
}

/// Scalar density at a block position; positive means solid.
///
/// Two independent 3D noises are blended by a clamped selector, then shifted
/// by distance to the column's ground height so the field crosses zero near
/// the surface and grows solid with depth.
pub fn density(ctx: &GenCtx, biomes: &BiomeSource, x: i32, y: i32, z: i32) -> f64 {
    let p = &ctx.params;
    let xf = x as f32;
    let yf = y as f32;
    let zf = z as f32;
    let sel = f64::from(ctx.selector.get_noise_3d(xf, yf, zf) * 0.5 + 0.5).clamp(0.0, 1.0);
    let low = f64::from(ctx.low.get_noise_3d(xf, yf, zf));
    let high = f64::from(ctx.high.get_noise_3d(xf, yf, zf));
    let blend = low + (high - low) * sel;
    let ground = ground_height(ctx, biomes, x, z);
    blend * f64::from(p.volatility)
        + f64::from(ground - y) * f64::from(p.height_factor)
        + f64::from(p.density_offset)
}
