//! Coarse-grid density evaluation with trilinear reconstruction.
//!
//! The density field is expensive, so it is evaluated only at the corners of
//! scale-sized cells and interpolated linearly per axis in between. Corner
//! positions depend only on absolute coordinates, so adjacent cubes sampling
//! the same cell boundary reconstruct identical values and no seams appear.

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn bilerp(u: f64, v: f64, c00: f64, c10: f64, c01: f64, c11: f64) -> f64 {
    lerp(v, lerp(u, c00, c10), lerp(u, c01, c11))
}

/// Walk every block position covered by the section range, feeding the
/// consumer the interpolated density and its per-axis gradients.
///
/// `min_section`/`max_section` are in cell units (half-open range); `scale`
/// is the cell edge in blocks per axis. The field closure is called at cell
/// corners only.
pub fn sample_scaled<F, C>(
    min_section: (i32, i32, i32),
    max_section: (i32, i32, i32),
    scale: (usize, usize, usize),
    field: &mut F,
    consumer: &mut C,
) where
    F: FnMut(i32, i32, i32) -> f64,
    C: FnMut(i32, i32, i32, f64, f64, f64, f64),
{
    let (sx, sy, sz) = scale;
    let step_x = 1.0 / sx as f64;
    let step_y = 1.0 / sy as f64;
    let step_z = 1.0 / sz as f64;

    for section_x in min_section.0..max_section.0 {
        let x0 = section_x * sx as i32;
        for section_z in min_section.2..max_section.2 {
            let z0 = section_z * sz as i32;
            for section_y in min_section.1..max_section.1 {
                let y0 = section_y * sy as i32;

                let v000 = field(x0, y0, z0);
                let v001 = field(x0, y0, z0 + sz as i32);
                let v010 = field(x0, y0 + sy as i32, z0);
                let v011 = field(x0, y0 + sy as i32, z0 + sz as i32);
                let v100 = field(x0 + sx as i32, y0, z0);
                let v101 = field(x0 + sx as i32, y0, z0 + sz as i32);
                let v110 = field(x0 + sx as i32, y0 + sy as i32, z0);
                let v111 = field(x0 + sx as i32, y0 + sy as i32, z0 + sz as i32);

                for x_rel in 0..sx {
                    let fx = x_rel as f64 * step_x;
                    for z_rel in 0..sz {
                        let fz = z_rel as f64 * step_z;
                        for y_rel in 0..sy {
                            let fy = y_rel as f64 * step_y;

                            let v_y0 = bilerp(fx, fz, v000, v100, v001, v101);
                            let v_y1 = bilerp(fx, fz, v010, v110, v011, v111);
                            let v = lerp(fy, v_y0, v_y1);

                            // Within a cell the field is linear per axis, so
                            // each gradient is a bilinear blend of corner
                            // differences along that axis.
                            let d_dx = bilerp(
                                fy,
                                fz,
                                v100 - v000,
                                v110 - v010,
                                v101 - v001,
                                v111 - v011,
                            ) * step_x;
                            let d_dy = (v_y1 - v_y0) * step_y;
                            let d_dz = bilerp(
                                fx,
                                fy,
                                v001 - v000,
                                v101 - v100,
                                v011 - v010,
                                v111 - v110,
                            ) * step_z;

                            consumer(
                                x0 + x_rel as i32,
                                y0 + y_rel as i32,
                                z0 + z_rel as i32,
                                d_dx,
                                d_dy,
                                d_dz,
                                v,
                            );
                        }
                    }
                }
            }
        }
    }
}
