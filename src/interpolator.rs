use ndarray::ArrayView3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Samples `volume` (indexed `[z, y, x]`) at continuous voxel
    /// coordinates, clamping to the edge like a `ClampToEdge` sampler.
    #[inline]
    pub(crate) fn trilinear_interpolate(volume: &ArrayView3<f32>, x: f64, y: f64, z: f64) -> f32 {
        let (depth, height, width) = volume.dim();

        let x = x.clamp(0.0, (width - 1) as f64);
        let y = y.clamp(0.0, (height - 1) as f64);
        let z = z.clamp(0.0, (depth - 1) as f64);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = (x - x0 as f64) as f32;
        let dy = (y - y0 as f64) as f32;
        let dz = (z - z0 as f64) as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let lerp_x = |zi: usize, yi: usize| {
            let v0 = volume[[zi, yi, x0]];
            let v1 = volume[[zi, yi, x1]];
            v0.mul_add(one_minus_dx, v1 * dx)
        };

        let c0 = lerp_x(z0, y0).mul_add(one_minus_dy, lerp_x(z0, y1) * dy);
        let c1 = lerp_x(z1, y0).mul_add(one_minus_dy, lerp_x(z1, y1) * dy);

        c0.mul_add(one_minus_dz, c1 * dz)
    }

    #[inline]
    pub(crate) fn nearest(volume: &ArrayView3<f32>, x: f64, y: f64, z: f64) -> f32 {
        let (depth, height, width) = volume.dim();
        let xi = (x.round().max(0.0) as usize).min(width - 1);
        let yi = (y.round().max(0.0) as usize).min(height - 1);
        let zi = (z.round().max(0.0) as usize).min(depth - 1);
        volume[[zi, yi, xi]]
    }
}

/// Linear window/level mapping of an intensity onto `[0, 1]`.
#[inline]
pub fn apply_window(intensity: f32, center: f32, width: f32) -> f32 {
    let lower = center - width / 2.0;
    ((intensity - lower) / width).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((2, 2, 2), |(z, y, x)| (x + 2 * y + 4 * z) as f32)
    }

    #[test]
    fn trilinear_hits_grid_points_exactly() {
        let volume = ramp();
        let view = volume.view();
        assert_relative_eq!(Interpolator::trilinear_interpolate(&view, 1.0, 1.0, 1.0), 7.0);
        assert_relative_eq!(Interpolator::trilinear_interpolate(&view, 0.0, 1.0, 0.0), 2.0);
    }

    #[test]
    fn trilinear_blends_linearly() {
        let volume = ramp();
        let view = volume.view();
        assert_relative_eq!(
            Interpolator::trilinear_interpolate(&view, 0.5, 0.5, 0.5),
            3.5,
            epsilon = 1e-6
        );
        // clamped outside the grid
        assert_relative_eq!(Interpolator::trilinear_interpolate(&view, 5.0, -3.0, 0.0), 1.0);
    }

    #[test]
    fn nearest_rounds_to_the_closest_voxel() {
        let volume = ramp();
        let view = volume.view();
        assert_eq!(Interpolator::nearest(&view, 0.6, 0.4, 0.9), 5.0);
    }

    #[test]
    fn window_clamps_outside_its_range() {
        let (center, width) = (40.0, 400.0);
        let eps = 1e-3;
        assert_eq!(apply_window(center - width / 2.0 - eps, center, width), 0.0);
        assert_eq!(apply_window(center + width / 2.0 + eps, center, width), 1.0);
        assert_relative_eq!(apply_window(center, center, width), 0.5);
    }
}
