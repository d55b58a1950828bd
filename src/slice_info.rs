//! Sampling geometry of a reformatted plane over the whole volume.

use nalgebra::{Vector2, Vector3};

use crate::metadata::VolumeDescriptor;
use crate::transform::SpatialTransform;

const PARALLEL_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceInfo {
    /// Footprint of the volume on the plane, in millimetres.
    pub size: Vector2<f64>,
    /// `size` in reconstruction pixels, rounded up.
    pub pixel_size: Vector2<u32>,
    /// Number of distinct slices along the normal.
    pub count: usize,
    /// Span of the volume along the normal, in millimetres.
    pub total_thickness: f64,
    /// Smallest step along the normal that reaches a new voxel layer.
    pub sampling_interval: f64,
}

impl SliceInfo {
    pub fn calculate(
        x_axis: &Vector3<f64>,
        y_axis: &Vector3<f64>,
        normal: Option<&Vector3<f64>>,
        descriptor: &VolumeDescriptor,
        transform: &SpatialTransform,
    ) -> Self {
        let corners =
            transform.bounding_corners(descriptor.width, descriptor.height, descriptor.depth);

        let span = |axis: &Vector3<f64>| {
            let (min, max) = corners
                .iter()
                .map(|corner| corner.coords.dot(axis))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p), hi.max(p))
                });
            max - min
        };

        let size = Vector2::new(span(x_axis), span(y_axis));
        let recon = descriptor.pixel_spacing.reconstruction();
        let pixel_size = Vector2::new(
            (size.x / recon).ceil() as u32,
            (size.y / recon).ceil() as u32,
        );

        let normal = normal
            .copied()
            .unwrap_or_else(|| x_axis.cross(y_axis))
            .normalize();
        let total_thickness = span(&normal);
        let sampling_interval = sampling_interval(&normal, descriptor);

        let count = if sampling_interval == 0.0 || !sampling_interval.is_finite() {
            0
        } else {
            (total_thickness / sampling_interval).floor() as usize
        };

        Self {
            size,
            pixel_size,
            count,
            total_thickness,
            sampling_interval,
        }
    }

    /// Signed distance from the volume centre of the 1-based slice `index`.
    pub fn offset_of(&self, index: f64) -> f64 {
        let i = index - 1.0 - (self.count as f64 - 1.0) / 2.0;
        i * self.sampling_interval
    }

    /// Inverse of [`SliceInfo::offset_of`].
    pub fn index_of(&self, offset: f64) -> f64 {
        if self.sampling_interval == 0.0 {
            return 1.0;
        }
        offset / self.sampling_interval + 1.0 + (self.count as f64 - 1.0) / 2.0
    }
}

/// Minimum of the per-axis voxel steps projected onto `normal`; axes the
/// normal is perpendicular to never cross a voxel boundary and are skipped.
fn sampling_interval(normal: &Vector3<f64>, descriptor: &VolumeDescriptor) -> f64 {
    let spacing = [
        descriptor.pixel_spacing.row,
        descriptor.pixel_spacing.column,
        descriptor.inter_slice_spacing,
    ];
    normal
        .iter()
        .zip(spacing)
        .map(|(n, s)| {
            let n = n.abs();
            if n < PARALLEL_EPSILON {
                f64::INFINITY
            } else {
                s / n
            }
        })
        .fold(f64::INFINITY, f64::min)
}
