use crate::enums::Interpolation;
use crate::interpolator::{Interpolator, apply_window};
use crate::metadata::{DicomSeriesMetadata, VolumeDescriptor};
use crate::render::{ReformatPlaneMaterialParams, ViewCamera, Viewport};
use crate::transform::{GeometryError, SpatialTransform};

use image::ImageBuffer;
use image::Luma;
use nalgebra::{Point3, Vector3};
use ndarray::Array3;
use rayon::prelude::*;

/// Tolerance, in voxels, before a sample counts as outside the volume.
const BOUNDS_TOLERANCE: f64 = 0.001;
/// Starting value of a MIP ray before any in-volume sample was taken.
const MIP_FLOOR: f32 = -3000.0;

/// A fully assembled series: rescaled intensities indexed `[z, y, x]`
/// together with the geometry they were acquired in.
#[derive(Debug)]
pub struct Volume {
    data: Array3<f32>,
    metadata: DicomSeriesMetadata,
    transform: SpatialTransform,
}

impl Volume {
    pub fn new(data: Array3<f32>, metadata: DicomSeriesMetadata) -> Result<Self, GeometryError> {
        let d = &metadata.descriptor;
        let expected = (d.depth, d.height, d.width);
        if data.dim() != expected {
            return Err(GeometryError::ShapeMismatch {
                expected,
                actual: data.dim(),
            });
        }
        if data.is_empty() {
            return Err(GeometryError::EmptyVolume);
        }
        let transform = SpatialTransform::from_metadata(&metadata)?;
        Ok(Self {
            data,
            metadata,
            transform,
        })
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn metadata(&self) -> &DicomSeriesMetadata {
        &self.metadata
    }

    pub fn descriptor(&self) -> &VolumeDescriptor {
        &self.metadata.descriptor
    }

    pub fn transform(&self) -> &SpatialTransform {
        &self.transform
    }

    /// Patient position of the voxel grid centre.
    pub fn center(&self) -> Point3<f64> {
        let d = self.descriptor();
        self.transform.center(d.width, d.height, d.depth)
    }

    fn contains_voxel(&self, voxel: &Point3<f64>, tolerance: f64) -> bool {
        let (depth, height, width) = self.dim();
        let limits = [width, height, depth];
        voxel
            .iter()
            .zip(limits)
            .all(|(v, n)| *v >= -tolerance && *v <= (n - 1) as f64 + tolerance)
    }

    fn sample_voxel(&self, voxel: &Point3<f64>, interpolation: Interpolation) -> f32 {
        let view = self.data.view();
        match interpolation {
            Interpolation::Trilinear => {
                Interpolator::trilinear_interpolate(&view, voxel.x, voxel.y, voxel.z)
            }
            Interpolation::Nearest => Interpolator::nearest(&view, voxel.x, voxel.y, voxel.z),
        }
    }

    /// Intensity at a patient position, `None` when the position falls
    /// outside the voxel grid.
    pub fn sample(&self, patient: &Point3<f64>, interpolation: Interpolation) -> Option<f32> {
        let voxel = self.transform.to_voxel(patient);
        self.contains_voxel(&voxel, BOUNDS_TOLERANCE)
            .then(|| self.sample_voxel(&voxel, interpolation))
    }

    /// Maximum intensity along `direction` over a slab of `samples` steps
    /// spanning `slab_thickness` millimetres centred on `patient`.
    pub fn sample_mip(
        &self,
        patient: &Point3<f64>,
        direction: &Vector3<f64>,
        slab_thickness: f64,
        samples: u32,
        interpolation: Interpolation,
    ) -> f32 {
        if samples <= 1 {
            return self.sample(patient, interpolation).unwrap_or(MIP_FLOOR);
        }
        let direction = direction.normalize();
        let start = patient - direction * (slab_thickness / 2.0);
        let step = direction * (slab_thickness / (samples - 1) as f64);
        (0..samples)
            .filter_map(|i| {
                let voxel = self.transform.to_voxel(&(start + step * i as f64));
                // half a voxel of slack, the extent of a texel
                self.contains_voxel(&voxel, 0.5)
                    .then(|| self.sample_voxel(&voxel, interpolation))
            })
            .fold(MIP_FLOOR, f32::max)
    }

    /// Reslices the volume along a reformat plane into an 8-bit image of the
    /// viewport's size, seen through `camera`. Pixels off the plane or
    /// outside the volume stay black.
    pub fn render_view(
        &self,
        params: &ReformatPlaneMaterialParams,
        camera: &ViewCamera,
        viewport: Viewport,
        interpolation: Interpolation,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        if viewport.is_empty() {
            return None;
        }
        let plane = &params.plane;
        let normal = plane.x_axis.cross(&plane.y_axis);
        let window_center = params.window.center as f32;
        let window_width = params.window.width as f32;

        let pixel_data: Vec<u8> = (0..viewport.height)
            .into_par_iter()
            .flat_map(|y| {
                (0..viewport.width)
                    .map(|x| {
                        let mm = camera.unproject(x, y, viewport);
                        let u = mm.x / plane.width;
                        let v = mm.y / plane.height;
                        if u.abs() > 0.5 || v.abs() > 0.5 {
                            return 0;
                        }
                        let patient = plane.point_at(u, v);
                        let voxel = self.transform.to_voxel(&patient);
                        if !self.contains_voxel(&voxel, BOUNDS_TOLERANCE) {
                            return 0;
                        }
                        let intensity = if params.sample_count > 0 {
                            self.sample_mip(
                                &patient,
                                &normal,
                                params.slab_thickness(),
                                params.sample_count,
                                interpolation,
                            )
                        } else {
                            self.sample_voxel(&voxel, interpolation)
                        };
                        Self::normalize_to_u8(apply_window(intensity, window_center, window_width))
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        ImageBuffer::from_raw(viewport.width, viewport.height, pixel_data)
    }

    #[inline]
    fn normalize_to_u8(value: f32) -> u8 {
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    }
}
