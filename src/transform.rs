use nalgebra::{Matrix4, Point3, Vector3};
use thiserror::Error;

use crate::metadata::DicomSeriesMetadata;

const DEGENERATE_EPSILON: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Orientation vectors are parallel, the stacking normal is undefined")]
    DegenerateOrientation,

    #[error("Orientation contains a zero-length direction vector")]
    ZeroLengthAxis,

    #[error("Voxel to patient transform is not invertible")]
    NonInvertible,

    #[error("Invalid spacing (row {row}, column {column}, slice {slice})")]
    InvalidSpacing { row: f64, column: f64, slice: f64 },

    #[error("Volume has no voxels")]
    EmptyVolume,

    #[error("Voxel data has shape {actual:?}, metadata describes {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
}

/// Affine mapping between voxel indices and patient millimetres.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialTransform {
    voxel_to_patient: Matrix4<f64>,
    patient_to_voxel: Matrix4<f64>,
}

impl SpatialTransform {
    /// Builds the transform from ImageOrientationPatient, ImagePositionPatient,
    /// PixelSpacing and the inter-slice spacing.
    ///
    /// The direction cosines are used as given; only degenerate input is
    /// rejected.
    pub fn new(
        orientation: &[f64; 6],
        position: &[f64; 3],
        pixel_spacing: (f64, f64),
        inter_slice_spacing: f64,
    ) -> Result<Self, GeometryError> {
        let row = Vector3::new(orientation[0], orientation[1], orientation[2]);
        let column = Vector3::new(orientation[3], orientation[4], orientation[5]);
        if row.norm() < DEGENERATE_EPSILON || column.norm() < DEGENERATE_EPSILON {
            return Err(GeometryError::ZeroLengthAxis);
        }
        let normal = row.cross(&column);
        if normal.norm() < DEGENERATE_EPSILON {
            return Err(GeometryError::DegenerateOrientation);
        }

        let (row_spacing, column_spacing) = pixel_spacing;
        let x = row * row_spacing;
        let y = column * column_spacing;
        let z = normal * inter_slice_spacing;
        #[rustfmt::skip]
        let voxel_to_patient = Matrix4::new(
            x.x, y.x, z.x, position[0],
            x.y, y.y, z.y, position[1],
            x.z, y.z, z.z, position[2],
            0.0, 0.0, 0.0, 1.0,
        );
        let patient_to_voxel = voxel_to_patient
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(GeometryError::NonInvertible)?;

        Ok(Self {
            voxel_to_patient,
            patient_to_voxel,
        })
    }

    pub fn from_metadata(metadata: &DicomSeriesMetadata) -> Result<Self, GeometryError> {
        metadata.validate()?;
        let d = &metadata.descriptor;
        Self::new(
            &metadata.image_orientation_patient,
            &metadata.image_position_patient,
            (d.pixel_spacing.row, d.pixel_spacing.column),
            d.inter_slice_spacing,
        )
    }

    pub fn voxel_to_patient(&self) -> &Matrix4<f64> {
        &self.voxel_to_patient
    }

    pub fn patient_to_voxel(&self) -> &Matrix4<f64> {
        &self.patient_to_voxel
    }

    pub fn to_patient(&self, voxel: &Point3<f64>) -> Point3<f64> {
        self.voxel_to_patient.transform_point(voxel)
    }

    pub fn to_voxel(&self, patient: &Point3<f64>) -> Point3<f64> {
        self.patient_to_voxel.transform_point(patient)
    }

    /// The eight corners of the voxel box `[0,w]x[0,h]x[0,d]` in patient space.
    pub fn bounding_corners(&self, width: usize, height: usize, depth: usize) -> [Point3<f64>; 8] {
        let (w, h, d) = (width as f64, height as f64, depth as f64);
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(w, 0.0, 0.0),
            Point3::new(0.0, h, 0.0),
            Point3::new(0.0, 0.0, d),
            Point3::new(w, h, 0.0),
            Point3::new(w, 0.0, d),
            Point3::new(0.0, h, d),
            Point3::new(w, h, d),
        ]
        .map(|corner| self.to_patient(&corner))
    }

    /// Patient position of the voxel grid centre `((w-1)/2, (h-1)/2, (d-1)/2)`.
    pub fn center(&self, width: usize, height: usize, depth: usize) -> Point3<f64> {
        let half = |n: usize| (n.saturating_sub(1)) as f64 / 2.0;
        self.to_patient(&Point3::new(half(width), half(height), half(depth)))
    }
}

/// Centre-to-centre distance of the first two sorted slice positions, or the
/// declared slice thickness when fewer than two slices exist.
pub fn inter_slice_spacing(sorted_positions: &[[f64; 3]], slice_thickness: f64) -> f64 {
    match sorted_positions {
        [first, second, ..] => {
            let a = Vector3::from(*first);
            let b = Vector3::from(*second);
            (b - a).norm()
        }
        _ => slice_thickness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    fn oblique() -> SpatialTransform {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        SpatialTransform::new(
            &[s, s, 0.0, 0.0, 0.0, -1.0],
            &[-120.5, 33.0, 870.25],
            (0.68, 0.74),
            1.25,
        )
        .unwrap()
    }

    #[test]
    fn identity_orientation_maps_indices_to_millimetres() {
        let t = SpatialTransform::new(&IDENTITY, &[0.0; 3], (1.0, 1.0), 1.0).unwrap();
        assert_eq!(t.to_patient(&Point3::origin()), Point3::origin());
        let p = t.to_patient(&Point3::new(1.0, 1.0, 2.0));
        assert_relative_eq!(p, Point3::new(1.0, 1.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn round_trip_through_both_matrices() {
        let t = oblique();
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(512.0, 0.0, 0.0),
            Point3::new(0.0, 512.0, 0.0),
            Point3::new(0.0, 0.0, 300.0),
            Point3::new(512.0, 512.0, 300.0),
            Point3::new(17.25, 400.5, 3.75),
        ];
        for voxel in corners {
            let back = t.to_voxel(&t.to_patient(&voxel));
            assert_relative_eq!(back, voxel, epsilon = 1e-6);
        }
    }

    #[test]
    fn translation_is_the_position_of_the_first_voxel() {
        let t = oblique();
        let origin = t.to_patient(&Point3::origin());
        assert_relative_eq!(origin, Point3::new(-120.5, 33.0, 870.25), epsilon = 1e-12);
    }

    #[test]
    fn parallel_cosines_are_rejected() {
        let err = SpatialTransform::new(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0], &[0.0; 3], (1.0, 1.0), 1.0);
        assert_eq!(err, Err(GeometryError::DegenerateOrientation));
        let err = SpatialTransform::new(&[0.0; 6], &[0.0; 3], (1.0, 1.0), 1.0);
        assert_eq!(err, Err(GeometryError::ZeroLengthAxis));
    }

    #[test]
    fn zero_slice_spacing_is_not_invertible() {
        let err = SpatialTransform::new(&IDENTITY, &[0.0; 3], (1.0, 1.0), 0.0);
        assert_eq!(err, Err(GeometryError::NonInvertible));
    }

    #[test]
    fn spacing_comes_from_positions_not_thickness() {
        let positions = [[0.0, 0.0, 10.0], [0.0, 0.0, 12.5], [0.0, 0.0, 15.0]];
        assert_relative_eq!(inter_slice_spacing(&positions, 5.0), 2.5);
        assert_relative_eq!(inter_slice_spacing(&positions[..1], 5.0), 5.0);
    }
}
