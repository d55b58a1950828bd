//! Strongly typed series metadata.
//!
//! Everything the MPR engine needs from the DICOM headers is collected here
//! once, at the ingestion boundary, and validated before any geometry is
//! built from it.

use crate::transform::GeometryError;

pub const DEFAULT_WINDOW_WIDTH: f64 = 400.0;
pub const DEFAULT_WINDOW_CENTER: f64 = 40.0;

/// In-plane pixel spacing in millimetres.
///
/// `row` scales the row direction cosines (the voxel `i` axis), `column`
/// the column direction cosines (the voxel `j` axis).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSpacing {
    pub row: f64,
    pub column: f64,
}

impl PixelSpacing {
    pub fn new(row: f64, column: f64) -> Self {
        Self { row, column }
    }

    /// Spacing used for reconstructed planes.
    pub fn reconstruction(&self) -> f64 {
        self.row.min(self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowLevel {
    pub width: f64,
    pub center: f64,
}

impl Default for WindowLevel {
    fn default() -> Self {
        Self {
            width: DEFAULT_WINDOW_WIDTH,
            center: DEFAULT_WINDOW_CENTER,
        }
    }
}

impl WindowLevel {
    pub fn new(width: f64, center: f64) -> Self {
        Self { width, center }
    }

    /// Builds a window from optional tag values, falling back to the
    /// soft-tissue defaults for anything absent or not finite.
    pub fn from_tags(width: Option<f64>, center: Option<f64>) -> Self {
        let default = Self::default();
        Self {
            width: width.filter(|w| w.is_finite()).unwrap_or(default.width),
            center: center.filter(|c| c.is_finite()).unwrap_or(default.center),
        }
    }

    pub fn lower(&self) -> f64 {
        self.center - self.width / 2.0
    }

    pub fn upper(&self) -> f64 {
        self.center + self.width / 2.0
    }
}

/// Immutable description of an assembled volume.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeDescriptor {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub pixel_spacing: PixelSpacing,
    pub slice_thickness: f64,
    /// Centre-to-centre distance of consecutive slices; may differ from
    /// `slice_thickness`.
    pub inter_slice_spacing: f64,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub window: WindowLevel,
}

impl VolumeDescriptor {
    /// Extent of the volume in millimetres along the voxel axes.
    ///
    /// The stacking axis spans `(depth - 1)` gaps plus one slice thickness.
    pub fn physical_size(&self) -> [f64; 3] {
        [
            self.pixel_spacing.row * self.width as f64,
            self.pixel_spacing.column * self.height as f64,
            self.inter_slice_spacing * (self.depth.saturating_sub(1)) as f64
                + self.slice_thickness,
        ]
    }

    pub fn voxel_count(&self) -> usize {
        self.width * self.height * self.depth
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DicomSeriesMetadata {
    /// Row cosines followed by column cosines.
    pub image_orientation_patient: [f64; 6],
    /// Position of voxel (0, 0, 0) after sorting.
    pub image_position_patient: [f64; 3],
    pub descriptor: VolumeDescriptor,
}

impl DicomSeriesMetadata {
    pub fn row_cosines(&self) -> [f64; 3] {
        let o = &self.image_orientation_patient;
        [o[0], o[1], o[2]]
    }

    pub fn column_cosines(&self) -> [f64; 3] {
        let o = &self.image_orientation_patient;
        [o[3], o[4], o[5]]
    }

    /// Rejects metadata no transform can be built from.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let d = &self.descriptor;
        let spacings = [
            d.pixel_spacing.row,
            d.pixel_spacing.column,
            d.inter_slice_spacing,
        ];
        if spacings.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(GeometryError::InvalidSpacing {
                row: d.pixel_spacing.row,
                column: d.pixel_spacing.column,
                slice: d.inter_slice_spacing,
            });
        }
        if d.width == 0 || d.height == 0 || d.depth == 0 {
            return Err(GeometryError::EmptyVolume);
        }
        Ok(())
    }
}

/// Parses the first value of a backslash separated DICOM string such as
/// `"40\\400"`.
pub fn first_value(raw: &str) -> Option<f64> {
    raw.split('\\')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn descriptor() -> VolumeDescriptor {
        VolumeDescriptor {
            width: 512,
            height: 512,
            depth: 100,
            pixel_spacing: PixelSpacing::new(0.7, 0.7),
            slice_thickness: 1.25,
            inter_slice_spacing: 1.0,
            rescale_slope: 1.0,
            rescale_intercept: -1024.0,
            window: WindowLevel::default(),
        }
    }

    #[test]
    fn physical_size_pads_the_last_slice_with_its_thickness() {
        let size = descriptor().physical_size();
        assert_relative_eq!(size[0], 358.4, epsilon = 1e-9);
        assert_relative_eq!(size[1], 358.4, epsilon = 1e-9);
        assert_relative_eq!(size[2], 99.0 + 1.25, epsilon = 1e-9);
    }

    #[test]
    fn multi_valued_strings_use_the_first_entry() {
        assert_eq!(first_value("40\\400"), Some(40.0));
        assert_eq!(first_value(" -600 "), Some(-600.0));
        assert_eq!(first_value(""), None);
        assert_eq!(first_value("abc\\3"), None);
    }

    #[test]
    fn missing_window_tags_fall_back_to_defaults() {
        let window = WindowLevel::from_tags(None, Some(f64::NAN));
        assert_eq!(window, WindowLevel::new(400.0, 40.0));
        let window = WindowLevel::from_tags(Some(1500.0), Some(-600.0));
        assert_eq!(window, WindowLevel::new(1500.0, -600.0));
    }

    #[test]
    fn zero_spacing_is_rejected() {
        let mut d = descriptor();
        d.inter_slice_spacing = 0.0;
        let metadata = DicomSeriesMetadata {
            image_orientation_patient: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            image_position_patient: [0.0; 3],
            descriptor: d,
        };
        assert!(matches!(
            metadata.validate(),
            Err(GeometryError::InvalidSpacing { .. })
        ));
    }
}
