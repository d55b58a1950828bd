use crate::{
    enums::SortBy,
    metadata::{DicomSeriesMetadata, PixelSpacing, VolumeDescriptor, WindowLevel, first_value},
    transform::{GeometryError, inter_slice_spacing},
    volume::Volume,
};

use dicom::core::Tag;
use dicom::core::value::Value;
use dicom::object::{FileDicomObject, InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use futures::future::try_join_all;
use nalgebra::Vector3;
use ndarray::Array3;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use web_time::Instant;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing or unreadable attribute {0}")]
    MissingTag(&'static str),

    #[error("Unsupported pixel encoding: {bits_allocated} bits allocated, encapsulated: {encapsulated}")]
    UnsupportedEncoding { bits_allocated: u16, encapsulated: bool },

    #[error("Pixel data holds {actual} bytes, expected {expected}")]
    PixelDataLength { expected: usize, actual: usize },

    #[error("Failed to load slice {index}: {source}")]
    SliceLoad {
        index: usize,
        #[source]
        source: Box<VolumeLoaderError>,
    },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Loader task failed: {0}")]
    Join(String),
}

/// Header fields and raw pixel bytes of one image of a series.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceRecord {
    pub rows: usize,
    pub columns: usize,
    pub image_orientation_patient: [f64; 6],
    pub image_position_patient: [f64; 3],
    pub pixel_spacing: PixelSpacing,
    pub slice_thickness: f64,
    pub instance_number: Option<i32>,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub window_width: Option<f64>,
    pub window_center: Option<f64>,
    pub bits_allocated: u16,
    /// `1` for two's complement samples.
    pub pixel_representation: u16,
    /// Little-endian samples, row-major.
    pub pixel_data: Vec<u8>,
}

impl SliceRecord {
    pub fn from_dicom_object(obj: &InMemDicomObject) -> Result<Self, VolumeLoaderError> {
        let orientation = floats(obj, tags::IMAGE_ORIENTATION_PATIENT, "ImageOrientationPatient")?;
        let position = floats(obj, tags::IMAGE_POSITION_PATIENT, "ImagePositionPatient")?;
        let spacing = floats(obj, tags::PIXEL_SPACING, "PixelSpacing")?;
        let (
            [r0, r1, r2, c0, c1, c2],
            [px, py, pz],
            [row_spacing, column_spacing],
        ) = (
            <[f64; 6]>::try_from(orientation.as_slice())
                .map_err(|_| VolumeLoaderError::MissingTag("ImageOrientationPatient"))?,
            <[f64; 3]>::try_from(position.as_slice())
                .map_err(|_| VolumeLoaderError::MissingTag("ImagePositionPatient"))?,
            <[f64; 2]>::try_from(spacing.as_slice())
                .map_err(|_| VolumeLoaderError::MissingTag("PixelSpacing"))?,
        );

        let bits_allocated = int(obj, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let element = obj
            .element(tags::PIXEL_DATA)
            .map_err(|_| VolumeLoaderError::MissingTag("PixelData"))?;
        // compressed transfer syntaxes store the frames as fragments
        if let Value::PixelSequence(_) = element.value() {
            return Err(VolumeLoaderError::UnsupportedEncoding {
                bits_allocated,
                encapsulated: true,
            });
        }
        let pixel_data = element
            .to_bytes()
            .map_err(|_| VolumeLoaderError::MissingTag("PixelData"))?
            .to_vec();

        Ok(Self {
            rows: int(obj, tags::ROWS, "Rows")?,
            columns: int(obj, tags::COLUMNS, "Columns")?,
            image_orientation_patient: [r0, r1, r2, c0, c1, c2],
            image_position_patient: [px, py, pz],
            pixel_spacing: PixelSpacing::new(row_spacing, column_spacing),
            slice_thickness: float(obj, tags::SLICE_THICKNESS).unwrap_or(1.0),
            instance_number: int(obj, tags::INSTANCE_NUMBER, "InstanceNumber").ok(),
            rescale_slope: float(obj, tags::RESCALE_SLOPE).unwrap_or(1.0),
            rescale_intercept: float(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0),
            window_width: leading_value(obj, tags::WINDOW_WIDTH),
            window_center: leading_value(obj, tags::WINDOW_CENTER),
            bits_allocated,
            pixel_representation: int(obj, tags::PIXEL_REPRESENTATION, "PixelRepresentation")
                .unwrap_or(0),
            pixel_data,
        })
    }

    fn normal(&self) -> Vector3<f64> {
        let o = &self.image_orientation_patient;
        Vector3::new(o[0], o[1], o[2]).cross(&Vector3::new(o[3], o[4], o[5]))
    }

    /// Decodes the stored samples and applies the modality rescale.
    pub fn decode(&self) -> Result<Vec<f32>, VolumeLoaderError> {
        let samples = self.rows * self.columns;
        let bytes_per_sample = match self.bits_allocated {
            8 => 1,
            16 => 2,
            bits_allocated => {
                return Err(VolumeLoaderError::UnsupportedEncoding {
                    bits_allocated,
                    encapsulated: false,
                });
            }
        };
        let expected = samples * bytes_per_sample;
        if self.pixel_data.len() < expected {
            return Err(VolumeLoaderError::PixelDataLength {
                expected,
                actual: self.pixel_data.len(),
            });
        }

        let slope = self.rescale_slope as f32;
        let intercept = self.rescale_intercept as f32;
        let bytes = &self.pixel_data[..expected];
        let values = match (bytes_per_sample, self.pixel_representation) {
            (1, _) => bytes.iter().map(|&b| b as f32).collect::<Vec<_>>(),
            (_, 1) => bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32)
                .collect(),
            _ => bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
                .collect(),
        };
        Ok(values
            .into_iter()
            .map(|v| v.mul_add(slope, intercept))
            .collect())
    }
}

fn floats(obj: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<Vec<f64>, VolumeLoaderError> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_multi_float64().ok())
        .ok_or(VolumeLoaderError::MissingTag(name))
}

fn float(obj: &InMemDicomObject, tag: Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}

fn int<T: TryFrom<i64>>(obj: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<T, VolumeLoaderError> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_int::<i64>().ok())
        .and_then(|v| T::try_from(v).ok())
        .ok_or(VolumeLoaderError::MissingTag(name))
}

/// First entry of a possibly multi-valued attribute such as WindowCenter.
fn leading_value(obj: &InMemDicomObject, tag: Tag) -> Option<f64> {
    first_value(&obj.element(tag).ok()?.to_str().ok()?)
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Assembles a volume from already decoded slice records.
    ///
    /// # Errors
    ///
    /// Returns error if `records` is empty, the slices disagree on their
    /// size, a slice cannot be decoded or the resulting geometry is invalid.
    pub fn load_from_slice_records(
        mut records: Vec<SliceRecord>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let start = Instant::now();
        let first = records.first().ok_or(VolumeLoaderError::NoValidImages)?;
        let (rows, columns) = (first.rows, first.columns);
        if rows == 0
            || columns == 0
            || records.iter().any(|r| r.rows != rows || r.columns != columns)
        {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }

        Self::sort_records(&mut records, sort_by);

        let first = &records[0];
        let positions: Vec<[f64; 3]> = records.iter().map(|r| r.image_position_patient).collect();
        let spacing = inter_slice_spacing(&positions, first.slice_thickness);
        if (spacing - first.slice_thickness).abs() > 1e-3 {
            debug!(
                spacing,
                thickness = first.slice_thickness,
                "inter-slice spacing differs from slice thickness"
            );
        }

        if first.window_width.is_none() || first.window_center.is_none() {
            warn!("window attributes missing, using defaults");
        }
        let window = WindowLevel::from_tags(first.window_width, first.window_center);

        let slices = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                record.decode().map_err(|source| VolumeLoaderError::SliceLoad {
                    index,
                    source: Box::new(source),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let depth = slices.len();
        let data = Array3::from_shape_vec((depth, rows, columns), slices.concat())
            .map_err(|_| VolumeLoaderError::InconsistentDimensions)?;

        let metadata = DicomSeriesMetadata {
            image_orientation_patient: first.image_orientation_patient,
            image_position_patient: first.image_position_patient,
            descriptor: VolumeDescriptor {
                width: columns,
                height: rows,
                depth,
                pixel_spacing: first.pixel_spacing,
                slice_thickness: first.slice_thickness,
                inter_slice_spacing: spacing,
                rescale_slope: first.rescale_slope,
                rescale_intercept: first.rescale_intercept,
                window,
            },
        };
        metadata.validate()?;
        let volume = Volume::new(data, metadata)?;

        info!(
            width = columns,
            height = rows,
            depth,
            spacing,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "assembled volume"
        );
        Ok(volume)
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error on the first object missing a required attribute, or
    /// if the assembled series is invalid.
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let records = dicom_objects
            .iter()
            .enumerate()
            .map(|(index, obj)| {
                SliceRecord::from_dicom_object(obj).map_err(|source| VolumeLoaderError::SliceLoad {
                    index,
                    source: Box::new(source),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::load_from_slice_records(records, sort_by)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let records = paths
            .iter()
            .enumerate()
            .map(|(index, path)| Self::read_record(path.as_ref(), index))
            .collect::<Result<Vec<_>, _>>()?;

        Self::load_from_slice_records(records, sort_by)
    }

    /// Load a volume from file paths, reading every file on the blocking
    /// pool concurrently. The first failing file aborts the whole load.
    pub async fn load_from_file_paths_async(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        let tasks = paths.iter().enumerate().map(|(index, path)| {
            let path = path.as_ref().to_path_buf();
            async move {
                tokio::task::spawn_blocking(move || Self::read_record(&path, index))
                    .await
                    .map_err(|e| VolumeLoaderError::Join(e.to_string()))?
            }
        });
        let records = try_join_all(tasks).await?;

        Self::load_from_slice_records(records, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths = Self::dicom_paths(path)?;
        Self::load_from_file_paths(&paths, sort_by)
    }

    /// The `.dcm` files directly inside `path`.
    pub fn dicom_paths(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        Ok(paths)
    }

    fn read_record(path: &Path, index: usize) -> Result<SliceRecord, VolumeLoaderError> {
        let wrap = |source: VolumeLoaderError| VolumeLoaderError::SliceLoad {
            index,
            source: Box::new(source),
        };
        let obj = open_file(path).map_err(|e| wrap(e.into()))?;
        SliceRecord::from_dicom_object(&obj).map_err(wrap)
    }

    fn sort_records(records: &mut [SliceRecord], sort_by: SortBy) {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let normal = records[0].normal();
                records.sort_by(|a, b| {
                    let da = Vector3::from(a.image_position_patient).dot(&normal);
                    let db = Vector3::from(b.image_position_patient).dot(&normal);
                    da.total_cmp(&db)
                });
            }
            SortBy::InstanceNumber => records.sort_by_key(|r| r.instance_number),
            SortBy::None => {}
        }
    }
}
