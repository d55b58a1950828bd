//! # DICOM-MPR library
//!
//! This crate turns a series of DICOM slices into a volume and shows it as
//! three linked multi-planar reconstruction (MPR) views:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! The series is assembled once into an immutable [`Volume`] together with
//! its voxel to patient transform. Each view samples the volume along a
//! [`ReformatPlane`] that can be scrolled, rotated into an oblique
//! orientation and thickened into a maximum intensity projection slab.
//!
//! A [`CrossLine`] overlay draws a crosshair in every view. Dragging its
//! centre, one of its lines, its rotation zone or a slab handle moves,
//! rotates or thickens the planes of the other two views; [`MprSession`]
//! wires the two together.
//!
//! Rendering goes through the [`RenderBackend`] trait. The bundled
//! [`SoftwareRenderer`] reslices on the CPU using rayon, GPU backends can
//! upload [`render::PlaneUniforms`] instead.
//!
//! DICOM files are assumed to have the following attributes:
//!   - A single stack of parallel slices
//!   - No multiframe (always the first frame is used)
//!   - 8 or 16 bit native little endian pixel data
//!
//! # Examples
//!
//! ## Rendering the three views of a directory
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use dicom_mpr::{
//! #     CrosshairStyle, Interpolation, MprSession, Orientation, SoftwareRenderer, SortBy,
//! #     VolumeLoader, render::Viewport,
//! # };
//! let volume = VolumeLoader::load_from_directory("dicom", SortBy::ImagePositionPatient)
//!     .expect("should have loaded files from directory");
//! let volume = Arc::new(volume);
//! let session = MprSession::new(
//!     volume.clone(),
//!     [Viewport::new(512, 512); 3],
//!     CrosshairStyle::default(),
//! );
//! let mut renderer = SoftwareRenderer::new(volume, Interpolation::Trilinear);
//! session.render_frame(&mut renderer);
//! renderer
//!     .composite(Orientation::Coronal)
//!     .expect("should have rendered the coronal view")
//!     .save("coronal.png")
//!     .expect("should have written the image");
//! ```

pub mod crosshair;
pub mod enums;
mod interpolator;
pub mod metadata;
pub mod plane;
pub mod render;
pub mod session;
pub mod slice_info;
pub mod transform;
pub mod viewer;
pub mod volume;
pub mod volume_loader;

pub use crosshair::{CrossLine, CrosshairChange, CrosshairStyle, Cursor, DragMode};
pub use enums::{Axis, Interpolation, Orientation, SortBy};
pub use plane::ReformatPlane;
pub use render::{RenderBackend, SoftwareRenderer};
pub use session::MprSession;
pub use viewer::MprViewer;
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
