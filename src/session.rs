//! Glue between the crosshair overlay and the reformat planes.

use std::sync::Arc;

use nalgebra::{Point2, Vector2};
use tracing::debug;

use crate::crosshair::{CrossLine, CrosshairChange, CrosshairStyle, Cursor, DragMode};
use crate::enums::{Axis, Orientation};
use crate::render::{RenderBackend, Viewport};
use crate::viewer::MprViewer;
use crate::volume::Volume;

fn element_size(viewport: Viewport) -> Vector2<f64> {
    Vector2::new(viewport.width as f64, viewport.height as f64)
}

/// An [`MprViewer`] driven by a [`CrossLine`].
///
/// Pointer events go to the crosshairs; the changes they report are applied
/// to the planes, and the crosshairs are told about the new plane geometry.
#[derive(Clone, Debug)]
pub struct MprSession {
    viewer: MprViewer,
    crossline: CrossLine,
}

impl MprSession {
    /// `viewports` is indexed by [`Orientation::index`].
    pub fn new(volume: Arc<Volume>, viewports: [Viewport; 3], style: CrosshairStyle) -> Self {
        let mut viewer = MprViewer::new(volume);
        for view in Orientation::ALL {
            viewer.resize(view, viewports[view.index()]);
        }
        let crossline = CrossLine::new(viewports.map(element_size), style);
        let mut session = Self { viewer, crossline };
        session.sync_plane_metrics();
        session
    }

    pub fn viewer(&self) -> &MprViewer {
        &self.viewer
    }

    pub fn crossline(&self) -> &CrossLine {
        &self.crossline
    }

    pub fn set_wwwc(&mut self, width: f64, center: f64) {
        self.viewer.set_wwwc(width, center);
    }

    pub fn set_mip_thickness(&mut self, thickness: f64) {
        self.viewer.set_mip_thickness(thickness);
    }

    pub fn resize(&mut self, view: Orientation, viewport: Viewport) {
        self.viewer.resize(view, viewport);
        self.crossline.resize(view, element_size(viewport));
        self.sync_plane_metrics();
    }

    pub fn pointer_down(&mut self, view: Orientation, pointer: Point2<f64>) -> DragMode {
        let mode = self.crossline.pointer_down(view, pointer);
        if mode != DragMode::None {
            self.viewer.begin_drag();
        }
        mode
    }

    /// Drags when a gesture is active, hovers otherwise.
    pub fn pointer_move(&mut self, view: Orientation, pointer: Point2<f64>) -> Cursor {
        if !self.crossline.is_dragging() {
            return self.crossline.hover(view, &pointer);
        }
        for change in self.crossline.pointer_move(view, pointer) {
            self.apply(change);
        }
        self.sync_plane_metrics();
        self.crossline.drag_mode().into()
    }

    pub fn pointer_up(&mut self) {
        self.crossline.pointer_up();
    }

    pub fn pointer_leave(&mut self, view: Orientation) {
        self.crossline.pointer_leave(view);
    }

    fn apply(&mut self, change: CrosshairChange) {
        debug!(?change, "applying crosshair change");
        match change {
            CrosshairChange::Slice { target, steps } => {
                self.viewer.change_slice_from_drag_start(target, steps)
            }
            CrosshairChange::Range {
                source,
                target,
                range,
            } => self.viewer.change_range(target, range, source),
            CrosshairChange::Rotate { view, delta } => self.rotate_linked(view, delta),
        }
    }

    /// Turning the crosshair of `view` turns the two planes its lines show.
    fn rotate_linked(&mut self, view: Orientation, delta: f64) {
        use Orientation::{Axial, Coronal, Sagittal};

        let tilt = |o: Orientation| self.crossline.tilt(o);
        let rotations = match view {
            Axial => [
                (Coronal, Axis::Y, tilt(Coronal), -delta),
                (Sagittal, Axis::Y, -tilt(Sagittal), -delta),
            ],
            Coronal => [
                (Axial, Axis::Y, -tilt(Axial), delta),
                (Sagittal, Axis::X, tilt(Sagittal), -delta),
            ],
            Sagittal => [
                (Axial, Axis::X, -tilt(Axial), delta),
                (Coronal, Axis::X, tilt(Coronal), delta),
            ],
        };
        for (target, axis, tilt, radian) in rotations {
            self.viewer.rotate_view(target, axis, tilt, radian);
        }
    }

    fn sync_plane_metrics(&mut self) {
        for view in Orientation::ALL {
            let v = self.viewer.view(view);
            self.crossline
                .set_plane_metrics(view, v.plane_pixel_size(), v.slice_info.count);
        }
    }

    /// Draws all three planes and their crosshairs. Every call redraws
    /// everything.
    pub fn render_frame<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        self.viewer.render(backend);
        for view in Orientation::ALL {
            let viewport = self.viewer.view(view).viewport;
            if !viewport.is_empty() {
                backend.draw_crosshair(view, &self.crossline.geometry(view), viewport);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DicomSeriesMetadata, PixelSpacing, VolumeDescriptor, WindowLevel};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use ndarray::Array3;

    fn session() -> MprSession {
        let (width, height, depth) = (10, 8, 5);
        let data = Array3::from_shape_fn((depth, height, width), |(z, y, x)| (x * y + z) as f32);
        let metadata = DicomSeriesMetadata {
            image_orientation_patient: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            image_position_patient: [0.0; 3],
            descriptor: VolumeDescriptor {
                width,
                height,
                depth,
                pixel_spacing: PixelSpacing::new(1.0, 1.0),
                slice_thickness: 2.0,
                inter_slice_spacing: 2.0,
                rescale_slope: 1.0,
                rescale_intercept: 0.0,
                window: WindowLevel::default(),
            },
        };
        let volume = Arc::new(Volume::new(data, metadata).unwrap());
        MprSession::new(volume, [Viewport::new(100, 100); 3], CrosshairStyle::default())
    }

    fn center_pointer(session: &MprSession, view: Orientation) -> Point2<f64> {
        let v = session.crossline().view(view);
        Point2::new(v.transform.translation.x, v.size.y - v.transform.translation.y)
    }

    #[test]
    fn crosshairs_learn_the_plane_geometry() {
        let s = session();
        let axial = s.crossline().view(Orientation::Axial);
        assert_relative_eq!(axial.plane_pixel_size, Vector2::new(100.0, 80.0));
        assert_eq!(axial.total_count, 5);
        assert_eq!(s.crossline().view(Orientation::Sagittal).total_count, 10);
    }

    #[test]
    fn center_drag_scrolls_the_linked_planes() {
        let mut s = session();
        let center = s.viewer().center();
        let start = center_pointer(&s, Orientation::Axial);
        assert_eq!(s.pointer_down(Orientation::Axial, start), DragMode::Center);
        let cursor = s.pointer_move(Orientation::Axial, start + Vector2::new(30.0, 0.0));
        assert_eq!(cursor, Cursor::Move);
        s.pointer_up();

        // 30 px at 0.1 mm per px
        let sagittal = s.viewer().plane(Orientation::Sagittal);
        assert_relative_eq!(sagittal.offset_from(&center), 3.0, epsilon = 1e-9);
        assert_relative_eq!(s.viewer().plane(Orientation::Coronal).offset_from(&center), 0.0);
        assert!(!s.crossline().is_dragging());
    }

    #[test]
    fn dragging_past_the_edge_and_back_restores_the_plane() {
        let mut s = session();
        s.resize(Orientation::Axial, Viewport::new(400, 100));
        let center = s.viewer().center();
        let start = center_pointer(&s, Orientation::Axial);
        assert_eq!(start, Point2::new(200.0, 50.0));
        assert_eq!(s.pointer_down(Orientation::Axial, start), DragMode::Center);

        // 190 px over a 125 px wide plane runs past the last sagittal slice
        s.pointer_move(Orientation::Axial, Point2::new(390.0, 50.0));
        let far = s.viewer().plane(Orientation::Sagittal).offset_from(&center);
        assert_relative_eq!(far, 4.5, epsilon = 1e-9);

        s.pointer_move(Orientation::Axial, start);
        s.pointer_up();
        let sagittal = s.viewer().view(Orientation::Sagittal);
        assert_relative_eq!(sagittal.plane.offset_from(&center), 0.0, epsilon = 1e-9);
        assert_relative_eq!(sagittal.current_count, 5.5);
        assert_eq!(center_pointer(&s, Orientation::Axial), start);
    }

    #[test]
    fn rotating_the_axial_crosshair_keeps_the_planes_orthogonal() {
        let mut s = session();
        s.resize(Orientation::Axial, Viewport::new(400, 400));
        let c = center_pointer(&s, Orientation::Axial);
        let start = c + Vector2::new(200.0, 0.0);
        assert_eq!(s.pointer_down(Orientation::Axial, start), DragMode::Rotate);
        assert_eq!(s.pointer_move(Orientation::Axial, c + Vector2::new(0.0, 200.0)), Cursor::Grab);
        s.pointer_up();

        let axial = s.viewer().plane(Orientation::Axial).normal;
        let coronal = s.viewer().plane(Orientation::Coronal).normal;
        let sagittal = s.viewer().plane(Orientation::Sagittal).normal;
        assert_relative_eq!(axial, Vector3::z(), epsilon = 1e-9);
        assert_relative_eq!(coronal.dot(&Vector3::x()).abs(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(coronal.dot(&sagittal), 0.0, epsilon = 1e-9);
        assert_relative_eq!(coronal.dot(&axial), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn handle_drag_thickens_the_target_slab() {
        let mut s = session();
        s.resize(Orientation::Coronal, Viewport::new(400, 400));
        let handle = center_pointer(&s, Orientation::Coronal) + Vector2::new(143.0, 0.0);
        assert_eq!(s.pointer_down(Orientation::Coronal, handle), DragMode::HorizontalHandle);
        s.pointer_move(Orientation::Coronal, handle + Vector2::new(0.0, -80.0));
        // 160 px at 0.025 mm per px over a 2 mm axial interval
        assert_eq!(s.viewer().view(Orientation::Axial).sample_count, 2);
        assert_relative_eq!(s.crossline().view(Orientation::Coronal).horizontal_range, 160.0);
    }

    #[test]
    fn hover_does_not_start_a_drag() {
        let mut s = session();
        let c = center_pointer(&s, Orientation::Sagittal);
        assert_eq!(s.pointer_move(Orientation::Sagittal, c), Cursor::Move);
        assert!(!s.crossline().is_dragging());
    }
}
