//! The three reformat planes of a loaded volume and their navigation.

use std::sync::Arc;

use nalgebra::{Point3, Vector2};
use tracing::{debug, info};

use crate::enums::{Axis, Orientation};
use crate::metadata::WindowLevel;
use crate::plane::ReformatPlane;
use crate::render::{
    ReformatPlaneMaterialParams, RenderBackend, ViewCamera, Viewport, VolumeRenderParams,
};
use crate::slice_info::SliceInfo;
use crate::volume::Volume;

/// State of one view: its plane, sampling geometry and screen mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub plane: ReformatPlane,
    pub slice_info: SliceInfo,
    /// 1-based running slice position used by relative scrolling. Starts at
    /// `(count + 1) / 2`, the index of the centre plane, rather than
    /// `count / 2`, which would sit half a slice below it.
    pub current_count: f64,
    /// `current_count` when the current drag began.
    pub drag_start_count: f64,
    /// MIP samples along the normal, `0` for a plain slice.
    pub sample_count: u32,
    pub viewport: Viewport,
    pub camera: Option<ViewCamera>,
}

impl ViewState {
    /// On-screen size of the plane, zero until the view has a viewport.
    pub fn plane_pixel_size(&self) -> Vector2<f64> {
        self.camera.map_or_else(Vector2::zeros, |c| {
            c.plane_pixel_size(self.plane.width, self.plane.height, self.viewport)
        })
    }

    pub fn mm_per_pixel(&self) -> f64 {
        self.camera.map_or(0.0, |c| c.mm_per_pixel(self.viewport))
    }

    fn set_slab_thickness(&mut self, thickness: f64) {
        let interval = self.slice_info.sampling_interval;
        self.sample_count = if interval > 0.0 && interval.is_finite() {
            (thickness / interval).round().max(0.0) as u32
        } else {
            0
        };
    }
}

/// Multi-planar reconstruction of one volume: an axial, a coronal and a
/// sagittal plane through the volume centre that can be scrolled, rotated
/// and thickened into MIP slabs.
#[derive(Clone, Debug)]
pub struct MprViewer {
    volume: Arc<Volume>,
    center: Point3<f64>,
    window: WindowLevel,
    shared: VolumeRenderParams,
    views: [ViewState; 3],
}

impl MprViewer {
    pub fn new(volume: Arc<Volume>) -> Self {
        let center = volume.center();
        let descriptor = volume.descriptor();
        let physical_size = descriptor.physical_size();

        let views = Orientation::ALL.map(|orientation| {
            let plane = ReformatPlane::canonical(orientation, center, physical_size);
            let slice_info = SliceInfo::calculate(
                &plane.x_axis,
                &plane.y_axis,
                Some(&plane.normal),
                descriptor,
                volume.transform(),
            );
            let current_count = (slice_info.count as f64 + 1.0) / 2.0;
            ViewState {
                current_count,
                drag_start_count: current_count,
                plane,
                slice_info,
                sample_count: 0,
                viewport: Viewport::default(),
                camera: None,
            }
        });

        let window = descriptor.window;
        let shared = VolumeRenderParams::from_volume(&volume);
        info!(
            dim = ?volume.dim(),
            ?physical_size,
            axial = views[0].slice_info.count,
            coronal = views[1].slice_info.count,
            sagittal = views[2].slice_info.count,
            "MPR viewer initialised"
        );

        Self {
            window,
            shared,
            volume,
            center,
            views,
        }
    }

    pub fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    /// Patient position of the volume centre every plane is offset from.
    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    pub fn window(&self) -> WindowLevel {
        self.window
    }

    pub fn view(&self, view: Orientation) -> &ViewState {
        &self.views[view.index()]
    }

    pub fn plane(&self, view: Orientation) -> &ReformatPlane {
        &self.view(view).plane
    }

    pub fn slice_info(&self, view: Orientation) -> &SliceInfo {
        &self.view(view).slice_info
    }

    /// Sets the display window of all three views.
    pub fn set_wwwc(&mut self, width: f64, center: f64) {
        self.window = WindowLevel::new(width, center);
        debug!(width, center, "window changed");
    }

    /// Moves a plane to the 1-based slice `index`. Callers clamp the index;
    /// values outside `[1, count]` place the plane outside the volume.
    pub fn change_slice(&mut self, view: Orientation, index: f64) {
        let center = self.center;
        let v = &mut self.views[view.index()];
        v.current_count = index;
        let offset = v.slice_info.offset_of(index);
        v.plane.place_at_offset(&center, offset);
    }

    /// Scrolls a plane by `delta` slices, staying within the volume.
    pub fn change_slice_delta(&mut self, view: Orientation, delta: i64) {
        let v = &self.views[view.index()];
        let count = v.slice_info.count;
        if count == 0 {
            return;
        }
        let index = (v.current_count + delta as f64).clamp(1.0, count as f64);
        self.change_slice(view, index);
        debug!(%view, delta, index, "slice changed");
    }

    /// Records every view's slice position as the start of a drag.
    pub fn begin_drag(&mut self) {
        for v in &mut self.views {
            v.drag_start_count = v.current_count;
        }
    }

    /// Places a plane `steps` slices away from where it was when the drag
    /// began, staying within the volume.
    pub fn change_slice_from_drag_start(&mut self, view: Orientation, steps: i64) {
        let v = &self.views[view.index()];
        let count = v.slice_info.count;
        if count == 0 {
            return;
        }
        let index = (v.drag_start_count + steps as f64).clamp(1.0, count as f64);
        self.change_slice(view, index);
        debug!(%view, steps, index, "slice changed from drag start");
    }

    /// Rotates `view`'s plane by `radian` around its `axis` tilted by `tilt`
    /// around the plane normal, keeping the plane's distance from the centre.
    pub fn rotate_view(&mut self, view: Orientation, axis: Axis, tilt: f64, radian: f64) {
        let center = self.center;
        let volume = &self.volume;
        let v = &mut self.views[view.index()];

        let rotation_axis = v.plane.tilted_axis(axis, tilt);
        v.plane.rotate(&rotation_axis, radian);

        let distance = v.plane.offset_from(&center);
        v.slice_info = SliceInfo::calculate(
            &v.plane.x_axis,
            &v.plane.y_axis,
            Some(&v.plane.normal),
            volume.descriptor(),
            volume.transform(),
        );
        v.current_count = v.slice_info.index_of(distance);
        v.plane.place_at_offset(&center, distance);

        debug!(
            %view,
            ?axis,
            tilt,
            radian,
            count = v.slice_info.count,
            current = v.current_count,
            "plane rotated"
        );
    }

    /// Applies one MIP slab thickness, in millimetres, to every view.
    pub fn set_mip_thickness(&mut self, thickness: f64) {
        for v in &mut self.views {
            v.set_slab_thickness(thickness);
        }
    }

    /// Applies a slab of `range` screen pixels of `source` to `target`.
    pub fn change_range(&mut self, target: Orientation, range: f64, source: Orientation) {
        let thickness = range * self.view(source).mm_per_pixel();
        let v = &mut self.views[target.index()];
        v.set_slab_thickness(thickness);
        debug!(%source, %target, thickness, samples = v.sample_count, "slab changed");
    }

    /// Refits the camera of a view to a new drawing surface.
    pub fn resize(&mut self, view: Orientation, viewport: Viewport) {
        let v = &mut self.views[view.index()];
        v.viewport = viewport;
        v.camera = ViewCamera::fit(v.plane.width, v.plane.height, viewport);
    }

    pub fn material_params(&self, view: Orientation) -> ReformatPlaneMaterialParams {
        let v = self.view(view);
        ReformatPlaneMaterialParams {
            plane: v.plane.clone(),
            window: self.window,
            sample_count: v.sample_count,
            sampling_interval: v.slice_info.sampling_interval,
        }
    }

    /// Draws every view that has a drawing surface.
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        for view in Orientation::ALL {
            let v = self.view(view);
            if let Some(camera) = &v.camera {
                backend.draw_plane(view, &self.shared, &self.material_params(view), camera, v.viewport);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DicomSeriesMetadata, PixelSpacing, VolumeDescriptor};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use ndarray::Array3;
    use std::f64::consts::FRAC_PI_2;

    fn viewer(width: usize, height: usize, depth: usize) -> MprViewer {
        let data = Array3::from_shape_fn((depth, height, width), |(z, y, x)| (x + y + z) as f32);
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
                window: WindowLevel::new(100.0, 20.0),
            },
        };
        MprViewer::new(Arc::new(Volume::new(data, metadata).unwrap()))
    }

    #[test]
    fn canonical_planes_start_at_the_centre_slice() {
        let viewer = viewer(10, 8, 5);
        let axial = viewer.view(Orientation::Axial);
        assert_eq!(axial.slice_info.count, 5);
        assert_relative_eq!(axial.current_count, 3.0);
        assert_relative_eq!(axial.plane.origin, viewer.center());
        assert_eq!((axial.plane.width, axial.plane.height), (10.0, 8.0));
        let coronal = viewer.plane(Orientation::Coronal);
        assert_eq!((coronal.width, coronal.height), (10.0, 10.0));
        assert_eq!(viewer.window(), WindowLevel::new(100.0, 20.0));
    }

    #[test]
    fn slice_delta_is_clamped_to_the_volume() {
        let mut viewer = viewer(10, 8, 5);
        let center = viewer.center();
        viewer.change_slice_delta(Orientation::Axial, 1);
        assert_relative_eq!(viewer.plane(Orientation::Axial).offset_from(&center), 2.0);
        viewer.change_slice_delta(Orientation::Axial, 10);
        assert_relative_eq!(viewer.view(Orientation::Axial).current_count, 5.0);
        assert_relative_eq!(viewer.plane(Orientation::Axial).offset_from(&center), 4.0);
        viewer.change_slice_delta(Orientation::Axial, -10);
        assert_relative_eq!(viewer.plane(Orientation::Axial).offset_from(&center), -4.0);
    }

    #[test]
    fn drag_steps_count_from_the_drag_start_position() {
        let mut viewer = viewer(10, 8, 5);
        let center = viewer.center();
        viewer.begin_drag();
        viewer.change_slice_from_drag_start(Orientation::Axial, 10);
        assert_relative_eq!(viewer.plane(Orientation::Axial).offset_from(&center), 4.0);
        viewer.change_slice_from_drag_start(Orientation::Axial, 0);
        assert_relative_eq!(viewer.view(Orientation::Axial).current_count, 3.0);
        assert_relative_eq!(viewer.plane(Orientation::Axial).offset_from(&center), 0.0);

        viewer.change_slice_from_drag_start(Orientation::Axial, 2);
        viewer.begin_drag();
        viewer.change_slice_from_drag_start(Orientation::Axial, -1);
        assert_relative_eq!(viewer.plane(Orientation::Axial).offset_from(&center), 2.0);
    }

    #[test]
    fn quarter_turn_recounts_along_the_new_normal() {
        let mut viewer = viewer(10, 8, 5);
        let center = viewer.center();
        viewer.rotate_view(Orientation::Coronal, Axis::Y, 0.0, FRAC_PI_2);
        let coronal = viewer.view(Orientation::Coronal);
        assert_relative_eq!(coronal.plane.normal.dot(&Vector3::x()).abs(), 1.0, epsilon = 1e-9);
        // now stepping through the 10 columns
        assert_eq!(coronal.slice_info.count, 10);
        assert_relative_eq!(
            coronal.plane.offset_from(&center),
            coronal.slice_info.offset_of(coronal.current_count),
            epsilon = 1e-9
        );
        assert_eq!((coronal.plane.width, coronal.plane.height), (10.0, 10.0));

        viewer.rotate_view(Orientation::Coronal, Axis::Y, 0.0, -FRAC_PI_2);
        assert_relative_eq!(viewer.plane(Orientation::Coronal).normal, Vector3::y(), epsilon = 1e-9);
    }

    #[test]
    fn rotation_keeps_the_offset_projected_on_the_new_normal() {
        let mut viewer = viewer(10, 8, 5);
        let center = viewer.center();
        viewer.change_slice_delta(Orientation::Coronal, 2);
        let before = viewer.plane(Orientation::Coronal).offset_from(&center);
        assert_relative_eq!(before, 2.0);

        viewer.rotate_view(Orientation::Coronal, Axis::Y, 0.0, 0.3);
        let coronal = viewer.view(Orientation::Coronal);
        let after = coronal.plane.offset_from(&center);
        assert_relative_eq!(after, before * 0.3f64.cos(), epsilon = 1e-9);
        assert_relative_eq!(coronal.slice_info.offset_of(coronal.current_count), after, epsilon = 1e-9);
    }

    #[test]
    fn slab_range_converts_pixels_to_samples() {
        let mut viewer = viewer(10, 8, 5);
        viewer.resize(Orientation::Coronal, Viewport::new(100, 100));
        // coronal shows 10 mm over 100 px
        viewer.change_range(Orientation::Axial, 40.0, Orientation::Coronal);
        assert_eq!(viewer.view(Orientation::Axial).sample_count, 2);
        assert_relative_eq!(viewer.material_params(Orientation::Axial).slab_thickness(), 4.0);
        // no viewport yet, no thickness
        viewer.change_range(Orientation::Coronal, 40.0, Orientation::Sagittal);
        assert_eq!(viewer.view(Orientation::Coronal).sample_count, 0);

        viewer.set_mip_thickness(3.0);
        assert_eq!(viewer.view(Orientation::Sagittal).sample_count, 3);
    }

    #[test]
    fn window_applies_to_every_view() {
        let mut viewer = viewer(4, 4, 4);
        viewer.set_wwwc(1500.0, -600.0);
        for view in Orientation::ALL {
            assert_eq!(viewer.material_params(view).window, WindowLevel::new(1500.0, -600.0));
        }
    }

    #[test]
    fn resize_letterboxes_and_reports_plane_pixels() {
        let mut viewer = viewer(10, 8, 5);
        assert_eq!(viewer.view(Orientation::Axial).plane_pixel_size(), Vector2::zeros());
        viewer.resize(Orientation::Axial, Viewport::new(200, 80));
        let axial = viewer.view(Orientation::Axial);
        assert_relative_eq!(axial.plane_pixel_size(), Vector2::new(100.0, 80.0));
        assert_relative_eq!(axial.mm_per_pixel(), 0.1);
        viewer.resize(Orientation::Axial, Viewport::new(0, 80));
        assert_eq!(viewer.view(Orientation::Axial).camera, None);
    }

    #[derive(Default)]
    struct Recorder(Vec<(Orientation, u32)>);

    impl RenderBackend for Recorder {
        fn draw_plane(
            &mut self,
            view: Orientation,
            _shared: &VolumeRenderParams,
            params: &ReformatPlaneMaterialParams,
            _camera: &ViewCamera,
            _viewport: Viewport,
        ) {
            self.0.push((view, params.sample_count));
        }

        fn draw_crosshair(
            &mut self,
            _view: Orientation,
            _geometry: &crate::crosshair::CrosshairGeometry,
            _viewport: Viewport,
        ) {
        }
    }

    #[test]
    fn only_sized_views_are_drawn() {
        let mut viewer = viewer(4, 4, 4);
        viewer.resize(Orientation::Sagittal, Viewport::new(32, 32));
        let mut recorder = Recorder::default();
        viewer.render(&mut recorder);
        assert_eq!(recorder.0, vec![(Orientation::Sagittal, 0)]);
    }
}
