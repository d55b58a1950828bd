//! The boundary to the rendering backend.
//!
//! Every frame each view hands its [`ReformatPlaneMaterialParams`] and
//! camera to a [`RenderBackend`]. GPU backends upload [`PlaneUniforms`];
//! [`SoftwareRenderer`] evaluates the same sampling program on the CPU.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use nalgebra::{Matrix4, Point2, Vector2};

use crate::crosshair::{CrosshairGeometry, LineSegment};
use crate::enums::{Interpolation, Orientation};
use crate::metadata::WindowLevel;
use crate::plane::ReformatPlane;
use crate::volume::Volume;

/// Size of a view's drawing surface in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Orthographic frustum of a view, in millimetres around the plane origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewCamera {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl ViewCamera {
    /// Frustum showing the whole plane at its physical aspect ratio,
    /// letterboxed inside the viewport.
    pub fn fit(plane_width: f64, plane_height: f64, viewport: Viewport) -> Option<Self> {
        if viewport.is_empty() || plane_width <= 0.0 || plane_height <= 0.0 {
            return None;
        }
        let plane_aspect = plane_width / plane_height;
        let element_aspect = viewport.aspect();
        let (view_width, view_height) = if element_aspect > plane_aspect {
            (plane_height * element_aspect, plane_height)
        } else {
            (plane_width, plane_width / element_aspect)
        };
        Some(Self {
            left: -view_width / 2.0,
            right: view_width / 2.0,
            top: view_height / 2.0,
            bottom: -view_height / 2.0,
        })
    }

    pub fn view_width(&self) -> f64 {
        self.right - self.left
    }

    pub fn view_height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Millimetres covered by one screen pixel.
    pub fn mm_per_pixel(&self, viewport: Viewport) -> f64 {
        self.view_width() / viewport.width as f64
    }

    /// On-screen size of a `plane_width` x `plane_height` rectangle.
    pub fn plane_pixel_size(&self, plane_width: f64, plane_height: f64, viewport: Viewport) -> Vector2<f64> {
        Vector2::new(
            plane_width / self.view_width() * viewport.width as f64,
            plane_height / self.view_height() * viewport.height as f64,
        )
    }

    /// Camera-space millimetres at the centre of screen pixel `(x, y)`.
    pub fn unproject(&self, x: u32, y: u32, viewport: Viewport) -> Point2<f64> {
        let fx = (x as f64 + 0.5) / viewport.width as f64;
        let fy = (y as f64 + 0.5) / viewport.height as f64;
        Point2::new(
            self.left + fx * self.view_width(),
            self.top - fy * self.view_height(),
        )
    }
}

/// Parameters shared by all three views of one volume.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeRenderParams {
    pub texture_size: [u32; 3],
    pub patient_to_voxel: Matrix4<f64>,
}

impl VolumeRenderParams {
    pub fn from_volume(volume: &Volume) -> Self {
        let (depth, height, width) = volume.dim();
        Self {
            texture_size: [width as u32, height as u32, depth as u32],
            patient_to_voxel: *volume.transform().patient_to_voxel(),
        }
    }
}

/// Per-view overrides on top of [`VolumeRenderParams`].
#[derive(Clone, Debug, PartialEq)]
pub struct ReformatPlaneMaterialParams {
    pub plane: ReformatPlane,
    pub window: WindowLevel,
    /// Samples along the normal for MIP; `0` draws a single-sample slice.
    pub sample_count: u32,
    pub sampling_interval: f64,
}

impl ReformatPlaneMaterialParams {
    pub fn slab_thickness(&self) -> f64 {
        self.sampling_interval * self.sample_count as f64
    }

    pub fn to_uniforms(&self, shared: &VolumeRenderParams) -> PlaneUniforms {
        let vec4 = |v: [f64; 3]| [v[0] as f32, v[1] as f32, v[2] as f32, 0.0];
        let [w, h, d] = shared.texture_size;
        PlaneUniforms {
            patient_to_voxel: shared.patient_to_voxel.cast::<f32>().into(),
            origin: vec4(self.plane.origin.coords.into()),
            x_axis: vec4(self.plane.x_axis.into()),
            y_axis: vec4(self.plane.y_axis.into()),
            texture_size: [w, h, d, 0],
            window_width: self.window.width as f32,
            window_center: self.window.center as f32,
            plane_width: self.plane.width as f32,
            plane_height: self.plane.height as f32,
            sampling_interval: self.sampling_interval as f32,
            sample_count: self.sample_count,
            _padding: [0; 2],
        }
    }
}

/// Uniform block of the reslicing shader, laid out with vec4 alignment.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PlaneUniforms {
    /// Column-major.
    pub patient_to_voxel: [[f32; 4]; 4],
    pub origin: [f32; 4],
    pub x_axis: [f32; 4],
    pub y_axis: [f32; 4],
    pub texture_size: [u32; 4],
    pub window_width: f32,
    pub window_center: f32,
    pub plane_width: f32,
    pub plane_height: f32,
    pub sampling_interval: f32,
    pub sample_count: u32,
    pub _padding: [u32; 2],
}

pub trait RenderBackend {
    fn draw_plane(
        &mut self,
        view: Orientation,
        shared: &VolumeRenderParams,
        params: &ReformatPlaneMaterialParams,
        camera: &ViewCamera,
        viewport: Viewport,
    );

    fn draw_crosshair(&mut self, view: Orientation, geometry: &CrosshairGeometry, viewport: Viewport);
}

/// CPU backend producing one grayscale image per view plus the crosshair
/// overlay composited on request.
pub struct SoftwareRenderer {
    volume: Arc<Volume>,
    interpolation: Interpolation,
    images: [Option<ImageBuffer<Luma<u8>, Vec<u8>>>; 3],
    overlays: [Vec<LineSegment>; 3],
}

impl SoftwareRenderer {
    pub fn new(volume: Arc<Volume>, interpolation: Interpolation) -> Self {
        Self {
            volume,
            interpolation,
            images: [None, None, None],
            overlays: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    pub fn image(&self, view: Orientation) -> Option<&ImageBuffer<Luma<u8>, Vec<u8>>> {
        self.images[view.index()].as_ref()
    }

    pub fn overlay(&self, view: Orientation) -> &[LineSegment] {
        &self.overlays[view.index()]
    }

    /// The view image with its crosshair lines drawn on top.
    pub fn composite(&self, view: Orientation) -> Option<RgbImage> {
        let gray = self.image(view)?;
        let mut out = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
            let v = gray.get_pixel(x, y).0[0];
            Rgb([v, v, v])
        });
        for segment in self.overlay(view).iter().filter(|s| s.visible) {
            rasterize(&mut out, segment);
        }
        Some(out)
    }
}

impl RenderBackend for SoftwareRenderer {
    fn draw_plane(
        &mut self,
        view: Orientation,
        _shared: &VolumeRenderParams,
        params: &ReformatPlaneMaterialParams,
        camera: &ViewCamera,
        viewport: Viewport,
    ) {
        self.images[view.index()] =
            self.volume
                .render_view(params, camera, viewport, self.interpolation);
    }

    fn draw_crosshair(&mut self, view: Orientation, geometry: &CrosshairGeometry, _viewport: Viewport) {
        self.overlays[view.index()] = geometry.to_screen();
    }
}

/// Draws a segment given in screen pixels with the origin bottom-left.
fn rasterize(image: &mut RgbImage, segment: &LineSegment) {
    let (width, height) = image.dimensions();
    let delta = segment.end - segment.start;
    let length = delta.norm();
    if length < f64::EPSILON {
        return;
    }
    let period = segment.dash.map(|(dash, gap)| dash + gap);
    let steps = length.ceil() as u32;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        if let (Some(period), Some((dash, _))) = (period, segment.dash) {
            if (t * length) % period >= dash {
                continue;
            }
        }
        let p = segment.start + delta * t;
        let x = p.x.round();
        let y = (height as f64 - 1.0 - p.y).round();
        if x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64 {
            image.put_pixel(x as u32, y as u32, Rgb(segment.color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wide_viewport_letterboxes_horizontally() {
        let camera = ViewCamera::fit(100.0, 50.0, Viewport::new(400, 100)).unwrap();
        assert_relative_eq!(camera.view_height(), 50.0);
        assert_relative_eq!(camera.view_width(), 200.0);
        let size = camera.plane_pixel_size(100.0, 50.0, Viewport::new(400, 100));
        assert_relative_eq!(size, Vector2::new(200.0, 100.0));
    }

    #[test]
    fn tall_viewport_letterboxes_vertically() {
        let camera = ViewCamera::fit(100.0, 50.0, Viewport::new(100, 100)).unwrap();
        assert_relative_eq!(camera.view_width(), 100.0);
        assert_relative_eq!(camera.view_height(), 100.0);
        assert_relative_eq!(camera.mm_per_pixel(Viewport::new(100, 100)), 1.0);
    }

    #[test]
    fn empty_viewport_has_no_camera() {
        assert_eq!(ViewCamera::fit(100.0, 50.0, Viewport::new(0, 100)), None);
    }

    #[test]
    fn uniform_block_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<PlaneUniforms>() % 16, 0);
        let plane = ReformatPlane::canonical(
            Orientation::Coronal,
            nalgebra::Point3::new(1.0, 2.0, 3.0),
            [10.0, 20.0, 30.0],
        );
        let params = ReformatPlaneMaterialParams {
            plane,
            window: WindowLevel::default(),
            sample_count: 4,
            sampling_interval: 0.5,
        };
        let shared = VolumeRenderParams {
            texture_size: [8, 9, 10],
            patient_to_voxel: Matrix4::identity(),
        };
        let uniforms = params.to_uniforms(&shared);
        assert_eq!(uniforms.origin, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(uniforms.y_axis, [0.0, 0.0, -1.0, 0.0]);
        assert_eq!(uniforms.texture_size, [8, 9, 10, 0]);
        assert_eq!(uniforms.plane_height, 30.0);
        assert_relative_eq!(params.slab_thickness(), 2.0);
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), std::mem::size_of::<PlaneUniforms>());
    }
}
