use nalgebra::{Point3, Rotation3, Unit, Vector3};

use crate::enums::{Axis, Orientation};

/// A cutting plane through the volume in patient space.
///
/// `origin` is the centre of the sampled rectangle; `width` and `height`
/// are its extent in millimetres along `x_axis` and `y_axis`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReformatPlane {
    pub origin: Point3<f64>,
    pub x_axis: Vector3<f64>,
    pub y_axis: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub width: f64,
    pub height: f64,
}

impl ReformatPlane {
    /// Axis-aligned plane for one of the three views, centred on `center`.
    ///
    /// `physical_size` is the volume extent along patient x, y and z.
    pub fn canonical(orientation: Orientation, center: Point3<f64>, physical_size: [f64; 3]) -> Self {
        let [sx, sy, sz] = physical_size;
        let (x_axis, y_axis, normal, width, height) = match orientation {
            Orientation::Axial => (
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, -1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
                sx,
                sy,
            ),
            Orientation::Coronal => (
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 0.0, -1.0),
                Vector3::new(0.0, 1.0, 0.0),
                sx,
                sz,
            ),
            Orientation::Sagittal => (
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, -1.0),
                Vector3::new(1.0, 0.0, 0.0),
                sy,
                sz,
            ),
        };
        Self {
            origin: center,
            x_axis,
            y_axis,
            normal,
            width,
            height,
        }
    }

    /// Patient position of plane coordinates `u`, `v` in `[-0.5, 0.5]`.
    pub fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        self.origin + self.x_axis * (u * self.width) + self.y_axis * (v * self.height)
    }

    pub fn base_axis(&self, axis: Axis) -> Vector3<f64> {
        match axis {
            Axis::X => self.x_axis,
            Axis::Y => self.y_axis,
        }
    }

    /// The in-plane `axis` tilted by `tilt` radians around the plane normal.
    pub fn tilted_axis(&self, axis: Axis, tilt: f64) -> Vector3<f64> {
        let normal = Unit::new_normalize(self.normal);
        Rotation3::from_axis_angle(&normal, tilt) * self.base_axis(axis)
    }

    /// Rotates the plane frame by `radian` around `axis`, re-normalising the
    /// result. A zero-length axis leaves the plane unchanged.
    pub fn rotate(&mut self, axis: &Vector3<f64>, radian: f64) {
        let Some(axis) = Unit::try_new(*axis, 1e-12) else {
            return;
        };
        let rotation = Rotation3::from_axis_angle(&axis, radian);
        self.x_axis = (rotation * self.x_axis).normalize();
        self.y_axis = (rotation * self.y_axis).normalize();
        self.normal = (rotation * self.normal).normalize();
    }

    /// Moves the origin onto `center + normal * offset`.
    pub fn place_at_offset(&mut self, center: &Point3<f64>, offset: f64) {
        self.origin = center + self.normal * offset;
    }

    /// Signed distance of the origin from `center` along the normal.
    pub fn offset_from(&self, center: &Point3<f64>) -> f64 {
        (self.origin - center).dot(&self.normal)
    }
}
