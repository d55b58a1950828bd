//! How a movement in one view maps onto the other two.
//!
//! Each crosshair line in a view is the intersection with another view's
//! plane. Moving a line therefore moves the matching line in the third view
//! and steps the slice of the view the line stands for.

use nalgebra::Vector2;

use super::transform2d::PlanarTransform2D;
use super::CrosshairView;
use crate::enums::{Axis, Orientation};

/// The crosshair axis in another view that shows the same plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub target: Orientation,
    pub axis: Axis,
    /// Applied to the converted delta. Local `Y` deltas are measured
    /// downwards while translations along `Y` point up.
    pub sign: f64,
}

pub fn linked(source: Orientation, axis: Axis) -> Link {
    use Axis::{X, Y};
    use Orientation::{Axial, Coronal, Sagittal};

    let (target, axis, sign) = match (source, axis) {
        (Axial, X) => (Coronal, X, 1.0),
        (Axial, Y) => (Sagittal, X, 1.0),
        (Coronal, X) => (Axial, X, 1.0),
        (Coronal, Y) => (Sagittal, Y, -1.0),
        (Sagittal, X) => (Axial, Y, -1.0),
        (Sagittal, Y) => (Coronal, Y, -1.0),
    };
    Link { target, axis, sign }
}

/// The view whose slice moves when `axis` of `view`'s crosshair moves.
pub fn slice_target(view: Orientation, axis: Axis) -> Orientation {
    use Orientation::{Axial, Coronal, Sagittal};

    match (view, axis) {
        (Axial, Axis::X) | (Coronal, Axis::X) => Sagittal,
        (Axial, Axis::Y) => Coronal,
        (Coronal, Axis::Y) | (Sagittal, Axis::Y) => Axial,
        (Sagittal, Axis::X) => Coronal,
    }
}

/// Component of a screen-space pointer delta (y down) along the direction
/// a crosshair line moves in.
pub fn local_drag_delta(transform: &PlanarTransform2D, axis: Axis, delta: &Vector2<f64>) -> f64 {
    let (sin, cos) = transform.rotation.sin_cos();
    let direction = match axis {
        Axis::X => Vector2::new(cos, -sin),
        Axis::Y => Vector2::new(sin, cos),
    };
    delta.dot(&direction)
}

/// Extent of a `plane_pixel_size` rectangle along a rotated local axis.
pub fn projected_length(transform: &PlanarTransform2D, axis: Axis, plane_pixel_size: &Vector2<f64>) -> f64 {
    let alpha = match axis {
        Axis::X => transform.rotation,
        Axis::Y => transform.rotation + std::f64::consts::FRAC_PI_2,
    };
    plane_pixel_size.x * alpha.cos().abs() + plane_pixel_size.y * alpha.sin().abs()
}

/// Converts a pixel delta along `source_axis` of `source` into the pixel
/// delta covering the same fraction of `target` along `target_axis`.
/// Lengths come from the drag-start transforms.
pub fn convert_delta_by_ratio(
    source: &CrosshairView,
    source_axis: Axis,
    target: &CrosshairView,
    target_axis: Axis,
    delta: f64,
) -> f64 {
    let source_length = projected_length(&source.drag_start, source_axis, &source.plane_pixel_size);
    let target_length = projected_length(&target.drag_start, target_axis, &target.plane_pixel_size);
    if source_length <= f64::EPSILON {
        return 0.0;
    }
    delta / source_length * target_length
}

/// Slices of `slice_count` per pixel along `axis` of `view`.
pub fn slice_ratio(slice_count: usize, view: &CrosshairView, axis: Axis) -> f64 {
    let length = projected_length(&view.drag_start, axis, &view.plane_pixel_size);
    if length <= f64::EPSILON {
        return 0.0;
    }
    slice_count as f64 / length
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn links_are_symmetric() {
        for view in Orientation::ALL {
            for axis in [Axis::X, Axis::Y] {
                let there = linked(view, axis);
                let back = linked(there.target, there.axis);
                assert_eq!((back.target, back.axis), (view, axis));
            }
        }
    }

    #[test]
    fn each_line_steps_the_third_view() {
        for view in Orientation::ALL {
            for axis in [Axis::X, Axis::Y] {
                let target = slice_target(view, axis);
                assert_ne!(target, view);
                assert_ne!(target, linked(view, axis).target);
            }
        }
    }

    #[test]
    fn projected_length_turns_with_the_crosshair() {
        let size = Vector2::new(300.0, 100.0);
        let flat = PlanarTransform2D::default();
        assert_relative_eq!(projected_length(&flat, Axis::X, &size), 300.0);
        assert_relative_eq!(projected_length(&flat, Axis::Y, &size), 100.0, epsilon = 1e-9);
        let turned = flat.rotated(FRAC_PI_2);
        assert_relative_eq!(projected_length(&turned, Axis::X, &size), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn drag_delta_is_measured_along_the_line_normal() {
        let delta = Vector2::new(10.0, 4.0);
        let flat = PlanarTransform2D::default();
        assert_relative_eq!(local_drag_delta(&flat, Axis::X, &delta), 10.0);
        assert_relative_eq!(local_drag_delta(&flat, Axis::Y, &delta), 4.0);
        let turned = flat.rotated(FRAC_PI_2);
        assert_relative_eq!(local_drag_delta(&turned, Axis::X, &delta), -4.0, epsilon = 1e-9);
    }
}
