use nalgebra::{Isometry2, Matrix3, Point2, Vector2};

use crate::enums::Axis;

/// Position and in-plane rotation of a crosshair, in view pixels with the
/// origin at the bottom-left corner and `y` pointing up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlanarTransform2D {
    pub translation: Vector2<f64>,
    pub rotation: f64,
}

impl PlanarTransform2D {
    pub fn new(translation: Vector2<f64>, rotation: f64) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn at(x: f64, y: f64) -> Self {
        Self::new(Vector2::new(x, y), 0.0)
    }

    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.translation, self.rotation)
    }

    pub fn to_homogeneous(&self) -> Matrix3<f64> {
        self.isometry().to_homogeneous()
    }

    /// Recovers translation and rotation from a rigid 2D matrix.
    pub fn from_homogeneous(m: &Matrix3<f64>) -> Self {
        Self::new(Vector2::new(m[(0, 2)], m[(1, 2)]), m[(1, 0)].atan2(m[(0, 0)]))
    }

    /// Unit direction of a local axis in view coordinates.
    pub fn local_axis(&self, axis: Axis) -> Vector2<f64> {
        let (sin, cos) = self.rotation.sin_cos();
        match axis {
            Axis::X => Vector2::new(cos, sin),
            Axis::Y => Vector2::new(-sin, cos),
        }
    }

    /// Translated in view space.
    pub fn translated(&self, delta: Vector2<f64>) -> Self {
        Self::new(self.translation + delta, self.rotation)
    }

    /// Translated by `distance` along one of its own axes.
    pub fn translated_on_local_axis(&self, axis: Axis, distance: f64) -> Self {
        self.translated(self.local_axis(axis) * distance)
    }

    /// Rotated about its own centre.
    pub fn rotated(&self, radian: f64) -> Self {
        Self::new(self.translation, self.rotation + radian)
    }

    pub fn to_local(&self, point: &Point2<f64>) -> Point2<f64> {
        self.isometry().inverse_transform_point(point)
    }

    pub fn to_view(&self, local: &Point2<f64>) -> Point2<f64> {
        self.isometry().transform_point(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn matrix_round_trip_keeps_angle_and_position() {
        let t = PlanarTransform2D::new(Vector2::new(120.0, -4.5), 0.7);
        let back = PlanarTransform2D::from_homogeneous(&t.to_homogeneous());
        assert_relative_eq!(back.translation, t.translation, epsilon = 1e-12);
        assert_relative_eq!(back.rotation, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn local_translation_follows_the_rotated_axis() {
        let t = PlanarTransform2D::at(10.0, 10.0).rotated(FRAC_PI_2);
        let moved = t.translated_on_local_axis(Axis::X, 5.0);
        assert_relative_eq!(moved.translation, Vector2::new(10.0, 15.0), epsilon = 1e-12);
        let moved = t.translated_on_local_axis(Axis::Y, 5.0);
        assert_relative_eq!(moved.translation, Vector2::new(5.0, 10.0), epsilon = 1e-12);
    }

    #[test]
    fn local_and_view_frames_are_inverse() {
        let t = PlanarTransform2D::new(Vector2::new(50.0, 40.0), -0.3);
        let p = Point2::new(3.0, -8.0);
        assert_relative_eq!(t.to_local(&t.to_view(&p)), p, epsilon = 1e-12);
    }
}
