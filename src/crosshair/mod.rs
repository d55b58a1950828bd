//! Linked crosshair overlay of the three MPR views.
//!
//! [`CrossLine`] owns one crosshair per view and interprets pointer input
//! against them. A drag snapshots every crosshair at pointer-down and all
//! updates during the gesture are computed from that snapshot. Effects on
//! the reformat planes are reported as [`CrosshairChange`]s.
//!
//! Pointer positions are element-local pixels with `y` pointing down;
//! crosshair transforms use `y` pointing up from the bottom-left corner.

mod layout;
pub mod link;
mod transform2d;

pub use layout::{
    AXIAL_COLOR, CORONAL_COLOR, CrosshairGeometry, CrosshairStyle, HandleSquare, Hit, LineFamily,
    LineSegment, SAGITTAL_COLOR,
};
pub use transform2d::PlanarTransform2D;

use nalgebra::{Point2, Vector2};
use tracing::debug;

use crate::enums::{Axis, Orientation};
use layout::LayoutInput;
use link::{convert_delta_by_ratio, linked, local_drag_delta, slice_ratio, slice_target};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragMode {
    Center,
    Horizontal,
    Vertical,
    Rotate,
    HorizontalHandle,
    VerticalHandle,
    #[default]
    None,
}

/// Pointer shape hint for the hovered region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cursor {
    Move,
    Pointer,
    Grab,
    #[default]
    Auto,
}

impl From<DragMode> for Cursor {
    fn from(mode: DragMode) -> Self {
        match mode {
            DragMode::Center => Cursor::Move,
            DragMode::Rotate => Cursor::Grab,
            DragMode::Horizontal
            | DragMode::Vertical
            | DragMode::HorizontalHandle
            | DragMode::VerticalHandle => Cursor::Pointer,
            DragMode::None => Cursor::Auto,
        }
    }
}

/// Effect of a drag step on the reformat planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CrosshairChange {
    /// The crosshair of `view` turned by `delta` radians since the last step.
    Rotate { view: Orientation, delta: f64 },
    /// Place the slice of `target` `steps` whole slices away from where it
    /// was when the drag began.
    Slice { target: Orientation, steps: i64 },
    /// A handle of `source` set a slab of `range` source pixels for `target`.
    Range {
        source: Orientation,
        target: Orientation,
        range: f64,
    },
}

/// Running totals of the current gesture. Rotations are reported as
/// per-step deltas, slices as whole steps since the drag began.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InteractionSession {
    last_angles: [f64; 3],
    last_translates: [i64; 3],
}

impl InteractionSession {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn rotation_step(&mut self, view: Orientation, angle: f64) -> f64 {
        let last = std::mem::replace(&mut self.last_angles[view.index()], angle);
        angle - last
    }

    /// Whole slices covered by `value` since the drag began, or `None` while
    /// that total is unchanged.
    pub fn slice_step(&mut self, target: Orientation, value: f64) -> Option<i64> {
        let steps = value.floor() as i64;
        let last = std::mem::replace(&mut self.last_translates[target.index()], steps);
        (steps != last).then_some(steps)
    }
}

/// State of the crosshair drawn over one view.
#[derive(Clone, Debug, PartialEq)]
pub struct CrosshairView {
    pub orientation: Orientation,
    pub transform: PlanarTransform2D,
    pub drag_start: PlanarTransform2D,
    /// Element size in pixels.
    pub size: Vector2<f64>,
    /// On-screen size of the reformat plane.
    pub plane_pixel_size: Vector2<f64>,
    pub total_count: usize,
    pub horizontal_range: f64,
    pub vertical_range: f64,
    pub horizontal_handles_visible: bool,
    pub vertical_handles_visible: bool,
}

impl CrosshairView {
    fn new(orientation: Orientation, size: Vector2<f64>) -> Self {
        let transform = PlanarTransform2D::at(size.x / 2.0, size.y / 2.0);
        Self {
            orientation,
            transform,
            drag_start: transform,
            size,
            plane_pixel_size: Vector2::zeros(),
            total_count: 0,
            horizontal_range: 0.0,
            vertical_range: 0.0,
            horizontal_handles_visible: false,
            vertical_handles_visible: false,
        }
    }

    fn layout_input(&self) -> LayoutInput {
        LayoutInput {
            diagonal: self.size.norm(),
            horizontal_range: self.horizontal_range,
            vertical_range: self.vertical_range,
            horizontal_handles_visible: self.horizontal_handles_visible,
            vertical_handles_visible: self.vertical_handles_visible,
        }
    }

    /// Pointer position (y down) in crosshair view coordinates (y up).
    fn pointer_to_view(&self, pointer: &Point2<f64>) -> Point2<f64> {
        Point2::new(pointer.x, self.size.y - pointer.y)
    }

    fn range_mut(&mut self, axis: Axis) -> &mut f64 {
        match axis {
            Axis::X => &mut self.vertical_range,
            Axis::Y => &mut self.horizontal_range,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ActiveDrag {
    view: Orientation,
    mode: DragMode,
    start: Point2<f64>,
    rotation_center: Point2<f64>,
}

#[derive(Clone, Debug)]
pub struct CrossLine {
    views: [CrosshairView; 3],
    style: CrosshairStyle,
    drag: Option<ActiveDrag>,
    session: InteractionSession,
}

impl CrossLine {
    /// Crosshairs centred in elements of the given pixel sizes, indexed by
    /// [`Orientation::index`].
    pub fn new(sizes: [Vector2<f64>; 3], style: CrosshairStyle) -> Self {
        Self {
            views: Orientation::ALL.map(|o| CrosshairView::new(o, sizes[o.index()])),
            style,
            drag: None,
            session: InteractionSession::default(),
        }
    }

    pub fn view(&self, view: Orientation) -> &CrosshairView {
        &self.views[view.index()]
    }

    fn view_mut(&mut self, view: Orientation) -> &mut CrosshairView {
        &mut self.views[view.index()]
    }

    pub fn style(&self) -> &CrosshairStyle {
        &self.style
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag.map_or(DragMode::None, |d| d.mode)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// In-plane rotation of a crosshair, the tilt of the planes it shows.
    pub fn tilt(&self, view: Orientation) -> f64 {
        self.view(view).transform.rotation
    }

    /// Updates what a view's crosshair knows about its reformat plane.
    pub fn set_plane_metrics(&mut self, view: Orientation, plane_pixel_size: Vector2<f64>, total_count: usize) {
        let v = self.view_mut(view);
        v.plane_pixel_size = plane_pixel_size;
        v.total_count = total_count;
    }

    /// Classifies an element-local pointer position.
    pub fn hit_test(&self, view: Orientation, pointer: &Point2<f64>) -> Hit {
        let v = self.view(view);
        let local = v.transform.to_local(&v.pointer_to_view(pointer));
        layout::hit_test(&self.style, &v.layout_input(), &local)
    }

    /// Hover feedback: shows the handles of the hovered line family.
    pub fn hover(&mut self, view: Orientation, pointer: &Point2<f64>) -> Cursor {
        let hit = self.hit_test(view, pointer);
        let v = self.view_mut(view);
        v.horizontal_handles_visible = hit.family == Some(LineFamily::Horizontal);
        v.vertical_handles_visible = hit.family == Some(LineFamily::Vertical);
        hit.mode.into()
    }

    pub fn pointer_down(&mut self, view: Orientation, pointer: Point2<f64>) -> DragMode {
        let mode = self.hit_test(view, &pointer).mode;
        if mode == DragMode::None {
            return mode;
        }
        for v in &mut self.views {
            v.drag_start = v.transform;
        }
        self.session.reset();
        let v = self.view(view);
        let rotation_center = v.pointer_to_view(&Point2::from(v.drag_start.translation));
        self.drag = Some(ActiveDrag {
            view,
            mode,
            start: pointer,
            rotation_center,
        });
        debug!(%view, ?mode, "drag started");
        mode
    }

    /// Applies a drag step. Moves over other views than the dragged one are
    /// ignored.
    pub fn pointer_move(&mut self, view: Orientation, pointer: Point2<f64>) -> Vec<CrosshairChange> {
        let Some(drag) = self.drag.filter(|d| d.view == view) else {
            return Vec::new();
        };
        match drag.mode {
            DragMode::Rotate => self.rotate(&drag, &pointer),
            DragMode::HorizontalHandle => self.resize_range(&drag, Axis::Y, &pointer),
            DragMode::VerticalHandle => self.resize_range(&drag, Axis::X, &pointer),
            DragMode::Center | DragMode::Horizontal | DragMode::Vertical => {
                self.translate(&drag, pointer - drag.start)
            }
            DragMode::None => Vec::new(),
        }
    }

    /// Ends the gesture; bound to pointer-up anywhere.
    pub fn pointer_up(&mut self) {
        if let Some(drag) = self.drag.take() {
            debug!(view = %drag.view, mode = ?drag.mode, "drag ended");
        }
        self.session.reset();
    }

    pub fn pointer_leave(&mut self, view: Orientation) {
        let v = self.view_mut(view);
        v.horizontal_handles_visible = false;
        v.vertical_handles_visible = false;
        self.pointer_up();
    }

    /// Keeps the crosshair at the same relative position in a resized element.
    pub fn resize(&mut self, view: Orientation, size: Vector2<f64>) {
        let v = self.view_mut(view);
        let fraction = |p: f64, extent: f64| if extent > 0.0 { p / extent } else { 0.5 };
        let t = v.transform.translation;
        v.transform.translation = Vector2::new(
            fraction(t.x, v.size.x) * size.x,
            fraction(t.y, v.size.y) * size.y,
        );
        v.size = size;
    }

    pub fn geometry(&self, view: Orientation) -> CrosshairGeometry {
        let v = self.view(view);
        layout::geometry(&self.style, view, v.transform, &v.layout_input())
    }

    fn rotate(&mut self, drag: &ActiveDrag, pointer: &Point2<f64>) -> Vec<CrosshairChange> {
        let from = drag.start - drag.rotation_center;
        let to = pointer - drag.rotation_center;
        let angle = to.y.atan2(to.x) - from.y.atan2(from.x);
        // screen angles grow clockwise, crosshair angles counter-clockwise
        let v = self.view_mut(drag.view);
        v.transform = v.drag_start.rotated(-angle);
        let delta = self.session.rotation_step(drag.view, angle);
        vec![CrosshairChange::Rotate {
            view: drag.view,
            delta,
        }]
    }

    fn resize_range(&mut self, drag: &ActiveDrag, axis: Axis, pointer: &Point2<f64>) -> Vec<CrosshairChange> {
        let source = self.view(drag.view);
        let to_pointer = source.pointer_to_view(pointer) - Point2::from(source.transform.translation);
        // normal of the line whose slab is resized
        let line = source.transform.local_axis(match axis {
            Axis::Y => Axis::X,
            Axis::X => Axis::Y,
        });
        let normal = Vector2::new(-line.y, line.x);
        let range = 2.0 * to_pointer.dot(&normal).abs();

        let link = linked(drag.view, axis);
        let converted = convert_delta_by_ratio(source, axis, self.view(link.target), link.axis, range);
        *self.view_mut(drag.view).range_mut(axis) = range;
        *self.view_mut(link.target).range_mut(link.axis) = converted;

        vec![CrosshairChange::Range {
            source: drag.view,
            target: slice_target(drag.view, axis),
            range,
        }]
    }

    fn translate(&mut self, drag: &ActiveDrag, delta: Vector2<f64>) -> Vec<CrosshairChange> {
        let start = self.view(drag.view).drag_start;
        let axes: &[Axis] = match drag.mode {
            DragMode::Center => {
                self.view_mut(drag.view).transform = start.translated(Vector2::new(delta.x, -delta.y));
                &[Axis::X, Axis::Y]
            }
            DragMode::Horizontal => {
                let local = local_drag_delta(&start, Axis::Y, &delta);
                self.view_mut(drag.view).transform = start.translated_on_local_axis(Axis::Y, -local);
                &[Axis::Y]
            }
            DragMode::Vertical => {
                let local = local_drag_delta(&start, Axis::X, &delta);
                self.view_mut(drag.view).transform = start.translated_on_local_axis(Axis::X, local);
                &[Axis::X]
            }
            _ => &[],
        };

        let mut changes = Vec::with_capacity(axes.len());
        for &axis in axes {
            let local = local_drag_delta(&start, axis, &delta);
            let source = self.view(drag.view);

            let link = linked(drag.view, axis);
            let converted = convert_delta_by_ratio(source, axis, self.view(link.target), link.axis, local);

            let target = slice_target(drag.view, axis);
            let value = local * slice_ratio(self.view(target).total_count, source, axis);

            let t = self.view_mut(link.target);
            t.transform = t
                .drag_start
                .translated_on_local_axis(link.axis, link.sign * converted);

            if let Some(steps) = self.session.slice_step(target, value) {
                changes.push(CrosshairChange::Slice { target, steps });
            }
        }
        changes
    }
}
