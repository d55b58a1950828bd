//! Crosshair segments, handles and their hit regions, all expressed in the
//! crosshair's local frame (origin at the crosshair centre, `y` up).

use nalgebra::{Point2, Vector2};

use super::transform2d::PlanarTransform2D;
use super::DragMode;
use crate::enums::Orientation;

pub const AXIAL_COLOR: [u8; 3] = [0x3f, 0x87, 0xf5];
pub const CORONAL_COLOR: [u8; 3] = [0x26, 0xd0, 0x70];
pub const SAGITTAL_COLOR: [u8; 3] = [0xf7, 0xa9, 0x27];

/// Slab guide lines are only shown above this range, in pixels.
const MIN_VISIBLE_RANGE: f64 = 1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct CrosshairStyle {
    /// Half-size of the empty square around the centre.
    pub center_gap: f64,
    /// Distance from the centre where dashed segments end and solid ones begin.
    pub dash_zone: f64,
    /// Half-width of a line hitbox.
    pub hot_zone_padding: f64,
    pub handle_size: f64,
    /// Distance of the handles beyond the end of the dash zone.
    pub handle_offset: f64,
    pub line_width: f64,
    pub dash_size: f64,
    pub gap_size: f64,
    pub view_colors: [[u8; 3]; 3],
}

impl Default for CrosshairStyle {
    fn default() -> Self {
        Self {
            center_gap: 32.0,
            dash_zone: 128.0,
            hot_zone_padding: 10.0,
            handle_size: 8.0,
            handle_offset: 15.0,
            line_width: 2.0,
            dash_size: 6.0,
            gap_size: 6.0,
            view_colors: [AXIAL_COLOR, CORONAL_COLOR, SAGITTAL_COLOR],
        }
    }
}

impl CrosshairStyle {
    /// Colours of the horizontal and vertical line in `view`; each line takes
    /// the colour of the view whose plane it represents.
    pub fn line_colors(&self, view: Orientation) -> ([u8; 3], [u8; 3]) {
        let [axial, coronal, sagittal] = self.view_colors;
        match view {
            Orientation::Axial => (coronal, sagittal),
            Orientation::Coronal => (axial, sagittal),
            Orientation::Sagittal => (axial, coronal),
        }
    }
}

/// The two line families of a crosshair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineFamily {
    Horizontal,
    Vertical,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineSegment {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub color: [u8; 3],
    pub width: f64,
    /// Dash and gap length, `None` for a solid line.
    pub dash: Option<(f64, f64)>,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandleSquare {
    pub center: Point2<f64>,
    pub half_size: f64,
    pub color: [u8; 3],
    pub visible: bool,
}

/// Everything needed to draw one crosshair.
#[derive(Clone, Debug, PartialEq)]
pub struct CrosshairGeometry {
    pub transform: PlanarTransform2D,
    pub segments: Vec<LineSegment>,
    pub handles: Vec<HandleSquare>,
}

impl CrosshairGeometry {
    /// Segments in view pixels, handles outlined as four edges each.
    pub fn to_screen(&self) -> Vec<LineSegment> {
        let t = &self.transform;
        let outline = self.handles.iter().flat_map(|h| {
            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .map(|(sx, sy)| h.center + Vector2::new(sx, sy) * h.half_size);
            (0..4).map(move |i| LineSegment {
                start: corners[i],
                end: corners[(i + 1) % 4],
                color: h.color,
                width: 1.0,
                dash: None,
                visible: h.visible,
            })
        });
        self.segments
            .iter()
            .cloned()
            .chain(outline)
            .map(|s| LineSegment {
                start: t.to_view(&s.start),
                end: t.to_view(&s.end),
                ..s
            })
            .collect()
    }
}

/// Per-crosshair values the layout depends on.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LayoutInput {
    pub diagonal: f64,
    pub horizontal_range: f64,
    pub vertical_range: f64,
    pub horizontal_handles_visible: bool,
    pub vertical_handles_visible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Shape {
    Segment(Point2<f64>, Point2<f64>),
    Square { center: Point2<f64>, half_size: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Hitbox {
    shape: Shape,
    mode: DragMode,
    family: Option<LineFamily>,
}

impl Hitbox {
    fn segment(start: (f64, f64), end: (f64, f64), mode: DragMode, family: LineFamily) -> Self {
        Self {
            shape: Shape::Segment(Point2::new(start.0, start.1), Point2::new(end.0, end.1)),
            mode,
            family: Some(family),
        }
    }

    fn square(center: (f64, f64), half_size: f64, mode: DragMode, family: Option<LineFamily>) -> Self {
        Self {
            shape: Shape::Square {
                center: Point2::new(center.0, center.1),
                half_size,
            },
            mode,
            family,
        }
    }

    fn contains(&self, p: &Point2<f64>, padding: f64) -> bool {
        match self.shape {
            Shape::Square { center, half_size } => {
                (p.x - center.x).abs() <= half_size && (p.y - center.y).abs() <= half_size
            }
            Shape::Segment(a, b) => {
                let ab = b - a;
                let len2 = ab.norm_squared();
                if len2 == 0.0 {
                    return false;
                }
                let t = (p - a).dot(&ab) / len2;
                (0.0..=1.0).contains(&t) && (p - (a + ab * t)).norm() <= padding
            }
        }
    }
}

/// Result of classifying a pointer position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub mode: DragMode,
    /// Line family whose handles the pointer is over, if any.
    pub family: Option<LineFamily>,
}

impl Hit {
    pub const NONE: Hit = Hit {
        mode: DragMode::None,
        family: None,
    };
}

fn handle_centers(style: &CrosshairStyle, input: &LayoutInput) -> [Vec<(f64, f64)>; 2] {
    let far = style.dash_zone + style.handle_offset;
    let h = input.horizontal_range / 2.0;
    let v = input.vertical_range / 2.0;
    [
        vec![(-far, h), (far, h), (-far, -h), (far, -h)],
        vec![(v, far), (v, -far), (-v, far), (-v, -far)],
    ]
}

/// Hit regions in priority order; the first containing region wins.
pub(crate) fn hitboxes(style: &CrosshairStyle, input: &LayoutInput) -> Vec<Hitbox> {
    use LineFamily::{Horizontal, Vertical};

    let d = input.diagonal;
    let (gap, zone) = (style.center_gap, style.dash_zone);
    let [horizontal_handles, vertical_handles] = handle_centers(style, input);

    let mut boxes: Vec<Hitbox> = horizontal_handles
        .into_iter()
        .map(|c| Hitbox::square(c, style.handle_size, DragMode::HorizontalHandle, Some(Horizontal)))
        .chain(
            vertical_handles
                .into_iter()
                .map(|c| Hitbox::square(c, style.handle_size, DragMode::VerticalHandle, Some(Vertical))),
        )
        .collect();

    boxes.extend([
        Hitbox::segment((-d, 0.0), (-zone, 0.0), DragMode::Rotate, Horizontal),
        Hitbox::segment((zone, 0.0), (d, 0.0), DragMode::Rotate, Horizontal),
        Hitbox::segment((0.0, zone), (0.0, d), DragMode::Rotate, Vertical),
        Hitbox::segment((0.0, -d), (0.0, -zone), DragMode::Rotate, Vertical),
        Hitbox::segment((-zone, 0.0), (-gap, 0.0), DragMode::Horizontal, Horizontal),
        Hitbox::segment((gap, 0.0), (zone, 0.0), DragMode::Horizontal, Horizontal),
        Hitbox::segment((0.0, gap), (0.0, zone), DragMode::Vertical, Vertical),
        Hitbox::segment((0.0, -gap), (0.0, -zone), DragMode::Vertical, Vertical),
        Hitbox::square((0.0, 0.0), gap, DragMode::Center, None),
    ]);

    if input.horizontal_range > MIN_VISIBLE_RANGE {
        let h = input.horizontal_range / 2.0;
        boxes.push(Hitbox::segment((-d, h), (d, h), DragMode::None, Horizontal));
        boxes.push(Hitbox::segment((-d, -h), (d, -h), DragMode::None, Horizontal));
    }
    if input.vertical_range > MIN_VISIBLE_RANGE {
        let v = input.vertical_range / 2.0;
        boxes.push(Hitbox::segment((v, d), (v, -d), DragMode::None, Vertical));
        boxes.push(Hitbox::segment((-v, d), (-v, -d), DragMode::None, Vertical));
    }
    boxes
}

/// Classifies a point given in the crosshair's local frame.
pub(crate) fn hit_test(style: &CrosshairStyle, input: &LayoutInput, local: &Point2<f64>) -> Hit {
    hitboxes(style, input)
        .into_iter()
        .find(|b| b.contains(local, style.hot_zone_padding))
        .map_or(Hit::NONE, |b| Hit {
            mode: b.mode,
            family: b.family,
        })
}

pub(crate) fn geometry(
    style: &CrosshairStyle,
    view: Orientation,
    transform: PlanarTransform2D,
    input: &LayoutInput,
) -> CrosshairGeometry {
    let (h_color, v_color) = style.line_colors(view);
    let d = input.diagonal;
    let (gap, zone) = (style.center_gap, style.dash_zone);
    let dash = Some((style.dash_size, style.gap_size));
    let line = |start: (f64, f64),
                end: (f64, f64),
                color: [u8; 3],
                dash: Option<(f64, f64)>,
                width: f64,
                visible: bool| LineSegment {
        start: Point2::new(start.0, start.1),
        end: Point2::new(end.0, end.1),
        color,
        width,
        dash,
        visible,
    };
    let w = style.line_width;
    let h = input.horizontal_range / 2.0;
    let v = input.vertical_range / 2.0;
    let show_h = input.horizontal_range > MIN_VISIBLE_RANGE;
    let show_v = input.vertical_range > MIN_VISIBLE_RANGE;

    let segments = vec![
        line((-d, 0.0), (-zone, 0.0), h_color, None, w, true),
        line((zone, 0.0), (d, 0.0), h_color, None, w, true),
        line((0.0, zone), (0.0, d), v_color, None, w, true),
        line((0.0, -d), (0.0, -zone), v_color, None, w, true),
        line((-zone, 0.0), (-gap, 0.0), h_color, dash, w, true),
        line((gap, 0.0), (zone, 0.0), h_color, dash, w, true),
        line((0.0, gap), (0.0, zone), v_color, dash, w, true),
        line((0.0, -gap), (0.0, -zone), v_color, dash, w, true),
        line((-d, h), (d, h), h_color, dash, 1.0, show_h),
        line((-d, -h), (d, -h), h_color, dash, 1.0, show_h),
        line((v, d), (v, -d), v_color, dash, 1.0, show_v),
        line((-v, d), (-v, -d), v_color, dash, 1.0, show_v),
    ];

    let [horizontal_handles, vertical_handles] = handle_centers(style, input);
    let square = |c: (f64, f64), color: [u8; 3], visible: bool| HandleSquare {
        center: Point2::new(c.0, c.1),
        half_size: style.handle_size / 2.0,
        color,
        visible,
    };
    let handles = horizontal_handles
        .into_iter()
        .map(|c| square(c, h_color, input.horizontal_handles_visible))
        .chain(
            vertical_handles
                .into_iter()
                .map(|c| square(c, v_color, input.vertical_handles_visible)),
        )
        .collect();

    CrosshairGeometry {
        transform,
        segments,
        handles,
    }
}
