use std::fmt;

/// The three linked MPR views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    /// Position of the view in per-view arrays.
    pub fn index(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::Axial => "Axial",
            Orientation::Coronal => "Coronal",
            Orientation::Sagittal => "Sagittal",
        };
        f.write_str(name)
    }
}

/// In-plane axis of a view. `X` is moved by the vertical crosshair line,
/// `Y` by the horizontal one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Trilinear,
    // TODO: tricubic sampling for the CPU renderer
    Nearest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Projection of ImagePositionPatient onto the stacking normal.
    #[default]
    ImagePositionPatient,
    InstanceNumber,
    None,
}
