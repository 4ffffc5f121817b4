use ndarray::{s, Array2};
use std::fmt;

use crate::transform::Transform;

/// Fixed orientation correction applied identically to intensity and label slices.
/// Rotations are counter-clockwise when the first array axis is drawn top to bottom.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Orientation {
    None,
    #[default]
    Rot90,
    Rot180,
    Rot270,
    FlipHorizontal,
    FlipVertical,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let orientation_str = match self {
            Orientation::None => "none",
            Orientation::Rot90 => "rot90",
            Orientation::Rot180 => "rot180",
            Orientation::Rot270 => "rot270",
            Orientation::FlipHorizontal => "flip-horizontal",
            Orientation::FlipVertical => "flip-vertical",
        };
        write!(f, "{}", orientation_str)
    }
}

impl Orientation {
    /// Shape of a `(rows, cols)` plane after this orientation is applied.
    pub fn output_shape(&self, (rows, cols): (usize, usize)) -> (usize, usize) {
        match self {
            Orientation::Rot90 | Orientation::Rot270 => (cols, rows),
            _ => (rows, cols),
        }
    }
}

impl<T: Clone> Transform<Array2<T>> for Orientation {
    fn apply(&self, plane: &Array2<T>) -> Array2<T> {
        let view = plane.view();
        let oriented = match self {
            Orientation::None => view,
            Orientation::Rot90 => view.slice_move(s![.., ..;-1]).reversed_axes(),
            Orientation::Rot180 => view.slice_move(s![..;-1, ..;-1]),
            Orientation::Rot270 => view.slice_move(s![..;-1, ..]).reversed_axes(),
            Orientation::FlipHorizontal => view.slice_move(s![.., ..;-1]),
            Orientation::FlipVertical => view.slice_move(s![..;-1, ..]),
        };
        oriented.as_standard_layout().into_owned()
    }
}
