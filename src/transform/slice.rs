use ndarray::{Array2, Array3, Axis};
use snafu::ensure;
use std::fmt;

use crate::errors::volume::{SliceIndexSnafu, VolumeError};

/// Volume axis along which 2-D planes are taken.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SliceAxis {
    #[default]
    X,
    Y,
    Z,
}

impl SliceAxis {
    pub fn index(&self) -> usize {
        match self {
            SliceAxis::X => 0,
            SliceAxis::Y => 1,
            SliceAxis::Z => 2,
        }
    }

    pub fn as_axis(&self) -> Axis {
        Axis(self.index())
    }
}

impl fmt::Display for SliceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis_str = match self {
            SliceAxis::X => "x",
            SliceAxis::Y => "y",
            SliceAxis::Z => "z",
        };
        write!(f, "{}", axis_str)
    }
}

/// Which planes along the slice axis are written for every subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceSelection {
    /// The plane at `length / 2`
    #[default]
    Central,
    /// A single fixed plane
    Index(usize),
    /// Every `step`-th plane beginning at `start`
    Strided { start: usize, step: usize },
}

impl SliceSelection {
    /// True when exactly one plane is written per subject, in which case output files
    /// are named after the subject alone.
    pub fn is_single(&self) -> bool {
        !matches!(self, SliceSelection::Strided { .. })
    }

    /// Resolve the plane indices for an axis of the given length.
    pub fn indices(&self, axis: SliceAxis, length: usize) -> Result<Vec<usize>, VolumeError> {
        let (first, indices) = match *self {
            SliceSelection::Central => (length / 2, vec![length / 2]),
            SliceSelection::Index(index) => (index, vec![index]),
            SliceSelection::Strided { start, step } => {
                (start, (start..length).step_by(step.max(1)).collect())
            }
        };
        ensure!(
            first < length,
            SliceIndexSnafu {
                axis,
                index: first,
                length
            }
        );
        Ok(indices)
    }
}

impl fmt::Display for SliceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceSelection::Central => write!(f, "central"),
            SliceSelection::Index(index) => write!(f, "index {}", index),
            SliceSelection::Strided { start, step } => {
                write!(f, "every {} from {}", step, start)
            }
        }
    }
}

/// Take the 2-D plane at `index` along `axis`. The remaining two axes keep their order,
/// so the plane's rows follow the lower remaining axis.
pub fn extract_slice<T: Clone>(
    volume: &Array3<T>,
    axis: SliceAxis,
    index: usize,
) -> Result<Array2<T>, VolumeError> {
    let length = volume.len_of(axis.as_axis());
    ensure!(
        index < length,
        SliceIndexSnafu {
            axis,
            index,
            length
        }
    );
    Ok(volume.index_axis(axis.as_axis(), index).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rstest::rstest;

    fn ramp(shape: (usize, usize, usize)) -> Array3<f32> {
        Array3::from_shape_fn(shape, |(x, y, z)| (x * 100 + y * 10 + z) as f32)
    }

    #[rstest]
    #[case::x(SliceAxis::X, 1, (3, 4), 100.0 + 2.0 * 10.0 + 3.0)]
    #[case::y(SliceAxis::Y, 1, (2, 4), 10.0 + 1.0 * 100.0 + 3.0)]
    #[case::z(SliceAxis::Z, 1, (2, 3), 1.0 + 1.0 * 100.0 + 2.0 * 10.0)]
    fn test_extract_slice(
        #[case] axis: SliceAxis,
        #[case] index: usize,
        #[case] expected_shape: (usize, usize),
        #[case] expected_value: f32,
    ) {
        let volume = ramp((2, 3, 4));
        let slice = extract_slice(&volume, axis, index).unwrap();
        assert_eq!(slice.dim(), expected_shape);
        match axis {
            SliceAxis::X => assert_eq!(slice[[2, 3]], expected_value),
            SliceAxis::Y => assert_eq!(slice[[1, 3]], expected_value),
            SliceAxis::Z => assert_eq!(slice[[1, 2]], expected_value),
        }
    }

    #[test]
    fn test_extract_slice_out_of_bounds() {
        let volume = ramp((2, 3, 4));
        let result = extract_slice(&volume, SliceAxis::Z, 4);
        assert!(matches!(
            result,
            Err(VolumeError::SliceIndexError {
                index: 4,
                length: 4,
                ..
            })
        ));
    }

    #[rstest]
    #[case::central(SliceSelection::Central, 5, vec![2])]
    #[case::central_even(SliceSelection::Central, 4, vec![2])]
    #[case::index(SliceSelection::Index(0), 5, vec![0])]
    #[case::strided(SliceSelection::Strided { start: 1, step: 2 }, 6, vec![1, 3, 5])]
    #[case::strided_one(SliceSelection::Strided { start: 0, step: 1 }, 3, vec![0, 1, 2])]
    fn test_indices(
        #[case] selection: SliceSelection,
        #[case] length: usize,
        #[case] expected: Vec<usize>,
    ) {
        let indices = selection.indices(SliceAxis::X, length).unwrap();
        assert_eq!(indices, expected);
    }

    #[rstest]
    #[case::empty_axis(SliceSelection::Central, 0)]
    #[case::index_past_end(SliceSelection::Index(5), 5)]
    #[case::start_past_end(SliceSelection::Strided { start: 7, step: 2 }, 5)]
    fn test_indices_out_of_bounds(#[case] selection: SliceSelection, #[case] length: usize) {
        let result = selection.indices(SliceAxis::Y, length);
        assert!(matches!(result, Err(VolumeError::SliceIndexError { .. })));
    }

    #[test]
    fn test_is_single() {
        assert!(SliceSelection::Central.is_single());
        assert!(SliceSelection::Index(3).is_single());
        assert!(!SliceSelection::Strided { start: 0, step: 1 }.is_single());
    }
}
