use nifti::NiftiError;
pub use snafu::Snafu;
use std::path::PathBuf;

use crate::transform::SliceAxis;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Errors that can occur when reading a volume or taking slices from it
pub enum VolumeError {
    #[snafu(display("error reading volume {}: {}", path.display(), source))]
    ReadError {
        path: PathBuf,
        #[snafu(source(from(NiftiError, Box::new)))]
        source: Box<NiftiError>,
    },

    #[snafu(display("volume {} is not 3-D: shape={:?}", path.display(), shape))]
    DimensionalityError { path: PathBuf, shape: Vec<usize> },

    #[snafu(display(
        "intensity and label volumes have different shapes: image={:?}, label={:?}",
        image,
        label
    ))]
    ShapeMismatchError { image: Vec<usize>, label: Vec<usize> },

    #[snafu(display("label volume {} holds a non-integer value: {}", path.display(), value))]
    NonIntegralLabelError { path: PathBuf, value: f32 },

    #[snafu(display(
        "slice index out of bounds: axis={}, index={}, length={}",
        axis,
        index,
        length
    ))]
    SliceIndexError {
        axis: SliceAxis,
        index: usize,
        length: usize,
    },
}
