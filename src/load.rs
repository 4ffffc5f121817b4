use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::{InMemNiftiObject, IntoNdArray, NiftiObject, ReaderOptions};
use snafu::{ensure, OptionExt, ResultExt};
use std::path::Path;

use crate::errors::volume::{
    DimensionalitySnafu, NonIntegralLabelSnafu, ReadSnafu, ShapeMismatchSnafu, VolumeError,
};
use crate::file::VolumeFileOperations;

/// An intensity volume and its co-registered label volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePair {
    pub image: Array3<f32>,
    pub label: Array3<i32>,
}

impl VolumePair {
    pub fn new(image: Array3<f32>, label: Array3<i32>) -> Result<Self, VolumeError> {
        check_shapes(&image, &label)?;
        Ok(Self { image, label })
    }

    /// Load both volumes of a subject and check that their shapes agree.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(image: P, label: Q) -> Result<Self, VolumeError> {
        let image = load_volume(image)?;
        let label = load_label_volume(label)?;
        Self::new(image, label)
    }

    pub fn shape(&self) -> &[usize] {
        self.image.shape()
    }
}

fn read_object(path: &Path) -> Result<InMemNiftiObject, VolumeError> {
    let options = ReaderOptions::new();
    let object = match path.paired_files() {
        Some((header, data)) => options.read_file_pair(header, data),
        None => options.read_file(path),
    };
    object.context(ReadSnafu { path })
}

/// Drop trailing unit axes (e.g. a single time point) until the data is 3-D.
fn squeeze_to_3d(data: ArrayD<f32>, path: &Path) -> Result<Array3<f32>, VolumeError> {
    let shape = data.shape().to_vec();
    let mut data = data;
    while data.ndim() > 3 && data.len_of(Axis(data.ndim() - 1)) == 1 {
        let last = Axis(data.ndim() - 1);
        data = data.index_axis_move(last, 0);
    }
    data.into_dimensionality::<Ix3>()
        .ok()
        .context(DimensionalitySnafu { path, shape })
}

/// Read a NIfTI volume as raw intensities. Scaling from the header (`scl_slope`,
/// `scl_inter`) is applied.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Array3<f32>, VolumeError> {
    let path = path.as_ref();
    let data = read_object(path)?
        .into_volume()
        .into_ndarray::<f32>()
        .context(ReadSnafu { path })?;
    squeeze_to_3d(data, path)
}

/// Read a NIfTI label volume. Every voxel must hold an integer value.
pub fn load_label_volume<P: AsRef<Path>>(path: P) -> Result<Array3<i32>, VolumeError> {
    let path = path.as_ref();
    let data = load_volume(path)?;
    if let Some(&value) = data.iter().find(|v| !v.is_finite() || v.fract() != 0.0) {
        return NonIntegralLabelSnafu { path, value }.fail();
    }
    Ok(data.mapv(|v| v as i32))
}

pub fn check_shapes(image: &Array3<f32>, label: &Array3<i32>) -> Result<(), VolumeError> {
    ensure!(
        image.shape() == label.shape(),
        ShapeMismatchSnafu {
            image: image.shape().to_vec(),
            label: label.shape().to_vec(),
        }
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use ndarray::Array3;
    use nifti::writer::WriterOptions;
    use std::path::Path;

    pub(crate) fn write_intensity<P: AsRef<Path>>(path: P, data: &Array3<f32>) {
        WriterOptions::new(path.as_ref()).write_nifti(data).unwrap();
    }

    pub(crate) fn write_labels<P: AsRef<Path>>(path: P, data: &Array3<u8>) {
        WriterOptions::new(path.as_ref()).write_nifti(data).unwrap();
    }

    /// Intensity ramp with a distinct value in every voxel.
    pub(crate) fn ramp(shape: (usize, usize, usize)) -> Array3<f32> {
        Array3::from_shape_fn(shape, |(x, y, z)| (x * 100 + y * 10 + z) as f32)
    }

    /// Labels cycling through `0..num_classes`.
    pub(crate) fn cyclic_labels(shape: (usize, usize, usize), num_classes: u8) -> Array3<u8> {
        Array3::from_shape_fn(shape, |(x, y, z)| ((x + y + z) % num_classes as usize) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::nii("image.nii")]
    #[case::nii_gz("image.nii.gz")]
    fn test_load_volume(#[case] filename: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(filename);
        let expected = ramp((4, 5, 6));
        write_intensity(&path, &expected);

        let volume = load_volume(&path).unwrap();
        assert_eq!(volume, expected);
    }

    #[test]
    fn test_load_label_volume() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("label.nii.gz");
        let expected = cyclic_labels((3, 4, 5), 4);
        write_labels(&path, &expected);

        let volume = load_label_volume(&path).unwrap();
        assert_eq!(volume, expected.mapv(|v| v as i32));
    }

    #[test]
    fn test_load_label_volume_non_integral() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("label.nii");
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[1, 1, 1]] = 0.5;
        write_intensity(&path, &data);

        let result = load_label_volume(&path);
        assert!(matches!(
            result,
            Err(VolumeError::NonIntegralLabelError { value, .. }) if value == 0.5
        ));
    }

    #[test]
    fn test_load_volume_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.nii");
        std::fs::write(&path, b"definitely not a nifti file").unwrap();

        let result = load_volume(&path);
        assert!(matches!(result, Err(VolumeError::ReadError { .. })));
    }

    #[test]
    fn test_load_volume_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_volume(temp_dir.path().join("missing.nii.gz"));
        assert!(matches!(result, Err(VolumeError::ReadError { .. })));
    }

    #[rstest]
    #[case::already_3d(vec![2, 3, 4], Some((2, 3, 4)))]
    #[case::trailing_unit(vec![2, 3, 4, 1], Some((2, 3, 4)))]
    #[case::many_trailing_units(vec![2, 3, 4, 1, 1], Some((2, 3, 4)))]
    #[case::time_series(vec![2, 3, 4, 2], None)]
    #[case::planar(vec![2, 3], None)]
    fn test_squeeze_to_3d(
        #[case] shape: Vec<usize>,
        #[case] expected: Option<(usize, usize, usize)>,
    ) {
        let data = ArrayD::<f32>::zeros(shape);
        let result = squeeze_to_3d(data, Path::new("volume.nii"));
        match expected {
            Some(dim) => assert_eq!(result.unwrap().dim(), dim),
            None => assert!(matches!(
                result,
                Err(VolumeError::DimensionalityError { .. })
            )),
        }
    }

    #[test]
    fn test_open_pair_shape_mismatch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = temp_dir.path().join("image.nii.gz");
        let label = temp_dir.path().join("label.nii.gz");
        write_intensity(&image, &ramp((4, 4, 4)));
        write_labels(&label, &cyclic_labels((4, 4, 3), 2));

        let result = VolumePair::open(&image, &label);
        assert!(matches!(
            result,
            Err(VolumeError::ShapeMismatchError { .. })
        ));
    }

    #[test]
    fn test_open_pair() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = temp_dir.path().join("image.nii.gz");
        let label = temp_dir.path().join("label.nii.gz");
        write_intensity(&image, &ramp((4, 4, 4)));
        write_labels(&label, &cyclic_labels((4, 4, 4), 2));

        let pair = VolumePair::open(&image, &label).unwrap();
        assert_eq!(pair.shape(), &[4, 4, 4]);
    }
}
