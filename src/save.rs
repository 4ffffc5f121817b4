use image::{GrayImage, ImageError};
use ndarray::Array2;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tiff::encoder::colortype::Gray8;
use tiff::encoder::compression::{Compression, Lzw, Packbits, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::TiffError;

use crate::layout::OutputLayout;
use crate::split::Split;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SaveError {
    #[snafu(display("could not create file {}", path.display()))]
    CreateFile {
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
        path: PathBuf,
    },
    #[snafu(display("could not open TIFF file {}", path.display()))]
    OpenTiff {
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
        path: PathBuf,
    },
    #[snafu(display("could not write TIFF file {}", path.display()))]
    WriteToTiff {
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
        path: PathBuf,
    },
    #[snafu(display("could not write image {}", path.display()))]
    WriteImage {
        #[snafu(source(from(ImageError, Box::new)))]
        source: Box<ImageError>,
        path: PathBuf,
    },
    #[snafu(display("slice of shape {:?} does not fit an 8-bit image", shape))]
    InvalidShape { shape: Vec<usize> },
    #[snafu(display(
        "image slice {:?} and label slice {:?} differ in shape",
        image,
        label
    ))]
    DimensionMismatch { image: Vec<usize>, label: Vec<usize> },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, Default, PartialEq, Eq)]
pub enum SupportedCompressor {
    #[default]
    Packbits,
    Lzw,
    Uncompressed,
}

impl fmt::Display for SupportedCompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compressor_str = match self {
            SupportedCompressor::Packbits => "packbits",
            SupportedCompressor::Lzw => "lzw",
            SupportedCompressor::Uncompressed => "uncompressed",
        };
        write!(f, "{}", compressor_str)
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Png,
    Tiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Base name shared by an image and its annotation. Multi-slice subjects carry the slice index.
pub fn file_stem(subject_id: &str, index: Option<usize>) -> String {
    match index {
        Some(index) => format!("{}_{}", subject_id, index),
        None => subject_id.to_string(),
    }
}

/// Paths of one written image/annotation pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPair {
    pub image: PathBuf,
    pub label: PathBuf,
}

impl WrittenPair {
    /// Delete both files of the pair, logging any file that could not be removed.
    pub fn remove(&self) {
        for path in [&self.image, &self.label] {
            remove_written(path);
        }
    }
}

fn remove_written(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
    }
}

fn to_gray_image(data: &Array2<u8>) -> Result<GrayImage, SaveError> {
    let (rows, cols) = data.dim();
    let shape = || InvalidShapeSnafu {
        shape: vec![rows, cols],
    };
    let width = u32::try_from(cols).ok().context(shape())?;
    let height = u32::try_from(rows).ok().context(shape())?;
    ensure!(width > 0 && height > 0, shape());
    // Logical iteration order is row-major regardless of memory layout
    let raw = data.iter().copied().collect::<Vec<_>>();
    GrayImage::from_raw(width, height, raw).context(shape())
}

fn write_tiff<D: Compression>(
    image: &GrayImage,
    path: &Path,
    compression: D,
) -> Result<(), SaveError> {
    let file = File::create(path).context(CreateFileSnafu { path })?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).context(OpenTiffSnafu { path })?;
    let tiff = encoder
        .new_image_with_compression::<Gray8, _>(image.width(), image.height(), compression)
        .context(WriteToTiffSnafu { path })?;
    tiff.write_data(image.as_raw())
        .context(WriteToTiffSnafu { path })?;
    Ok(())
}

/// Writes 8-bit single channel slices as PNG or TIFF files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSaver {
    pub format: OutputFormat,
    pub compressor: SupportedCompressor,
}

impl SliceSaver {
    pub fn new(format: OutputFormat, compressor: SupportedCompressor) -> Self {
        Self { format, compressor }
    }

    pub fn filename(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.format.extension())
    }

    pub fn save<P: AsRef<Path>>(&self, data: &Array2<u8>, path: P) -> Result<(), SaveError> {
        let path = path.as_ref();
        let image = to_gray_image(data)?;
        match (self.format, self.compressor) {
            (OutputFormat::Png, _) => image
                .save_with_format(path, image::ImageFormat::Png)
                .context(WriteImageSnafu { path }),
            (OutputFormat::Tiff, SupportedCompressor::Packbits) => {
                write_tiff(&image, path, Packbits)
            }
            (OutputFormat::Tiff, SupportedCompressor::Lzw) => write_tiff(&image, path, Lzw),
            (OutputFormat::Tiff, SupportedCompressor::Uncompressed) => {
                write_tiff(&image, path, Uncompressed)
            }
        }
    }

    /// Write an intensity slice and its label slice under the same base name into the
    /// image and annotation directories of `split`.
    pub fn write_pair(
        &self,
        layout: &OutputLayout,
        stem: &str,
        image: &Array2<u8>,
        label: &Array2<u8>,
        split: Split,
    ) -> Result<WrittenPair, SaveError> {
        ensure!(
            image.dim() == label.dim(),
            DimensionMismatchSnafu {
                image: image.shape().to_vec(),
                label: label.shape().to_vec(),
            }
        );
        let filename = self.filename(stem);
        let pair = WrittenPair {
            image: layout.image_dir(split).join(&filename),
            label: layout.annotation_dir(split).join(&filename),
        };
        self.save(image, &pair.image)?;
        if let Err(e) = self.save(label, &pair.label) {
            pair.remove();
            return Err(e);
        }
        tracing::debug!("Wrote {} to {}", stem, pair.image.display());
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;
    use std::io::BufReader;
    use tiff::decoder::{Decoder, DecodingResult};

    fn slice() -> Array2<u8> {
        array![[0, 1, 2], [3, 4, 255]]
    }

    #[rstest]
    #[case::subject("OAS1_0001", None, "OAS1_0001")]
    #[case::strided("OAS1_0001", Some(17), "OAS1_0001_17")]
    fn test_file_stem(#[case] id: &str, #[case] index: Option<usize>, #[case] expected: &str) {
        assert_eq!(file_stem(id, index), expected);
    }

    #[test]
    fn test_to_gray_image_orientation() {
        let image = to_gray_image(&slice()).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [255]);
        assert_eq!(image.get_pixel(0, 1).0, [3]);
    }

    #[test]
    fn test_to_gray_image_non_standard_layout() {
        let transposed = slice().reversed_axes();
        let image = to_gray_image(&transposed).unwrap();
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.get_pixel(1, 2).0, [255]);
        assert_eq!(image.get_pixel(1, 0).0, [3]);
    }

    #[test]
    fn test_to_gray_image_empty() {
        let empty = Array2::<u8>::zeros((0, 4));
        assert!(matches!(
            to_gray_image(&empty),
            Err(SaveError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_save_png() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("slice.png");
        SliceSaver::default().save(&slice(), &path).unwrap();

        let decoded = image::open(&path).unwrap().into_luma8();
        assert_eq!(decoded, to_gray_image(&slice()).unwrap());
    }

    #[rstest]
    #[case::packbits(SupportedCompressor::Packbits)]
    #[case::lzw(SupportedCompressor::Lzw)]
    #[case::uncompressed(SupportedCompressor::Uncompressed)]
    fn test_save_tiff(#[case] compressor: SupportedCompressor) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("slice.tiff");
        SliceSaver::new(OutputFormat::Tiff, compressor)
            .save(&slice(), &path)
            .unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));
        match decoder.read_image().unwrap() {
            DecodingResult::U8(data) => assert_eq!(data, vec![0, 1, 2, 3, 4, 255]),
            other => panic!("unexpected TIFF data {:?}", other),
        }
    }

    #[rstest]
    #[case::png(OutputFormat::Png, "png")]
    #[case::tiff(OutputFormat::Tiff, "tiff")]
    fn test_write_pair(#[case] format: OutputFormat, #[case] extension: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(temp_dir.path());
        layout.create().unwrap();

        let saver = SliceSaver::new(format, SupportedCompressor::default());
        let pair = saver
            .write_pair(&layout, "s01", &slice(), &slice(), Split::Validation)
            .unwrap();

        let filename = format!("s01.{}", extension);
        assert_eq!(pair.image, temp_dir.path().join("validation").join(&filename));
        assert_eq!(
            pair.label,
            temp_dir.path().join("validation_annotation").join(&filename)
        );
        assert_eq!(
            image::image_dimensions(&pair.image).unwrap(),
            image::image_dimensions(&pair.label).unwrap()
        );
    }

    #[test]
    fn test_write_pair_dimension_mismatch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(temp_dir.path());
        layout.create().unwrap();

        let label = Array2::<u8>::zeros((3, 3));
        let result =
            SliceSaver::default().write_pair(&layout, "s01", &slice(), &label, Split::Train);
        assert!(matches!(result, Err(SaveError::DimensionMismatch { .. })));
        assert!(!temp_dir.path().join("train/s01.png").exists());
    }

    #[test]
    fn test_write_pair_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(temp_dir.path().join("not_created"));
        let result =
            SliceSaver::default().write_pair(&layout, "s01", &slice(), &slice(), Split::Train);
        assert!(matches!(result, Err(SaveError::WriteImage { .. })));
    }

    #[rstest]
    #[case::png(OutputFormat::Png)]
    #[case::tiff(OutputFormat::Tiff)]
    fn test_write_pair_removes_image_when_label_fails(#[case] format: OutputFormat) {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(temp_dir.path());
        layout.create().unwrap();
        let annotation_dir = layout.annotation_dir(Split::Train);
        std::fs::remove_dir(&annotation_dir).unwrap();
        std::fs::write(&annotation_dir, "not a directory").unwrap();

        let saver = SliceSaver::new(format, SupportedCompressor::default());
        let result = saver.write_pair(&layout, "s01", &slice(), &slice(), Split::Train);
        assert!(result.is_err());
        assert_eq!(
            std::fs::read_dir(layout.image_dir(Split::Train))
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_written_pair_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pair = WrittenPair {
            image: temp_dir.path().join("a.png"),
            label: temp_dir.path().join("missing.png"),
        };
        std::fs::write(&pair.image, "x").unwrap();
        pair.remove();
        assert!(!pair.image.exists());
    }
}
