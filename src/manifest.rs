use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::path::{Path, PathBuf};

use crate::file::{default_bar, default_spinner, ImageFileOperations};
use crate::layout::OutputLayout;
use crate::split::Split;

type IOResult<T> = Result<T, std::io::Error>;

/// One image/annotation pair of a produced output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    split: Split,
    name: String,
    image: PathBuf,
    annotation: PathBuf,
    dimensions: Option<(u32, u32)>,
}

impl ManifestEntry {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(split: Split, image: P, annotation: Q) -> Self {
        let image = image.as_ref().to_path_buf();
        let name = image
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            split,
            name,
            image,
            annotation: annotation.as_ref().to_path_buf(),
            dimensions: None,
        }
    }

    /// Read the pixel dimensions of the image from its header.
    pub fn with_dimensions(mut self) -> Self {
        self.dimensions = image::image_dimensions(&self.image).ok();
        self
    }

    pub fn split(&self) -> Split {
        self.split
    }

    /// Base name shared by the image and its annotation
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn annotation(&self) -> &Path {
        &self.annotation
    }

    /// `(width, height)` of the image, when it could be read.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.map(|(w, _)| w).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.dimensions.map(|(_, h)| h).unwrap_or(0)
    }

    /// Path of `path` relative to `root`, or `path` itself when it lies elsewhere.
    pub fn relative_path<'a, P: AsRef<Path>>(path: &'a Path, root: P) -> &'a Path {
        path.strip_prefix(root.as_ref()).unwrap_or(path)
    }
}

/// Pair every image of a split with its annotation. Images without an annotation are
/// left out with a warning.
fn split_pairs(layout: &OutputLayout, split: Split) -> IOResult<Vec<ManifestEntry>> {
    let image_dir = layout.image_dir(split);
    if !image_dir.is_dir() {
        tracing::warn!("Missing {} directory {}", split, image_dir.display());
        return Ok(Vec::new());
    }
    let annotation_dir = layout.annotation_dir(split);
    let entries = image_dir
        .find_images()?
        .filter_map(|image| {
            let annotation = annotation_dir.join(image.file_name()?);
            if annotation.is_file() {
                Some(ManifestEntry::new(split, &image, annotation))
            } else {
                tracing::warn!("No annotation for {}", image.display());
                None
            }
        })
        .collect();
    Ok(entries)
}

fn all_pairs<P: AsRef<Path>>(root: P) -> IOResult<Vec<ManifestEntry>> {
    let layout = OutputLayout::new(root);
    let mut entries = Vec::new();
    for split in Split::ALL {
        entries.extend(split_pairs(&layout, split)?);
    }
    Ok(entries)
}

/// Builds a manifest from an output root laid out as
/// `{root}/{split}/{name}.{ext}` and `{root}/{split}_annotation/{name}.{ext}`
pub fn get_manifest<P: AsRef<Path>>(root: P) -> IOResult<Vec<ManifestEntry>> {
    let manifest = all_pairs(root)?
        .into_par_iter()
        .map(ManifestEntry::with_dimensions)
        .collect::<Vec<_>>();
    Ok(manifest)
}

/// Builds a manifest with progress indicators, sorted by split and name.
pub fn get_manifest_with_progress<P: AsRef<Path>>(root: P) -> IOResult<Vec<ManifestEntry>> {
    let spinner = default_spinner();
    spinner.set_message("Searching for image pairs");
    let pairs = all_pairs(root)?;
    spinner.finish_with_message(format!("Found {} image pairs", pairs.len()));

    let bar = default_bar(pairs.len() as u64);
    bar.set_message("Reading image dimensions");
    let manifest = pairs
        .into_par_iter()
        .progress_with(bar)
        .map(ManifestEntry::with_dimensions)
        .collect::<Vec<_>>()
        .into_iter()
        .sorted_by(|a, b| a.split().cmp(&b.split()).then(a.name().cmp(b.name())))
        .collect();
    Ok(manifest)
}
