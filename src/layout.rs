use snafu::{ensure, ResultExt};
use std::path::{Path, PathBuf};

use crate::errors::convert::{ConvertError, NonEmptyOutputSnafu, OutputSetupSnafu};
use crate::split::Split;

pub const LABEL_MAP_DIR: &str = "label_map";

/// Output directory tree consumed by the segmentation training service:
///
/// ```text
/// <root>/train/<name>.<ext>
/// <root>/validation/<name>.<ext>
/// <root>/train_annotation/<name>.<ext>
/// <root>/validation_annotation/<name>.<ext>
/// <root>/label_map/train_label_map.json
/// <root>/label_map/validation_label_map.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_dir(&self, split: Split) -> PathBuf {
        self.root.join(split.image_dir())
    }

    pub fn annotation_dir(&self, split: Split) -> PathBuf {
        self.root.join(split.annotation_dir())
    }

    pub fn label_map_dir(&self) -> PathBuf {
        self.root.join(LABEL_MAP_DIR)
    }

    pub fn label_map_path(&self, split: Split) -> PathBuf {
        self.label_map_dir().join(split.label_map_filename())
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        Split::ALL
            .iter()
            .flat_map(|&split| [self.image_dir(split), self.annotation_dir(split)])
            .chain(std::iter::once(self.label_map_dir()))
            .collect()
    }

    /// Create every output directory. Failure here leaves nothing useful to produce.
    pub fn create(&self) -> Result<(), ConvertError> {
        for dir in self.directories() {
            std::fs::create_dir_all(&dir).context(OutputSetupSnafu { path: &dir })?;
        }
        Ok(())
    }

    fn slice_directories(&self) -> impl Iterator<Item = PathBuf> + '_ {
        Split::ALL
            .into_iter()
            .flat_map(move |split| [self.image_dir(split), self.annotation_dir(split)])
    }

    /// Remove the image and annotation directories along with any slices from earlier runs.
    pub fn clear(&self) -> Result<(), ConvertError> {
        for dir in self.slice_directories().filter(|dir| dir.is_dir()) {
            tracing::info!("Clearing {}", dir.display());
            std::fs::remove_dir_all(&dir).context(OutputSetupSnafu { path: &dir })?;
        }
        Ok(())
    }

    /// Fail if any image or annotation directory already holds an entry.
    pub fn ensure_empty(&self) -> Result<(), ConvertError> {
        for dir in self.slice_directories() {
            let mut entries = std::fs::read_dir(&dir).context(OutputSetupSnafu { path: &dir })?;
            ensure!(entries.next().is_none(), NonEmptyOutputSnafu { path: &dir });
        }
        Ok(())
    }
}
