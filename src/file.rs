use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::path::{Path, PathBuf};

type IOResult<T> = Result<T, std::io::Error>;

const PROGRESS_TEMPLATE: &str =
    "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})";

pub fn default_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
        pb.set_style(style);
    }
    pb
}

pub fn default_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        spinner.set_style(style);
    }
    spinner
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    match name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(suffix) {
        true => Some(&name[..split]),
        false => None,
    }
}

pub trait VolumeFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has a NIfTI or Analyze extension.
    fn has_volume_extension(&self) -> bool {
        let name = match self.as_ref().file_name() {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => return false,
        };
        [".nii", ".nii.gz", ".hdr", ".img", ".img.gz"]
            .iter()
            .any(|ext| name.ends_with(ext))
    }

    /// For a split header/data volume, the `(header, data)` pair of paths.
    /// Single file volumes return `None`.
    fn paired_files(&self) -> Option<(PathBuf, PathBuf)> {
        let path = self.as_ref();
        let name = path.file_name()?.to_str()?;
        if let Some(stem) = strip_suffix_ignore_case(name, ".hdr") {
            Some((path.to_path_buf(), path.with_file_name(format!("{stem}.img"))))
        } else if let Some(stem) = strip_suffix_ignore_case(name, ".img")
            .or_else(|| strip_suffix_ignore_case(name, ".img.gz"))
        {
            Some((path.with_file_name(format!("{stem}.hdr")), path.to_path_buf()))
        } else {
            None
        }
    }

    /// Every file that must exist for the volume to be readable.
    fn required_files(&self) -> Vec<PathBuf> {
        match self.paired_files() {
            Some((header, data)) => vec![header, data],
            None => vec![self.as_ref().to_path_buf()],
        }
    }

    /// The first required file that does not exist, if any.
    fn first_missing_file(&self) -> Option<PathBuf> {
        self.required_files().into_iter().find(|p| !p.is_file())
    }
}

impl<P: AsRef<Path>> VolumeFileOperations for P {}

pub trait ImageFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has an output image extension.
    fn has_image_extension(&self) -> bool {
        let path = self.as_ref();
        if let Some(ext) = path.extension() {
            return ext == "png" || ext == "tiff" || ext == "tif" || ext == "PNG" || ext == "TIFF";
        }
        false
    }

    /// Find all output images directly inside a directory, sorted by path.
    fn find_images(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let result = std::fs::read_dir(dir)?
            .collect::<IOResult<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.has_image_extension())
            .sorted();
        Ok(result)
    }
}

impl<P: AsRef<Path>> ImageFileOperations for P {}

pub trait DirectoryOperations
where
    Self: AsRef<Path>,
{
    /// Visible subdirectories of a directory, sorted by name.
    fn subdirectories(&self) -> IOResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(self.as_ref())?.collect::<IOResult<Vec<_>>>()?;
        let dirs = entries
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.is_dir())
            .filter(|p| {
                p.file_name()
                    .map(|n| !n.to_string_lossy().starts_with('.'))
                    .unwrap_or(false)
            })
            .sorted()
            .collect();
        Ok(dirs)
    }
}

impl<P: AsRef<Path>> DirectoryOperations for P {}
