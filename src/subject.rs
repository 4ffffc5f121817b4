use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use snafu::{ensure, ResultExt};

use crate::errors::convert::{ConvertError, InvalidInputRootSnafu, ReadInputRootSnafu};
use crate::errors::subject::{DiscoverySnafu, InvalidNameSnafu, SubjectError};
use crate::file::{DirectoryOperations, VolumeFileOperations};

/// Replaced by the subject identifier in layout templates.
pub const ID_PLACEHOLDER: &str = "{id}";
pub const DEFAULT_IMAGE_TEMPLATE: &str = "image.nii.gz";
pub const DEFAULT_LABEL_TEMPLATE: &str = "label.nii.gz";

/// Where the intensity and label volumes live inside a subject directory.
/// Both templates are relative paths that may contain `{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectLayout {
    pub image: String,
    pub label: String,
}

impl Default for SubjectLayout {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_TEMPLATE.to_string(),
            label: DEFAULT_LABEL_TEMPLATE.to_string(),
        }
    }
}

impl SubjectLayout {
    pub fn new<S: Into<String>, T: Into<String>>(image: S, label: T) -> Self {
        Self {
            image: image.into(),
            label: label.into(),
        }
    }

    fn resolve(template: &str, dir: &Path, id: &str) -> PathBuf {
        dir.join(template.replace(ID_PLACEHOLDER, id))
    }

    pub fn image_path<P: AsRef<Path>>(&self, dir: P, id: &str) -> PathBuf {
        Self::resolve(&self.image, dir.as_ref(), id)
    }

    pub fn label_path<P: AsRef<Path>>(&self, dir: P, id: &str) -> PathBuf {
        Self::resolve(&self.label, dir.as_ref(), id)
    }
}

/// A subject whose intensity and label volumes were found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: String,
    image: PathBuf,
    label: PathBuf,
}

impl Subject {
    pub fn new<S: Into<String>, P: AsRef<Path>, Q: AsRef<Path>>(id: S, image: P, label: Q) -> Self {
        Self {
            id: id.into(),
            image: image.as_ref().to_path_buf(),
            label: label.as_ref().to_path_buf(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn label(&self) -> &Path {
        &self.label
    }

    /// Build a subject from its directory, failing if any volume file is missing.
    /// The directory name becomes the subject id and must be valid UTF-8.
    pub fn discover<P: AsRef<Path>>(dir: P, layout: &SubjectLayout) -> Result<Self, SubjectError> {
        let dir = dir.as_ref();
        let name = dir.file_name().unwrap_or_default();
        let id = match name.to_str() {
            Some(id) => id.to_string(),
            None => {
                return InvalidNameSnafu {
                    subject: name.to_string_lossy(),
                    path: dir,
                }
                .fail()
            }
        };
        let image = layout.image_path(dir, &id);
        let label = layout.label_path(dir, &id);

        for (role, path) in [("intensity", &image), ("label", &label)] {
            if !path.has_volume_extension() {
                debug!("{} file of {} has an unexpected extension: {}", role, id, path.display());
            }
            if let Some(missing) = path.first_missing_file() {
                return DiscoverySnafu {
                    subject: id,
                    role,
                    path: missing,
                }
                .fail();
            }
        }
        Ok(Self { id, image, label })
    }
}

/// Discover every subject directory under `input_root`, ordered by identifier.
///
/// Subjects missing a volume are returned as `DiscoveryError`s, so callers can skip
/// them without aborting. Only an unreadable input root is an error of the whole call.
pub fn enumerate_subjects<P: AsRef<Path>>(
    input_root: P,
    layout: &SubjectLayout,
) -> Result<Vec<Result<Subject, SubjectError>>, ConvertError> {
    let input_root = input_root.as_ref();
    ensure!(
        input_root.is_dir(),
        InvalidInputRootSnafu { path: input_root }
    );
    let dirs = input_root
        .subdirectories()
        .context(ReadInputRootSnafu { path: input_root })?;

    let subjects = dirs
        .into_iter()
        .map(|dir| Subject::discover(&dir, layout))
        .inspect(|result| {
            if let Err(e) = result {
                warn!("Skipping subject: {}", e);
            }
        })
        .collect();
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"volume").unwrap();
    }

    #[rstest]
    #[case::fixed("image.nii.gz", "label.nii.gz", "image.nii.gz", "label.nii.gz")]
    #[case::templated(
        "{id}_t1.nii",
        "seg/{id}_seg.nii",
        "OAS1_0001_t1.nii",
        "seg/OAS1_0001_seg.nii"
    )]
    fn test_layout(
        #[case] image_template: &str,
        #[case] label_template: &str,
        #[case] expected_image: &str,
        #[case] expected_label: &str,
    ) {
        let layout = SubjectLayout::new(image_template, label_template);
        let dir = Path::new("root/OAS1_0001");
        assert_eq!(layout.image_path(dir, "OAS1_0001"), dir.join(expected_image));
        assert_eq!(layout.label_path(dir, "OAS1_0001"), dir.join(expected_label));
    }

    #[test]
    fn test_enumerate_subjects() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let layout = SubjectLayout::default();

        for id in ["s02", "s01", "s03"] {
            touch(&layout.image_path(root.join(id), id));
        }
        touch(&layout.label_path(root.join("s01"), "s01"));
        touch(&layout.label_path(root.join("s02"), "s02"));
        fs::write(root.join("README.txt"), b"not a subject").unwrap();

        let subjects = enumerate_subjects(root, &layout).unwrap();
        assert_eq!(subjects.len(), 3);

        let ids: Vec<_> = subjects
            .iter()
            .map(|r| match r {
                Ok(s) => s.id().to_string(),
                Err(e) => e.subject().to_string(),
            })
            .collect();
        assert_eq!(ids, vec!["s01", "s02", "s03"]);

        assert!(subjects[0].is_ok());
        assert!(subjects[1].is_ok());
        match &subjects[2] {
            Err(SubjectError::DiscoveryError { subject, role, path }) => {
                assert_eq!(subject, "s03");
                assert_eq!(*role, "label");
                assert_eq!(path, &root.join("s03").join("label.nii.gz"));
            }
            other => panic!("expected discovery error, got {other:?}"),
        }
    }

    #[test]
    fn test_discover_analyze_pair() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("OAS1_0042");
        let layout = SubjectLayout::new("{id}_t88_gfc.img", "{id}_seg.img");
        touch(&dir.join("OAS1_0042_t88_gfc.img"));
        touch(&dir.join("OAS1_0042_t88_gfc.hdr"));
        touch(&dir.join("OAS1_0042_seg.img"));

        let result = Subject::discover(&dir, &layout);
        match result {
            Err(SubjectError::DiscoveryError { role, path, .. }) => {
                assert_eq!(role, "label");
                assert_eq!(path, dir.join("OAS1_0042_seg.hdr"));
            }
            other => panic!("expected discovery error, got {other:?}"),
        }

        touch(&dir.join("OAS1_0042_seg.hdr"));
        let subject = Subject::discover(&dir, &layout).unwrap();
        assert_eq!(subject.id(), "OAS1_0042");
        assert_eq!(subject.image(), dir.join("OAS1_0042_t88_gfc.img"));
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_subjects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let layout = SubjectLayout::default();
        for name in [&b"s\xfe"[..], &b"s\xff"[..], &b"s01"[..]] {
            let dir = root.join(OsStr::from_bytes(name));
            touch(&dir.join(DEFAULT_IMAGE_TEMPLATE));
            touch(&dir.join(DEFAULT_LABEL_TEMPLATE));
        }

        let subjects = enumerate_subjects(root, &layout).unwrap();
        assert_eq!(subjects.len(), 3);
        let ids: Vec<_> = subjects
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, vec!["s01"]);
        for result in subjects.iter().filter(|r| r.is_err()) {
            match result {
                Err(e @ SubjectError::InvalidNameError { .. }) => {
                    assert_eq!(e.reason(), crate::errors::SkipReason::Discovery)
                }
                other => panic!("expected invalid name error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_enumerate_subjects_invalid_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = enumerate_subjects(temp_dir.path().join("missing"), &SubjectLayout::default());
        assert!(matches!(result, Err(ConvertError::InvalidInputRoot { .. })));
    }
}
