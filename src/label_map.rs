use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::layout::OutputLayout;
use crate::split::Split;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LabelMapError {
    #[snafu(display("could not open label map {}", path.display()))]
    ReadLabelMap {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("invalid label map {}: {}", path.display(), source))]
    ParseLabelMap {
        path: PathBuf,
        #[snafu(source(from(serde_json::Error, Box::new)))]
        source: Box<serde_json::Error>,
    },

    #[snafu(display("could not write label map {}", path.display()))]
    WriteLabelMap {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("could not serialize label map {}: {}", path.display(), source))]
    SerializeLabelMap {
        path: PathBuf,
        #[snafu(source(from(serde_json::Error, Box::new)))]
        source: Box<serde_json::Error>,
    },
}

/// How pixel values of a label image map to class ids. `scale: 1` means the pixel value
/// is the class id. Any other keys of a caller supplied map are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    pub scale: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl LabelMap {
    pub fn identity() -> Self {
        Self {
            scale: 1,
            extra: Map::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelMapError> {
        let path = path.as_ref();
        let file = File::open(path).context(ReadLabelMapSnafu { path })?;
        serde_json::from_reader(BufReader::new(file)).context(ParseLabelMapSnafu { path })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), LabelMapError> {
        let path = path.as_ref();
        let file = File::create(path).context(WriteLabelMapSnafu { path })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).context(SerializeLabelMapSnafu { path })?;
        writer.flush().context(WriteLabelMapSnafu { path })
    }
}

/// Write the label map manifest of one split, returning its path.
pub fn write_label_map(
    layout: &OutputLayout,
    split: Split,
    label_map: &LabelMap,
) -> Result<PathBuf, LabelMapError> {
    let path = layout.label_map_path(split);
    label_map.write(&path)?;
    tracing::debug!("Wrote {} label map to {}", split, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_identity_serialization() {
        let json = serde_json::to_string(&LabelMap::identity()).unwrap();
        assert_eq!(json, r#"{"scale":1}"#);
    }

    #[rstest]
    #[case::identity(r#"{"scale": 1}"#, 1, 0)]
    #[case::extra_keys(r#"{"scale": 2, "classes": ["bg", "csf", "gm", "wm"]}"#, 2, 1)]
    fn test_from_file(#[case] contents: &str, #[case] scale: u32, #[case] num_extra: usize) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("map.json");
        std::fs::write(&path, contents).unwrap();

        let label_map = LabelMap::from_file(&path).unwrap();
        assert_eq!(label_map.scale, scale);
        assert_eq!(label_map.extra.len(), num_extra);
    }

    #[rstest]
    #[case::missing_scale(r#"{"classes": 4}"#)]
    #[case::fractional_scale(r#"{"scale": 1.5}"#)]
    #[case::not_an_object("[1, 2, 3]")]
    #[case::not_json("scale=1")]
    fn test_from_file_invalid(#[case] contents: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("map.json");
        std::fs::write(&path, contents).unwrap();

        let result = LabelMap::from_file(&path);
        assert!(matches!(result, Err(LabelMapError::ParseLabelMap { .. })));
    }

    #[test]
    fn test_write_label_map_round_trip_keeps_extra_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(temp_dir.path());
        layout.create().unwrap();

        let mut label_map = LabelMap::identity();
        label_map
            .extra
            .insert("ignore".to_string(), Value::from(255));
        let path = write_label_map(&layout, Split::Train, &label_map).unwrap();

        assert_eq!(path, temp_dir.path().join("label_map/train_label_map.json"));
        assert_eq!(LabelMap::from_file(&path).unwrap(), label_map);
    }
}
