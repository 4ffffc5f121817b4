use snafu::Snafu;
use std::path::PathBuf;

use crate::label_map::LabelMapError;

/// Errors that abort a whole run
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConvertError {
    #[snafu(display("invalid input root: {}", path.display()))]
    InvalidInputRoot { path: PathBuf },

    #[snafu(display("could not list input root {}", path.display()))]
    ReadInputRoot {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("could not create output directory {}", path.display()))]
    OutputSetupError {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display(
        "output directory {} already contains files, pass --overwrite to replace them",
        path.display()
    ))]
    NonEmptyOutput { path: PathBuf },

    #[snafu(display("could not write label map: {}", source))]
    WriteLabelMap {
        #[snafu(source(from(LabelMapError, Box::new)))]
        source: Box<LabelMapError>,
    },

    #[snafu(display("invalid configuration: {}", message))]
    InvalidConfig { message: String },
}
