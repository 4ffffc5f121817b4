use snafu::Snafu;
use std::fmt;
use std::path::PathBuf;

use crate::errors::{LabelError, VolumeError};
use crate::save::SaveError;

/// Failures that drop a single subject from a run without aborting it
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SubjectError {
    #[snafu(display("subject {} is missing its {} file: {}", subject, role, path.display()))]
    DiscoveryError {
        subject: String,
        role: &'static str,
        path: PathBuf,
    },

    #[snafu(display("subject directory {} is not valid UTF-8", path.display()))]
    InvalidNameError { subject: String, path: PathBuf },

    #[snafu(display("subject {} has an unusable volume: {}", subject, source))]
    FormatError {
        subject: String,
        #[snafu(source(from(VolumeError, Box::new)))]
        source: Box<VolumeError>,
    },

    #[snafu(display("subject {} has an invalid label in slice {}: {}", subject, index, source))]
    LabelRangeError {
        subject: String,
        index: usize,
        source: LabelError,
    },

    #[snafu(display("could not write output for subject {}: {}", subject, source))]
    WriteError {
        subject: String,
        #[snafu(source(from(SaveError, Box::new)))]
        source: Box<SaveError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    Discovery,
    Format,
    LabelRange,
    Write,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason_str = match self {
            SkipReason::Discovery => "missing files",
            SkipReason::Format => "unreadable volume",
            SkipReason::LabelRange => "invalid label",
            SkipReason::Write => "write failure",
        };
        write!(f, "{}", reason_str)
    }
}

impl SubjectError {
    /// Identifier of the subject that was dropped.
    pub fn subject(&self) -> &str {
        match self {
            SubjectError::DiscoveryError { subject, .. }
            | SubjectError::InvalidNameError { subject, .. }
            | SubjectError::FormatError { subject, .. }
            | SubjectError::LabelRangeError { subject, .. }
            | SubjectError::WriteError { subject, .. } => subject,
        }
    }

    pub fn reason(&self) -> SkipReason {
        match self {
            SubjectError::DiscoveryError { .. } | SubjectError::InvalidNameError { .. } => {
                SkipReason::Discovery
            }
            SubjectError::FormatError { .. } => SkipReason::Format,
            SubjectError::LabelRangeError { .. } => SkipReason::LabelRange,
            SubjectError::WriteError { .. } => SkipReason::Write,
        }
    }
}
