use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::errors::{SkipReason, SubjectError};
use crate::save::WrittenPair;
use crate::split::Split;

/// A subject whose slices were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedSubject {
    pub id: String,
    pub split: Split,
    pub files: Vec<WrittenPair>,
}

/// Outcome of a conversion run. Subjects in both lists are ordered by identifier.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: Vec<ProcessedSubject>,
    pub skipped: Vec<SubjectError>,
    pub label_maps: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(
        mut processed: Vec<ProcessedSubject>,
        mut skipped: Vec<SubjectError>,
        label_maps: Vec<PathBuf>,
    ) -> Self {
        processed.sort_by(|a, b| a.id.cmp(&b.id));
        skipped.sort_by(|a, b| a.subject().cmp(b.subject()));
        Self {
            processed,
            skipped,
            label_maps,
        }
    }

    pub fn num_processed(&self) -> usize {
        self.processed.len()
    }

    pub fn num_skipped(&self) -> usize {
        self.skipped.len()
    }

    /// True when no subject was dropped.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn split_of(&self, subject: &str) -> Option<Split> {
        self.processed
            .iter()
            .find(|p| p.id == subject)
            .map(|p| p.split)
    }

    pub fn subjects_in(&self, split: Split) -> impl Iterator<Item = &ProcessedSubject> {
        self.processed.iter().filter(move |p| p.split == split)
    }

    pub fn num_subjects(&self, split: Split) -> usize {
        self.subjects_in(split).count()
    }

    /// Number of image/annotation pairs written to `split`.
    pub fn num_pairs(&self, split: Split) -> usize {
        self.subjects_in(split).map(|p| p.files.len()).sum()
    }

    pub fn skipped_by_reason(&self) -> BTreeMap<SkipReason, usize> {
        self.skipped
            .iter()
            .map(|e| e.reason())
            .counts()
            .into_iter()
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} subjects, skipped {}",
            self.num_processed(),
            self.num_skipped()
        )?;
        for split in Split::ALL {
            writeln!(
                f,
                "  {}: {} subjects, {} image pairs",
                split,
                self.num_subjects(split),
                self.num_pairs(split)
            )?;
        }
        for (reason, count) in self.skipped_by_reason() {
            writeln!(f, "  skipped for {}: {}", reason, count)?;
        }
        for error in self.skipped.iter() {
            writeln!(f, "    {}", error)?;
        }
        Ok(())
    }
}
