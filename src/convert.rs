use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use ndarray::Array2;
use rayon::prelude::*;
use snafu::{ensure, Report, ResultExt};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::convert::{ConvertError, InvalidConfigSnafu, WriteLabelMapSnafu};
use crate::errors::subject::{FormatSnafu, LabelRangeSnafu, SubjectError, WriteSnafu};
use crate::file::default_bar;
use crate::label_map::{write_label_map, LabelMap};
use crate::layout::OutputLayout;
use crate::load::VolumePair;
use crate::report::{ProcessedSubject, RunReport};
use crate::save::{file_stem, OutputFormat, SliceSaver, SupportedCompressor, WrittenPair};
use crate::split::{assign_split, Split, DEFAULT_SEED, DEFAULT_TRAIN_RATIO};
use crate::subject::{enumerate_subjects, Subject, SubjectLayout};
use crate::transform::{
    extract_slice, normalize_intensity, LabelEncoder, NormalizationPolicy, Orientation,
    SliceAxis, SliceSelection, Transform, DEFAULT_NUM_CLASSES,
};

/// Everything that controls a conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
    pub subject_layout: SubjectLayout,
    pub axis: SliceAxis,
    pub selection: SliceSelection,
    pub orientation: Orientation,
    pub normalization: NormalizationPolicy,
    pub num_classes: u8,
    pub train_ratio: f64,
    pub seed: u64,
    pub format: OutputFormat,
    pub compressor: SupportedCompressor,
    pub label_map: LabelMap,
    /// Clear existing image and annotation files from the output root before writing
    pub overwrite: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            subject_layout: SubjectLayout::default(),
            axis: SliceAxis::default(),
            selection: SliceSelection::default(),
            orientation: Orientation::default(),
            normalization: NormalizationPolicy::default(),
            num_classes: DEFAULT_NUM_CLASSES,
            train_ratio: DEFAULT_TRAIN_RATIO,
            seed: DEFAULT_SEED,
            format: OutputFormat::default(),
            compressor: SupportedCompressor::default(),
            label_map: LabelMap::default(),
            overwrite: false,
        }
    }
}

impl ConverterConfig {
    pub fn validate(&self) -> Result<(), ConvertError> {
        ensure!(
            (0.0..=1.0).contains(&self.train_ratio),
            InvalidConfigSnafu {
                message: format!("train ratio must be in [0, 1], got {}", self.train_ratio),
            }
        );
        ensure!(
            self.num_classes > 0,
            InvalidConfigSnafu {
                message: "number of classes must be at least 1",
            }
        );
        if let SliceSelection::Strided { step, .. } = self.selection {
            ensure!(
                step > 0,
                InvalidConfigSnafu {
                    message: "slice stride must be at least 1",
                }
            );
        }
        if let NormalizationPolicy::Fixed(window) = self.normalization {
            ensure!(
                window.min.is_finite() && window.max.is_finite() && window.min < window.max,
                InvalidConfigSnafu {
                    message: format!(
                        "intensity window must satisfy min < max, got [{}, {}]",
                        window.min, window.max
                    ),
                }
            );
        }
        for template in [&self.subject_layout.image, &self.subject_layout.label] {
            ensure!(
                !template.is_empty() && Path::new(template).is_relative(),
                InvalidConfigSnafu {
                    message: format!("volume template must be a relative path, got {:?}", template),
                }
            );
        }
        Ok(())
    }
}

/// One oriented plane of a subject, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSlice {
    /// Plane index along the slice axis, kept only when a subject yields several planes
    pub index: Option<usize>,
    pub image: Array2<u8>,
    pub label: Array2<u8>,
}

/// A subject whose slices passed every check and only remain to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSubject {
    pub id: String,
    pub slices: Vec<PreparedSlice>,
}

#[derive(Debug, Clone)]
pub struct Converter {
    config: ConverterConfig,
    encoder: LabelEncoder,
    saver: SliceSaver,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            encoder: LabelEncoder::new(config.num_classes),
            saver: SliceSaver::new(config.format, config.compressor),
            config,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Load a subject's volumes and turn the selected planes into 8-bit slice pairs.
    pub fn prepare_subject(&self, subject: &Subject) -> Result<PreparedSubject, SubjectError> {
        let id = subject.id();
        let pair = VolumePair::open(subject.image(), subject.label())
            .context(FormatSnafu { subject: id })?;

        let axis = self.config.axis;
        let length = pair.image.len_of(axis.as_axis());
        let indices = self
            .config
            .selection
            .indices(axis, length)
            .context(FormatSnafu { subject: id })?;
        let window = self.config.normalization.resolve(&pair.image);
        debug!(
            "Subject {} has shape {:?}, taking {} planes along {}",
            id,
            pair.shape(),
            indices.len(),
            axis
        );

        let slices = indices
            .into_iter()
            .map(|index| {
                let image = extract_slice(&pair.image, axis, index)
                    .context(FormatSnafu { subject: id })?;
                let label = extract_slice(&pair.label, axis, index)
                    .context(FormatSnafu { subject: id })?;
                let image = self.config.orientation.apply(&image);
                let label = self.config.orientation.apply(&label);

                let window = self.config.normalization.window_for(window, &image);
                let label = self
                    .encoder
                    .encode_label(&label)
                    .context(LabelRangeSnafu { subject: id, index })?;
                Ok(PreparedSlice {
                    index: (!self.config.selection.is_single()).then_some(index),
                    image: normalize_intensity(&image, &window),
                    label,
                })
            })
            .collect::<Result<Vec<_>, SubjectError>>()?;

        Ok(PreparedSubject {
            id: id.to_string(),
            slices,
        })
    }

    /// Write every slice pair of a prepared subject into `split`. If any pair fails, the
    /// pairs already written for the subject are removed again.
    pub fn write_subject(
        &self,
        layout: &OutputLayout,
        subject: &PreparedSubject,
        split: Split,
    ) -> Result<ProcessedSubject, SubjectError> {
        let mut files = Vec::with_capacity(subject.slices.len());
        for slice in subject.slices.iter() {
            let stem = file_stem(&subject.id, slice.index);
            match self
                .saver
                .write_pair(layout, &stem, &slice.image, &slice.label, split)
            {
                Ok(pair) => files.push(pair),
                Err(e) => {
                    files.iter().for_each(WrittenPair::remove);
                    return Err(e).context(WriteSnafu {
                        subject: &subject.id,
                    });
                }
            }
        }
        Ok(ProcessedSubject {
            id: subject.id.clone(),
            split,
            files,
        })
    }

    /// Convert every subject under `input_root` into the training layout under `output_root`.
    ///
    /// Subjects that cannot be discovered, read or written are skipped and listed in the
    /// returned report. Only an unusable input root or output tree aborts the run. An output
    /// root that already holds slices is rejected unless `overwrite` is set.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_root: P,
        output_root: Q,
    ) -> Result<RunReport, ConvertError> {
        let layout = OutputLayout::new(output_root);
        if self.config.overwrite {
            layout.clear()?;
        }
        layout.create()?;
        layout.ensure_empty()?;
        let label_maps = Split::ALL
            .iter()
            .map(|&split| write_label_map(&layout, split, &self.config.label_map))
            .collect::<Result<Vec<_>, _>>()
            .context(WriteLabelMapSnafu)?;

        let (subjects, mut skipped): (Vec<_>, Vec<_>) =
            enumerate_subjects(input_root.as_ref(), &self.config.subject_layout)?
                .into_iter()
                .partition_result();
        info!(
            "Found {} subjects ({} incomplete)",
            subjects.len() + skipped.len(),
            skipped.len()
        );

        let pb = default_bar(subjects.len() as u64);
        pb.set_message("Preparing slices");
        let (prepared, failed): (Vec<_>, Vec<_>) = subjects
            .par_iter()
            .progress_with(pb)
            .map(|subject| self.prepare_subject(subject).inspect_err(log_skip))
            .collect::<Vec<_>>()
            .into_iter()
            .partition_result();
        skipped.extend(failed);

        let ids = prepared.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        let mut splits = assign_split(&ids, self.config.train_ratio, self.config.seed);
        let assigned = prepared
            .into_iter()
            .filter_map(|subject| splits.remove(&subject.id).map(|split| (subject, split)))
            .collect::<Vec<_>>();

        let pb = default_bar(assigned.len() as u64);
        pb.set_message("Writing slices");
        let (processed, failed): (Vec<_>, Vec<_>) = assigned
            .par_iter()
            .progress_with(pb)
            .map(|(subject, split)| {
                self.write_subject(&layout, subject, *split)
                    .inspect_err(log_skip)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .partition_result();
        skipped.extend(failed);

        let report = RunReport::new(processed, skipped, label_maps);
        info!(
            "Wrote {} train and {} validation subjects",
            report.num_subjects(Split::Train),
            report.num_subjects(Split::Validation)
        );
        Ok(report)
    }
}

fn log_skip(e: &SubjectError) {
    warn!("Skipping subject: {}", Report::from_error(e));
}
