use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;
pub const DEFAULT_SEED: u64 = 1984;

// Guards against ratios like 0.8 landing just below an integer boundary.
const ROUNDING_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Validation];

    /// Directory holding the intensity images of this split.
    pub fn image_dir(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
        }
    }

    /// Directory holding the label images of this split.
    pub fn annotation_dir(&self) -> &'static str {
        match self {
            Split::Train => "train_annotation",
            Split::Validation => "validation_annotation",
        }
    }

    pub fn label_map_filename(&self) -> &'static str {
        match self {
            Split::Train => "train_label_map.json",
            Split::Validation => "validation_label_map.json",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.image_dir())
    }
}

/// Number of subjects placed in the training split: `floor(n * ratio)`, so the
/// validation split receives `ceil(n * (1 - ratio))`.
pub fn train_count(num_subjects: usize, ratio: f64) -> usize {
    let ratio = ratio.clamp(0.0, 1.0);
    let count = (num_subjects as f64 * ratio + ROUNDING_EPSILON).floor() as usize;
    count.min(num_subjects)
}

/// Partition whole subjects into training and validation sets.
///
/// Identifiers are sorted and deduplicated before a seeded shuffle, so the result
/// depends only on the set of identifiers, `ratio` and `seed`.
pub fn assign_split<S: AsRef<str>>(
    subject_ids: &[S],
    ratio: f64,
    seed: u64,
) -> BTreeMap<String, Split> {
    let mut ids = subject_ids
        .iter()
        .map(|id| id.as_ref().to_string())
        .sorted()
        .dedup()
        .collect::<Vec<_>>();

    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let num_train = train_count(ids.len(), ratio);
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| {
            let split = if i < num_train {
                Split::Train
            } else {
                Split::Validation
            };
            (id, split)
        })
        .collect()
}
