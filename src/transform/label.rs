use ndarray::Array2;

use crate::errors::label::{LabelError, OutOfRangeSnafu};

/// Pixel value marking label pixels that take no part in training.
pub const IGNORE_LABEL: u8 = 255;
pub const DEFAULT_NUM_CLASSES: u8 = 4;

/// Validates label planes and passes class ids through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelEncoder {
    num_classes: u8,
    ignore: u8,
}

impl Default for LabelEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_CLASSES)
    }
}

impl LabelEncoder {
    pub fn new(num_classes: u8) -> Self {
        Self {
            num_classes,
            ignore: IGNORE_LABEL,
        }
    }

    pub fn num_classes(&self) -> u8 {
        self.num_classes
    }

    pub fn ignore(&self) -> u8 {
        self.ignore
    }

    pub fn is_valid(&self, value: i32) -> bool {
        (0..self.num_classes as i32).contains(&value) || value == self.ignore as i32
    }

    /// Convert a label plane to 8-bit class ids. Fails on the first pixel outside
    /// `{0..num_classes-1, ignore}`, scanning in row-major order.
    pub fn encode_label(&self, slice: &Array2<i32>) -> Result<Array2<u8>, LabelError> {
        if let Some(((row, col), &value)) =
            slice.indexed_iter().find(|(_, v)| !self.is_valid(**v))
        {
            return OutOfRangeSnafu {
                value,
                row,
                col,
                num_classes: self.num_classes,
                ignore: self.ignore,
            }
            .fail();
        }
        Ok(slice.mapv(|v| v as u8))
    }
}
