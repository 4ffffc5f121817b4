pub use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum LabelError {
    #[snafu(display(
        "label value {} at (row={}, col={}) is outside 0..{} and is not the ignore value {}",
        value,
        row,
        col,
        num_classes,
        ignore
    ))]
    OutOfRangeError {
        value: i32,
        row: usize,
        col: usize,
        num_classes: u8,
        ignore: u8,
    },
}
