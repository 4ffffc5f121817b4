pub mod convert;
pub mod label;
pub mod subject;
pub mod volume;

pub use convert::ConvertError;
pub use label::LabelError;
pub use subject::{SkipReason, SubjectError};
pub use volume::VolumeError;
