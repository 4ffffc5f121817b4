pub mod convert;
pub mod errors;
pub mod file;
pub mod label_map;
pub mod layout;
pub mod load;
pub mod manifest;
pub mod report;
pub mod save;
pub mod split;
pub mod subject;
pub mod transform;

pub use convert::*;
pub use transform::*;
