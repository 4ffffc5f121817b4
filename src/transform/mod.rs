pub mod intensity;
pub mod label;
pub mod orient;
pub mod slice;

pub use intensity::*;
pub use label::*;
pub use orient::*;
pub use slice::*;

pub trait Transform<T> {
    fn apply(&self, target: &T) -> T;
}
