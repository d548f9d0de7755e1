pub mod patient;
pub mod table;
pub mod volume;

pub use patient::PatientError;
pub use snafu::{Snafu, Whatever};
pub use table::TableError;
pub use volume::VolumeError;

use crate::volume::Shape;

/// A volume does not share the voxel grid of the label map it is paired with.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(display("shape mismatch: expected {:?}, found {:?}", expected, found))]
pub struct ShapeMismatchError {
    pub expected: Shape,
    pub found: Shape,
}
