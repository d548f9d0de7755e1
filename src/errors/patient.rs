use itertools::Itertools;
pub use snafu::Snafu;
use std::path::PathBuf;

use crate::errors::{ShapeMismatchError, VolumeError};
use crate::modality::Modality;

/// Reasons a patient produces no rows. Every variant is caught at the
/// per-patient boundary and reported as a skip.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PatientError {
    #[snafu(display("filename does not follow the naming convention: {}", file_name))]
    NamingConvention { file_name: String },

    #[snafu(display(
        "missing modalities for {}: {}",
        patient_id,
        missing.iter().join(", ")
    ))]
    MissingModalities {
        patient_id: String,
        missing: Vec<Modality>,
    },

    #[snafu(display("could not load label map {}: {}", path.display(), source))]
    LoadLabelMap {
        path: PathBuf,
        #[snafu(source(from(VolumeError, Box::new)))]
        source: Box<VolumeError>,
    },

    #[snafu(display("could not load {} volume {}: {}", modality, path.display(), source))]
    LoadModality {
        modality: Modality,
        path: PathBuf,
        #[snafu(source(from(VolumeError, Box::new)))]
        source: Box<VolumeError>,
    },

    #[snafu(display("{} volume does not match the label map: {}", modality, source))]
    ShapeMismatch {
        modality: Modality,
        source: ShapeMismatchError,
    },
}
