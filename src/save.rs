use nifti::writer::WriterOptions;
use nifti::{NiftiError, NiftiHeader};
use snafu::{ResultExt, Snafu};
use std::path::{Path, PathBuf};

use crate::volume::{LabelMap, Spacing, Volume};

#[derive(Debug, Snafu)]
pub enum SaveError {
    #[snafu(display("could not write NIfTI file {}", path.display()))]
    WriteNifti {
        path: PathBuf,
        #[snafu(source(from(NiftiError, Box::new)))]
        source: Box<NiftiError>,
    },
}

/// Header template carrying the voxel spacing. Dimensions and data type are
/// filled in by the writer.
fn reference_header(spacing: Spacing) -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.pixdim = [
        1.0,
        spacing.x() as f32,
        spacing.y() as f32,
        spacing.z() as f32,
        1.0,
        1.0,
        1.0,
        1.0,
    ];
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header
}

/// Write an intensity volume as 64-bit float NIfTI. A `.gz` suffix selects compression.
pub fn save_volume<P: AsRef<Path>>(path: P, volume: &Volume) -> Result<(), SaveError> {
    let path = path.as_ref();
    let header = reference_header(volume.spacing());
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(volume.data())
        .context(WriteNiftiSnafu { path })
}

/// Write a label map as 32-bit integer NIfTI. A `.gz` suffix selects compression.
pub fn save_label_map<P: AsRef<Path>>(path: P, labels: &LabelMap) -> Result<(), SaveError> {
    let path = path.as_ref();
    let header = reference_header(labels.spacing());
    let data = labels.data().mapv(|v| v as i32);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&data)
        .context(WriteNiftiSnafu { path })
}
