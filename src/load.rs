use clap::ValueEnum;
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use snafu::{ensure, OptionExt, ResultExt};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::errors::volume::{
    DimensionalitySnafu, InvalidGzipSnafu, IoSnafu, MissingSpacingSnafu, NonIntegerLabelSnafu,
    NotFoundSnafu, ReadSnafu, UnsupportedFormatSnafu,
};
use crate::errors::VolumeError;
use crate::file::VolumeFileOperations;
use crate::volume::{LabelMap, Spacing, Volume};

/// Volume file kinds this crate can read, selected by filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum VolumeFormat {
    /// Gzip-compressed NIfTI-1 (`.nii.gz`)
    #[default]
    #[value(name = "nii-gz")]
    NiftiGz,
    /// Uncompressed NIfTI-1 (`.nii`)
    #[value(name = "nii")]
    Nifti,
}

impl VolumeFormat {
    /// Filename suffix, including the leading dot
    pub fn suffix(&self) -> &'static str {
        match self {
            VolumeFormat::NiftiGz => ".nii.gz",
            VolumeFormat::Nifti => ".nii",
        }
    }

    /// Determine the format of a path from its filename suffix.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?;
        [VolumeFormat::NiftiGz, VolumeFormat::Nifti]
            .into_iter()
            .find(|format| format.matches(name))
    }

    /// Check if a filename carries this format's suffix.
    pub fn matches(&self, file_name: &str) -> bool {
        self.strip_suffix(file_name).is_some()
    }

    /// The filename without this format's suffix, if it has one and something remains.
    pub fn strip_suffix<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_suffix(self.suffix())
            .filter(|stem| !stem.is_empty())
    }

    pub fn reader(&self) -> NiftiReader {
        NiftiReader {
            compressed: matches!(self, VolumeFormat::NiftiGz),
        }
    }
}

impl fmt::Display for VolumeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format_str = match self {
            VolumeFormat::NiftiGz => "nii-gz",
            VolumeFormat::Nifti => "nii",
        };
        write!(f, "{}", format_str)
    }
}

/// Capability of reading one file kind into a [`Volume`].
pub trait ReadVolume {
    fn read_volume(&self, path: &Path) -> Result<Volume, VolumeError>;
}

/// Reads NIfTI-1 images. Intensities are returned as f64 with the header's
/// scaling applied.
#[derive(Debug, Clone, Copy)]
pub struct NiftiReader {
    compressed: bool,
}

impl ReadVolume for NiftiReader {
    fn read_volume(&self, path: &Path) -> Result<Volume, VolumeError> {
        if self.compressed {
            let is_gzip = path.has_gzip_magic().context(IoSnafu { path })?;
            ensure!(is_gzip, InvalidGzipSnafu { path });
        }

        let object = ReaderOptions::new()
            .read_file(path)
            .context(ReadSnafu { path })?;
        let spacing = header_spacing(object.header()).context(MissingSpacingSnafu {
            path,
            pixdim: pixdim(object.header()),
        })?;

        let data: ArrayD<f64> = object
            .into_volume()
            .into_ndarray::<f64>()
            .context(ReadSnafu { path })?;
        let shape = data.shape().to_vec();
        let data = into_array3(data).context(DimensionalitySnafu { path, shape })?;

        debug!(
            "Loaded {} with shape {:?} and spacing {:?}",
            path.display(),
            data.dim(),
            spacing
        );
        Ok(Volume::new(data, spacing))
    }
}

fn pixdim(header: &NiftiHeader) -> [f32; 3] {
    let [_, x, y, z, ..] = header.pixdim;
    [x, y, z]
}

/// Voxel spacing from the header's `pixdim[1..=3]` zoom fields
fn header_spacing(header: &NiftiHeader) -> Option<Spacing> {
    let [x, y, z] = pixdim(header);
    Spacing::new(x as f64, y as f64, z as f64)
}

/// Collapse a 3D array, or a 4D array with a single trailing frame, to `Array3`.
fn into_array3(data: ArrayD<f64>) -> Option<Array3<f64>> {
    let shape = data.shape().to_vec();
    match shape.as_slice() {
        [_, _, _] => data.into_dimensionality::<Ix3>().ok(),
        [_, _, _, 1] => data
            .index_axis_move(Axis(3), 0)
            .into_dimensionality::<Ix3>()
            .ok(),
        _ => None,
    }
}

/// Load a volume file into memory. Fails with `NotFound` if the path does not
/// exist, and with a format error if the file cannot be parsed or lacks spacing.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Volume, VolumeError> {
    let path = path.as_ref();
    ensure!(path.is_file(), NotFoundSnafu { path });
    let format = VolumeFormat::from_path(path).context(UnsupportedFormatSnafu { path })?;
    format.reader().read_volume(path)
}

/// Load a label map. Every voxel must hold an integral value.
pub fn load_label_map<P: AsRef<Path>>(path: P) -> Result<LabelMap, VolumeError> {
    let path = path.as_ref();
    let volume = load_volume(path)?;
    if let Some(&value) = volume
        .data()
        .iter()
        .find(|v| !v.is_finite() || v.fract() != 0.0)
    {
        return NonIntegerLabelSnafu { path, value }.fail();
    }
    let data = volume.data().mapv(|v| v as i64);
    Ok(LabelMap::new(data, volume.spacing()))
}
