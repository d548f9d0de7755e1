use nifti::NiftiError;
pub use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum VolumeError {
    #[snafu(display("volume file not found: {}", path.display()))]
    NotFound { path: PathBuf },

    #[snafu(display("unsupported volume format: {}", path.display()))]
    UnsupportedFormat { path: PathBuf },

    #[snafu(display("not a valid gzip file: {}", path.display()))]
    InvalidGzip { path: PathBuf },

    #[snafu(display("IO error on volume file {}", path.display()))]
    Io {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("error reading NIfTI file {}: {}", path.display(), source))]
    Read {
        path: PathBuf,
        #[snafu(source(from(NiftiError, Box::new)))]
        source: Box<NiftiError>,
    },

    #[snafu(display("missing voxel spacing in {}: pixdim={:?}", path.display(), pixdim))]
    MissingSpacing { path: PathBuf, pixdim: [f32; 3] },

    #[snafu(display("expected a 3D volume in {}, found shape {:?}", path.display(), shape))]
    Dimensionality { path: PathBuf, shape: Vec<usize> },

    #[snafu(display("non-integer label value {} in {}", value, path.display()))]
    NonIntegerLabel { path: PathBuf, value: f64 },
}

impl VolumeError {
    /// The file was absent. Callers are expected to check existence first.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VolumeError::NotFound { .. })
    }

    /// The file exists but could not be read as a volume.
    pub fn is_format_error(&self) -> bool {
        !self.is_not_found()
    }
}
