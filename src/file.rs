use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use crate::load::VolumeFormat;

pub const GZIP_MAGIC: &[u8; 2] = &[0x1f, 0x8b];

type IOResult<T> = Result<T, std::io::Error>;

pub fn default_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

pub trait VolumeFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file starts with the gzip magic bytes.
    /// This will only return an error if the file cannot be opened.
    /// A file too short to hold the magic is mapped to `false`.
    fn has_gzip_magic(&self) -> IOResult<bool> {
        let mut reader = File::open(self.as_ref())?;
        let mut buffer = [0; GZIP_MAGIC.len()];
        reader
            .read_exact(&mut buffer)
            .map_or(Ok(false), |_| Ok(&buffer == GZIP_MAGIC))
    }

    /// Check if a path is an existing file with the suffix of `format`.
    fn is_volume_file(&self, format: VolumeFormat) -> bool {
        let path = self.as_ref();
        path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| format.matches(name))
    }

    /// Find the volume files directly inside a directory, in lexical filename order.
    /// Subdirectories are not searched.
    fn find_volumes(&self, format: VolumeFormat) -> IOResult<Vec<PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<IOResult<Vec<_>>>()?;
        let result = entries
            .into_iter()
            .filter(|path| path.is_volume_file(format))
            .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
            .collect();
        Ok(result)
    }
}

impl<P: AsRef<Path>> VolumeFileOperations for P {}
