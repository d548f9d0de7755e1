use clap::ValueEnum;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::load::VolumeFormat;
use crate::patient::PatientKey;

/// An acquisition sequence with its own intensity volume on the label map's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    Flair,
    T1,
    T1ce,
    T2,
    T1c,
    T1n,
    T2f,
    T2w,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Flair => "flair",
            Modality::T1 => "t1",
            Modality::T1ce => "t1ce",
            Modality::T2 => "t2",
            Modality::T1c => "t1c",
            Modality::T1n => "t1n",
            Modality::T2f => "t2f",
            Modality::T2w => "t2w",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directory and naming convention of the imaging data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DatasetLayout {
    /// `<data>/<pid>/<pid>_brain_<m>.<ext>` with modalities flair, t1, t1ce, t2
    #[default]
    Flat,
    /// `<data>/<pid>/<tp>/<pid>_<tp>_brain_<m>.<ext>` with modalities t1c, t1n, t2f, t2w
    Timepoint,
}

const FLAT_MODALITIES: [Modality; 4] = [Modality::Flair, Modality::T1, Modality::T1ce, Modality::T2];
const TIMEPOINT_MODALITIES: [Modality; 4] =
    [Modality::T1c, Modality::T1n, Modality::T2f, Modality::T2w];

impl DatasetLayout {
    /// The modalities every patient must provide, in output column order
    pub fn modalities(&self) -> &'static [Modality] {
        match self {
            DatasetLayout::Flat => &FLAT_MODALITIES,
            DatasetLayout::Timepoint => &TIMEPOINT_MODALITIES,
        }
    }

    /// Expected location of one modality volume for a patient.
    pub fn modality_path(
        &self,
        key: &PatientKey,
        data_root: &Path,
        modality: Modality,
        format: VolumeFormat,
    ) -> PathBuf {
        let file_name = format!("{}_brain_{}{}", key.base_name(), modality, format.suffix());
        let mut path = data_root.join(key.patient_id());
        if let Some(timepoint) = key.timepoint() {
            path.push(timepoint);
        }
        path.join(file_name)
    }
}

impl fmt::Display for DatasetLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout_str = match self {
            DatasetLayout::Flat => "flat",
            DatasetLayout::Timepoint => "timepoint",
        };
        write!(f, "{}", layout_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModality {
    pub modality: Modality,
    pub path: PathBuf,
    pub exists: bool,
}

/// Expected modality files of one patient and whether each is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalitySet {
    entries: Vec<ResolvedModality>,
}

impl ModalitySet {
    /// Build the expected paths for every modality of `layout`. The only I/O
    /// performed is an existence check per path.
    pub fn resolve<P: AsRef<Path>>(
        key: &PatientKey,
        data_root: P,
        layout: DatasetLayout,
        format: VolumeFormat,
    ) -> Self {
        let data_root = data_root.as_ref();
        let entries = layout
            .modalities()
            .iter()
            .map(|&modality| {
                let path = layout.modality_path(key, data_root, modality, format);
                let exists = path.is_file();
                ResolvedModality {
                    modality,
                    path,
                    exists,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedModality> {
        self.entries.iter()
    }

    pub fn missing(&self) -> Vec<Modality> {
        self.entries
            .iter()
            .filter(|e| !e.exists)
            .map(|e| e.modality)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.exists)
    }
}
