use std::path::Path;

use crate::errors::patient::NamingConventionSnafu;
use crate::errors::PatientError;
use crate::load::VolumeFormat;
use crate::modality::DatasetLayout;

/// Identifies the patient (and, for longitudinal data, the timepoint) a
/// segmentation file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientKey {
    patient_id: String,
    timepoint: Option<String>,
}

impl PatientKey {
    pub fn new<S: Into<String>>(patient_id: S, timepoint: Option<&str>) -> Self {
        Self {
            patient_id: patient_id.into(),
            timepoint: timepoint.map(String::from),
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn timepoint(&self) -> Option<&str> {
        self.timepoint.as_deref()
    }

    /// Prefix shared by this patient's modality filenames
    pub fn base_name(&self) -> String {
        match &self.timepoint {
            Some(timepoint) => format!("{}_{}", self.patient_id, timepoint),
            None => self.patient_id.clone(),
        }
    }

    /// Derive the key from a segmentation filename. The patient id is the first
    /// two underscore-delimited tokens of the name without its volume suffix;
    /// the timepoint layout also takes the next two tokens as the timepoint.
    pub fn from_file_name(
        file_name: &str,
        layout: DatasetLayout,
        format: VolumeFormat,
    ) -> Result<Self, PatientError> {
        let naming_error = || NamingConventionSnafu { file_name }.build();

        let stem = format.strip_suffix(file_name).ok_or_else(naming_error)?;
        let tokens = stem.split('_').collect::<Vec<_>>();
        let required = match layout {
            DatasetLayout::Flat => 2,
            DatasetLayout::Timepoint => 4,
        };
        if tokens.len() < required || tokens[..required].iter().any(|t| t.is_empty()) {
            return Err(naming_error());
        }

        let patient_id = tokens[0..2].join("_");
        let key = match layout {
            DatasetLayout::Flat => PatientKey::new(patient_id, None),
            DatasetLayout::Timepoint => {
                PatientKey::new(patient_id, Some(tokens[2..4].join("_").as_str()))
            }
        };
        Ok(key)
    }

    pub fn from_segmentation_file<P: AsRef<Path>>(
        path: P,
        layout: DatasetLayout,
        format: VolumeFormat,
    ) -> Result<Self, PatientError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_file_name(&file_name, layout, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ABC_0001_seg.nii.gz", "ABC_0001")]
    #[case("ABC_0001.nii.gz", "ABC_0001")]
    #[case("Patient_12_final_mask.nii.gz", "Patient_12")]
    fn test_flat_patient_id(#[case] file_name: &str, #[case] expected: &str) {
        let key =
            PatientKey::from_file_name(file_name, DatasetLayout::Flat, VolumeFormat::NiftiGz)
                .unwrap();
        assert_eq!(key.patient_id(), expected);
        assert_eq!(key.timepoint(), None);
        assert_eq!(key.base_name(), expected);
    }

    #[rstest]
    #[case("segmentation.nii.gz")]
    #[case("_0001_seg.nii.gz")]
    #[case("ABC__seg.nii.gz")]
    #[case("ABC_0001_seg.nii")]
    #[case(".nii.gz")]
    fn test_flat_naming_errors(#[case] file_name: &str) {
        let result =
            PatientKey::from_file_name(file_name, DatasetLayout::Flat, VolumeFormat::NiftiGz);
        assert!(matches!(result, Err(PatientError::NamingConvention { .. })));
    }

    #[test]
    fn test_timepoint_key() {
        let key = PatientKey::from_file_name(
            "BraTS_0002_time_1_seg.nii.gz",
            DatasetLayout::Timepoint,
            VolumeFormat::NiftiGz,
        )
        .unwrap();
        assert_eq!(key.patient_id(), "BraTS_0002");
        assert_eq!(key.timepoint(), Some("time_1"));
        assert_eq!(key.base_name(), "BraTS_0002_time_1");
    }

    #[test]
    fn test_timepoint_requires_four_tokens() {
        let result = PatientKey::from_file_name(
            "ABC_0001_seg.nii.gz",
            DatasetLayout::Timepoint,
            VolumeFormat::NiftiGz,
        );
        assert!(matches!(result, Err(PatientError::NamingConvention { .. })));
    }

    #[test]
    fn test_from_segmentation_file() {
        let key = PatientKey::from_segmentation_file(
            "/segs/ABC_0001_seg.nii.gz",
            DatasetLayout::Flat,
            VolumeFormat::NiftiGz,
        )
        .unwrap();
        assert_eq!(key, PatientKey::new("ABC_0001", None));
    }
}
