use snafu::{ensure, IntoError, ResultExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::patient::{
    LoadLabelMapSnafu, LoadModalitySnafu, MissingModalitiesSnafu, ShapeMismatchSnafu,
};
use crate::errors::PatientError;
use crate::load::{load_label_map, load_volume, VolumeFormat};
use crate::modality::{DatasetLayout, ModalitySet, ResolvedModality};
use crate::patient::PatientKey;
use crate::stats;
use crate::table::LabelStatRecord;
use crate::volume::{Shape, Volume};

/// Produces the rows of one patient:
/// derive the id, gate on the modality files, load the volumes, then one row
/// per non-background label in ascending order.
///
/// Any error is fatal for the patient only. A modality volume whose grid does
/// not match the label map, or which disappears after the gate, only leaves
/// that modality's intensity statistics undefined.
#[derive(Debug, Clone)]
pub struct PatientRecordBuilder {
    data_root: PathBuf,
    layout: DatasetLayout,
    format: VolumeFormat,
}

impl PatientRecordBuilder {
    pub fn new<P: AsRef<Path>>(data_root: P, layout: DatasetLayout, format: VolumeFormat) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
            layout,
            format,
        }
    }

    pub fn build<P: AsRef<Path>>(
        &self,
        segmentation: P,
    ) -> Result<Vec<LabelStatRecord>, PatientError> {
        let segmentation = segmentation.as_ref();
        let key = PatientKey::from_segmentation_file(segmentation, self.layout, self.format)?;

        let modalities = ModalitySet::resolve(&key, &self.data_root, self.layout, self.format);
        ensure!(
            modalities.is_complete(),
            MissingModalitiesSnafu {
                patient_id: key.patient_id(),
                missing: modalities.missing(),
            }
        );

        let label_map = load_label_map(segmentation).context(LoadLabelMapSnafu {
            path: segmentation,
        })?;
        let volumes = modalities
            .iter()
            .map(|entry| {
                let volume = self.load_modality(&key, entry, label_map.shape())?;
                Ok((entry.modality, volume))
            })
            .collect::<Result<Vec<_>, PatientError>>()?;

        let labels = label_map.labels();
        debug!(
            "{}: {} labels, shape {:?}",
            key.patient_id(),
            labels.len(),
            label_map.shape()
        );

        let mut records = Vec::with_capacity(labels.len());
        for label in &labels {
            let mask = label_map.mask(label);
            let intensities = volumes
                .iter()
                .map(|(modality, volume)| {
                    let stats = stats::compute(&mask, volume.as_ref())
                        .context(ShapeMismatchSnafu {
                            modality: *modality,
                        })?;
                    Ok((*modality, stats.intensity))
                })
                .collect::<Result<Vec<_>, PatientError>>()?;
            records.push(LabelStatRecord::new(
                key.patient_id(),
                label,
                mask.count(),
                mask.volume_mm3(),
                intensities,
            ));
        }
        Ok(records)
    }

    /// Load one modality volume. `Ok(None)` means statistics for the modality are undefined.
    fn load_modality(
        &self,
        key: &PatientKey,
        entry: &ResolvedModality,
        expected: Shape,
    ) -> Result<Option<Volume>, PatientError> {
        let volume = match load_volume(&entry.path) {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => {
                warn!(
                    "{}: {} volume not found, statistics undefined: {}",
                    key.patient_id(),
                    entry.modality,
                    entry.path.display()
                );
                return Ok(None);
            }
            Err(e) => {
                return Err(e).context(LoadModalitySnafu {
                    modality: entry.modality,
                    path: &entry.path,
                })
            }
        };

        match volume.ensure_shape(expected) {
            Ok(()) => Ok(Some(volume)),
            Err(e) => {
                warn!(
                    "{}: {}, statistics undefined",
                    key.patient_id(),
                    ShapeMismatchSnafu {
                        modality: entry.modality
                    }
                    .into_error(e)
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modality::Modality;
    use crate::save::{save_label_map, save_volume};
    use crate::volume::{LabelMap, Spacing};
    use ndarray::Array3;
    use std::fs;
    use tempfile::TempDir;

    const SHAPE: Shape = (10, 10, 10);

    struct Fixture {
        _temp_dir: TempDir,
        seg_dir: PathBuf,
        data_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let seg_dir = temp_dir.path().join("segs");
            let data_dir = temp_dir.path().join("data");
            fs::create_dir_all(&seg_dir).unwrap();
            fs::create_dir_all(&data_dir).unwrap();
            Self {
                _temp_dir: temp_dir,
                seg_dir,
                data_dir,
            }
        }

        /// Labels {0, 1, 2, 3}; label 2 covers exactly 100 voxels (one 10x10 slab).
        fn write_segmentation(&self, patient_id: &str, spacing: Spacing) -> PathBuf {
            let mut data = Array3::<i64>::zeros(SHAPE);
            data.slice_mut(ndarray::s![0, .., ..]).fill(2);
            data[[5, 5, 5]] = 1;
            data[[6, 6, 6]] = 3;
            data[[7, 7, 7]] = 3;
            let path = self.seg_dir.join(format!("{patient_id}_seg.nii.gz"));
            save_label_map(&path, &LabelMap::new(data, spacing)).unwrap();
            path
        }

        fn write_modality(&self, patient_id: &str, modality: &str, shape: Shape, value: f64) {
            let dir = self.data_dir.join(patient_id);
            fs::create_dir_all(&dir).unwrap();
            let path = dir.join(format!("{patient_id}_brain_{modality}.nii.gz"));
            let volume = Volume::new(
                Array3::from_elem(shape, value),
                Spacing::new(1.0, 1.0, 1.0).unwrap(),
            );
            save_volume(&path, &volume).unwrap();
        }

        fn write_all_modalities(&self, patient_id: &str) {
            for (i, modality) in ["flair", "t1", "t1ce", "t2"].iter().enumerate() {
                self.write_modality(patient_id, modality, SHAPE, (i + 1) as f64 * 10.0);
            }
        }

        fn builder(&self) -> PatientRecordBuilder {
            PatientRecordBuilder::new(&self.data_dir, DatasetLayout::Flat, VolumeFormat::NiftiGz)
        }
    }

    #[test]
    fn test_build_rows() {
        let fixture = Fixture::new();
        let seg = fixture.write_segmentation("ABC_0001", Spacing::new(1.0, 1.0, 1.0).unwrap());
        fixture.write_all_modalities("ABC_0001");

        let records = fixture.builder().build(&seg).unwrap();
        let labels = records.iter().map(|r| r.label_id()).collect::<Vec<_>>();
        assert_eq!(labels, vec![1, 2, 3]);
        assert!(records.iter().all(|r| r.patient_id() == "ABC_0001"));

        let label2 = &records[1];
        assert_eq!(label2.voxel_count(), 100);
        assert_eq!(label2.volume_mm3(), 100.0);
        assert_eq!(label2.label_name(), "Label 2");
        let t1ce = label2.intensity(Modality::T1ce).unwrap();
        assert_eq!(t1ce.mean, 30.0);
        assert_eq!(t1ce.stdev, 0.0);

        assert_eq!(records[2].voxel_count(), 2);
    }

    #[test]
    fn test_build_uses_label_map_spacing() {
        let fixture = Fixture::new();
        let spacing = Spacing::new(0.5, 0.5, 2.0).unwrap();
        let seg = fixture.write_segmentation("ABC_0001", spacing);
        fixture.write_all_modalities("ABC_0001");

        let records = fixture.builder().build(&seg).unwrap();
        assert_eq!(records[1].volume_mm3(), 100.0 * (0.5 * 0.5 * 2.0));
    }

    #[test]
    fn test_missing_modality_skips_patient() {
        let fixture = Fixture::new();
        let seg = fixture.write_segmentation("ABC_0001", Spacing::new(1.0, 1.0, 1.0).unwrap());
        for modality in ["flair", "t1", "t2"] {
            fixture.write_modality("ABC_0001", modality, SHAPE, 1.0);
        }

        let result = fixture.builder().build(&seg);
        match result {
            Err(PatientError::MissingModalities {
                patient_id,
                missing,
            }) => {
                assert_eq!(patient_id, "ABC_0001");
                assert_eq!(missing, vec![Modality::T1ce]);
            }
            other => panic!("expected missing modalities, got {other:?}"),
        }
    }

    #[test]
    fn test_shape_mismatch_only_affects_one_modality() {
        let fixture = Fixture::new();
        let seg = fixture.write_segmentation("ABC_0001", Spacing::new(1.0, 1.0, 1.0).unwrap());
        fixture.write_all_modalities("ABC_0001");
        fixture.write_modality("ABC_0001", "t1", (10, 10, 9), 5.0);

        let records = fixture.builder().build(&seg).unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.intensity(Modality::T1), None);
            assert!(record.intensity(Modality::Flair).is_some());
            assert!(record.intensity(Modality::T1ce).is_some());
            assert!(record.intensity(Modality::T2).is_some());
        }
    }

    #[test]
    fn test_vanished_modality_is_undefined() {
        let fixture = Fixture::new();
        let key = PatientKey::new("ABC_0001", None);
        let entry = ResolvedModality {
            modality: Modality::T1,
            path: fixture.data_dir.join("ABC_0001").join("ABC_0001_brain_t1.nii.gz"),
            exists: true,
        };

        let volume = fixture.builder().load_modality(&key, &entry, SHAPE).unwrap();
        assert!(volume.is_none());
    }

    #[test]
    fn test_load_modality_checks_shape() {
        let fixture = Fixture::new();
        fixture.write_modality("ABC_0001", "t1", SHAPE, 4.0);
        let key = PatientKey::new("ABC_0001", None);
        let entry = ResolvedModality {
            modality: Modality::T1,
            path: fixture.data_dir.join("ABC_0001").join("ABC_0001_brain_t1.nii.gz"),
            exists: true,
        };

        let builder = fixture.builder();
        let volume = builder.load_modality(&key, &entry, SHAPE).unwrap();
        assert_eq!(volume.map(|v| v.shape()), Some(SHAPE));
        let volume = builder.load_modality(&key, &entry, (10, 10, 11)).unwrap();
        assert!(volume.is_none());
    }

    #[test]
    fn test_unreadable_modality_skips_patient() {
        let fixture = Fixture::new();
        let seg = fixture.write_segmentation("ABC_0001", Spacing::new(1.0, 1.0, 1.0).unwrap());
        fixture.write_all_modalities("ABC_0001");
        fs::write(
            fixture.data_dir.join("ABC_0001").join("ABC_0001_brain_t2.nii.gz"),
            b"garbage",
        )
        .unwrap();

        let result = fixture.builder().build(&seg);
        assert!(matches!(
            result,
            Err(PatientError::LoadModality {
                modality: Modality::T2,
                ..
            })
        ));
    }

    #[test]
    fn test_unreadable_label_map_skips_patient() {
        let fixture = Fixture::new();
        let seg = fixture.seg_dir.join("ABC_0001_seg.nii.gz");
        fs::write(&seg, b"garbage").unwrap();
        fixture.write_all_modalities("ABC_0001");

        let result = fixture.builder().build(&seg);
        assert!(matches!(result, Err(PatientError::LoadLabelMap { .. })));
    }

    #[test]
    fn test_naming_convention_error() {
        let fixture = Fixture::new();
        let seg = fixture.seg_dir.join("segmentation.nii.gz");
        fs::write(&seg, b"x").unwrap();

        let result = fixture.builder().build(&seg);
        assert!(matches!(result, Err(PatientError::NamingConvention { .. })));
    }

    #[test]
    fn test_background_only_yields_no_rows() {
        let fixture = Fixture::new();
        let seg = fixture.seg_dir.join("ABC_0001_seg.nii.gz");
        save_label_map(
            &seg,
            &LabelMap::new(Array3::zeros(SHAPE), Spacing::new(1.0, 1.0, 1.0).unwrap()),
        )
        .unwrap();
        fixture.write_all_modalities("ABC_0001");

        let records = fixture.builder().build(&seg).unwrap();
        assert!(records.is_empty());
    }
}
