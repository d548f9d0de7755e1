pub mod batch;
pub mod errors;
pub mod file;
pub mod labels;
pub mod load;
pub mod modality;
pub mod patient;
pub mod record;
pub mod save;
pub mod stats;
pub mod table;
pub mod volume;

pub use batch::{BatchRunner, BatchSummary};
pub use labels::LabelSet;
pub use load::{load_label_map, load_volume, ReadVolume, VolumeFormat};
pub use modality::{DatasetLayout, Modality, ModalitySet};
pub use record::PatientRecordBuilder;
pub use stats::{IntensityStats, MaskedStatistics};
pub use table::{LabelStatRecord, ResultTable};
pub use volume::{LabelMap, Mask, Spacing, Volume};
