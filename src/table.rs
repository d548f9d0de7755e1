use snafu::{ensure, ResultExt};
use std::path::Path;

use crate::errors::table::{
    ColumnsSnafu, CreateTableSnafu, FlushTableSnafu, ParseValueSnafu, ReadTableSnafu,
    WriteTableSnafu,
};
use crate::errors::TableError;
use crate::modality::{DatasetLayout, Modality};
use crate::stats::IntensityStats;

pub const PATIENT_ID_COLUMN: &str = "Patient ID";
pub const LABEL_ID_COLUMN: &str = "Label Id";
pub const LABEL_NAME_COLUMN: &str = "Label Name";
pub const VOXEL_COUNT_COLUMN: &str = "Number Of Voxels";
pub const VOLUME_COLUMN: &str = "Volume (mm^3)";

pub fn mean_column(modality: Modality) -> String {
    format!("Image mean (brain_{})", modality)
}

pub fn stdev_column(modality: Modality) -> String {
    format!("Image stdev (brain_{})", modality)
}

pub fn label_name(label_id: i64) -> String {
    format!("Label {}", label_id)
}

/// One output row: statistics of one label of one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStatRecord {
    patient_id: String,
    label_id: i64,
    voxel_count: usize,
    volume_mm3: f64,
    intensities: Vec<(Modality, Option<IntensityStats>)>,
}

impl LabelStatRecord {
    pub fn new<S: Into<String>>(
        patient_id: S,
        label_id: i64,
        voxel_count: usize,
        volume_mm3: f64,
        intensities: Vec<(Modality, Option<IntensityStats>)>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            label_id,
            voxel_count,
            volume_mm3,
            intensities,
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn label_id(&self) -> i64 {
        self.label_id
    }

    pub fn label_name(&self) -> String {
        label_name(self.label_id)
    }

    pub fn voxel_count(&self) -> usize {
        self.voxel_count
    }

    pub fn volume_mm3(&self) -> f64 {
        self.volume_mm3
    }

    /// Intensity statistics for a modality, `None` when undefined or not recorded
    pub fn intensity(&self, modality: Modality) -> Option<IntensityStats> {
        self.intensities
            .iter()
            .find(|(m, _)| *m == modality)
            .and_then(|(_, stats)| *stats)
    }

    fn to_csv_record(&self, modalities: &[Modality]) -> Vec<String> {
        let mut record = vec![
            self.patient_id.clone(),
            self.label_id.to_string(),
            self.label_name(),
            self.voxel_count.to_string(),
            self.volume_mm3.to_string(),
        ];
        for &modality in modalities {
            let stats = self.intensity(modality);
            record.push(format_optional(stats.map(|s| s.mean)));
            record.push(format_optional(stats.map(|s| s.stdev)));
        }
        record
    }
}

/// Undefined values are written as empty cells. `Display` on f64 yields the
/// shortest string that parses back to the same value.
fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Ordered result rows for one run. Rows are only ever appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    layout: DatasetLayout,
    records: Vec<LabelStatRecord>,
}

impl ResultTable {
    pub fn new(layout: DatasetLayout) -> Self {
        Self {
            layout,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: LabelStatRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[LabelStatRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names in output order
    pub fn columns(&self) -> Vec<String> {
        let mut columns = [
            PATIENT_ID_COLUMN,
            LABEL_ID_COLUMN,
            LABEL_NAME_COLUMN,
            VOXEL_COUNT_COLUMN,
            VOLUME_COLUMN,
        ]
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>();
        for &modality in self.layout.modalities() {
            columns.push(mean_column(modality));
            columns.push(stdev_column(modality));
        }
        columns
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path).context(CreateTableSnafu { path })?;
        writer
            .write_record(self.columns())
            .context(WriteTableSnafu { path })?;
        for record in &self.records {
            writer
                .write_record(record.to_csv_record(self.layout.modalities()))
                .context(WriteTableSnafu { path })?;
        }
        writer.flush().context(FlushTableSnafu { path })?;
        Ok(())
    }

    /// Read a table previously written by [`ResultTable::write_csv`] for the same layout.
    pub fn read_csv<P: AsRef<Path>>(path: P, layout: DatasetLayout) -> Result<Self, TableError> {
        let path = path.as_ref();
        let mut table = ResultTable::new(layout);
        let mut reader = csv::Reader::from_path(path).context(ReadTableSnafu { path })?;

        let expected = table.columns();
        let found = reader
            .headers()
            .context(ReadTableSnafu { path })?
            .iter()
            .map(String::from)
            .collect::<Vec<_>>();
        ensure!(
            found == expected,
            ColumnsSnafu {
                path,
                expected,
                found
            }
        );

        for row in reader.records() {
            let row = row.context(ReadTableSnafu { path })?;
            let field = |index: usize| row.get(index).unwrap_or_default();
            let parse_error = |index: usize| {
                ParseValueSnafu {
                    path,
                    column: expected[index].clone(),
                    value: field(index),
                }
                .build()
            };

            let label_id = field(1).parse::<i64>().map_err(|_| parse_error(1))?;
            let voxel_count = field(3).parse::<usize>().map_err(|_| parse_error(3))?;
            let volume_mm3 = field(4).parse::<f64>().map_err(|_| parse_error(4))?;

            let mut intensities = Vec::with_capacity(layout.modalities().len());
            for (i, &modality) in layout.modalities().iter().enumerate() {
                let mean_index = 5 + 2 * i;
                let stdev_index = mean_index + 1;
                let stats = match (field(mean_index), field(stdev_index)) {
                    ("", "") => None,
                    (mean, stdev) => Some(IntensityStats {
                        mean: mean.parse().map_err(|_| parse_error(mean_index))?,
                        stdev: stdev.parse().map_err(|_| parse_error(stdev_index))?,
                    }),
                };
                intensities.push((modality, stats));
            }

            table.push(LabelStatRecord::new(
                field(0),
                label_id,
                voxel_count,
                volume_mm3,
                intensities,
            ));
        }
        Ok(table)
    }
}

impl Extend<LabelStatRecord> for ResultTable {
    fn extend<I: IntoIterator<Item = LabelStatRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}
