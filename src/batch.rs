use indicatif::ProgressFinish;
use rayon::prelude::*;
use snafu::{ResultExt, Snafu};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::TableError;
use crate::file::{default_bar, VolumeFileOperations};
use crate::load::VolumeFormat;
use crate::modality::DatasetLayout;
use crate::record::PatientRecordBuilder;
use crate::table::{LabelStatRecord, ResultTable};

pub const DEFAULT_OUTPUT_FILENAME: &str = "segmentation_statistics.csv";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BatchError {
    #[snafu(display("Invalid segmentation path: {}", path.display()))]
    InvalidSourcePath { path: PathBuf },

    #[snafu(display("Invalid data path: {}", path.display()))]
    InvalidDataPath { path: PathBuf },

    #[snafu(display("Failed to list segmentation files in {}", path.display()))]
    ListSources {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Failed to create directory: {}", path.display()))]
    CreateDir {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Failed to write results: {}", source))]
    WriteResults {
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },
}

/// Outcome of a batch run
#[derive(Debug)]
pub struct BatchSummary {
    pub table: ResultTable,
    pub output: PathBuf,
    pub processed: usize,
    pub skipped: usize,
}

/// Runs the record builder over every segmentation file of a directory and
/// writes one table.
///
/// Rows are accumulated in memory and written once at the end, so an
/// interrupted run leaves no table behind rather than a partial one.
/// With `parallel` set, patients are processed concurrently but rows keep the
/// lexical order of the segmentation filenames.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    pub layout: DatasetLayout,
    pub format: VolumeFormat,
    pub parallel: bool,
}

impl BatchRunner {
    /// Segmentation files of a directory, in processing order
    pub fn discover<P: AsRef<Path>>(&self, seg_dir: P) -> Result<Vec<PathBuf>, BatchError> {
        let seg_dir = seg_dir.as_ref();
        if !seg_dir.is_dir() {
            return InvalidSourcePathSnafu { path: seg_dir }.fail();
        }
        seg_dir
            .find_volumes(self.format)
            .context(ListSourcesSnafu { path: seg_dir })
    }

    pub fn run<P: AsRef<Path>>(
        &self,
        seg_dir: P,
        data_dir: P,
        output_dir: P,
    ) -> Result<BatchSummary, BatchError> {
        let (data_dir, output_dir) = (data_dir.as_ref(), output_dir.as_ref());
        if !data_dir.is_dir() {
            return InvalidDataPathSnafu { path: data_dir }.fail();
        }

        let sources = self.discover(seg_dir)?;
        info!("Found {} segmentation files", sources.len());

        let builder = PatientRecordBuilder::new(data_dir, self.layout, self.format);
        let pb = default_bar(sources.len() as u64).with_finish(ProgressFinish::AndLeave);
        pb.set_message("Processing segmentation files");

        let process = |path: &PathBuf| -> Option<Vec<LabelStatRecord>> {
            let file_name = path.file_name().unwrap_or_default().to_string_lossy();
            let result = builder.build(path);
            pb.inc(1);
            match result {
                Ok(records) => {
                    info!("Processed {} ({} labels)", file_name, records.len());
                    Some(records)
                }
                Err(e) => {
                    warn!("Skipping {}: {}", file_name, e);
                    None
                }
            }
        };

        // Indexed collect keeps discovery order regardless of scheduling
        let outcomes = if self.parallel {
            sources.par_iter().map(process).collect::<Vec<_>>()
        } else {
            sources.iter().map(process).collect::<Vec<_>>()
        };

        let processed = outcomes.iter().filter(|records| records.is_some()).count();
        let skipped = outcomes.len() - processed;
        let mut table = ResultTable::new(self.layout);
        table.extend(outcomes.into_iter().flatten().flatten());

        std::fs::create_dir_all(output_dir).context(CreateDirSnafu { path: output_dir })?;
        let output = output_dir.join(DEFAULT_OUTPUT_FILENAME);
        table.write_csv(&output).context(WriteResultsSnafu)?;
        info!(
            "Wrote {} rows for {} patients ({} skipped) to {}",
            table.len(),
            processed,
            skipped,
            output.display()
        );

        Ok(BatchSummary {
            table,
            output,
            processed,
            skipped,
        })
    }
}
