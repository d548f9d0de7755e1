use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use clap::Parser;
use csv::Reader as CsvReader;
use indicatif::ProgressFinish;
use itertools::Itertools;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use segmentation_stats::file::default_bar;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};

const DEFAULT_OUTPUT_FILENAME: &str = "combined_output.csv";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Invalid source path: {}", path.display()))]
    InvalidSourcePath { path: PathBuf },

    #[snafu(display("No CSV files with prefix '{}' found in source path: {}", prefix, path.display()))]
    NoSources { path: PathBuf, prefix: String },

    #[snafu(display("Invalid output path: {}", path.display()))]
    InvalidOutputPath { path: PathBuf },

    #[snafu(display("Invalid output extension for {}, supported extensions: {}", path.display(), supported.join(", ")))]
    InvalidOutputExtension {
        path: PathBuf,
        supported: Vec<&'static str>,
    },

    #[snafu(display("Error listing {}: {:?}", path.display(), source))]
    ListSources {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Error creating output {}: {:?}", path.display(), source))]
    CreateOutput {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Error reading CSV {}: {:?}", path.display(), source))]
    ReadCsv {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("Error writing CSV: {:?}", source))]
    WriteCsv {
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("File name {} has no identifier token", path.display()))]
    MissingIdentifier { path: PathBuf },

    #[snafu(display("{} already has a column named '{}'", path.display(), column))]
    DuplicateIdentifierColumn { path: PathBuf, column: String },

    #[snafu(display("Arrow error: {:?}", source))]
    Arrow {
        #[snafu(source(from(ArrowError, Box::new)))]
        source: Box<ArrowError>,
    },

    #[snafu(display("Parquet error: {:?}", source))]
    Parquet {
        #[snafu(source(from(ParquetError, Box::new)))]
        source: Box<ParquetError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    fn from_extension(path: &Path) -> Result<Self, Error> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => Ok(OutputFormat::Csv),
            Some("parquet") => Ok(OutputFormat::Parquet),
            _ => Err(Error::InvalidOutputExtension {
                path: path.to_path_buf(),
                supported: vec!["csv", "parquet"],
            }),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Combine per-patient CSV tables into one table", long_about = None)]
struct Args {
    #[arg(help = "Source directory")]
    source: PathBuf,

    #[arg(help = format!("Output filepath, extension determines format: .csv or .parquet (default: <source>/{DEFAULT_OUTPUT_FILENAME})"))]
    output: Option<PathBuf>,

    #[arg(
        help = "Only combine CSV files whose name starts with this prefix",
        long = "prefix",
        default_value = "Patient"
    )]
    prefix: String,

    #[arg(
        help = "Name of the identifier column",
        long = "column",
        default_value = "PatientID"
    )]
    column: String,
}

fn main() {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(Level::ERROR)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    match run(args) {
        Ok(Some(dest)) => println!("Combined table written to {}", dest.display()),
        Ok(None) => println!("No rows to combine, nothing written"),
        Err(e) => {
            error!("{}", Report::from_error(e));
            std::process::exit(-1);
        }
    }
}

/// The rows of one input table, keyed by that table's headers
#[derive(Debug)]
struct SourceTable {
    identifier: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Union of several tables. Cells absent from a source are `None`.
#[derive(Debug, PartialEq)]
struct CombinedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl CombinedTable {
    fn from_sources(id_column: &str, sources: &[SourceTable]) -> Self {
        let columns = std::iter::once(id_column.to_string())
            .chain(
                sources
                    .iter()
                    .flat_map(|s| s.headers.iter())
                    .unique()
                    .cloned(),
            )
            .collect::<Vec<_>>();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect::<HashMap<_, _>>();

        let mut rows = Vec::new();
        for source in sources {
            for values in &source.rows {
                let mut row = vec![None; columns.len()];
                row[0] = Some(source.identifier.clone());
                for (header, value) in source.headers.iter().zip(values) {
                    if let Some(&i) = index.get(header.as_str()) {
                        row[i] = Some(value.clone());
                    }
                }
                rows.push(row);
            }
        }
        Self { columns, rows }
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Identifier of a source file: the second underscore-delimited token of its stem
fn identifier(path: &Path) -> Result<String, Error> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.split('_').nth(1))
        .filter(|token| !token.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::MissingIdentifier {
            path: path.to_path_buf(),
        })
}

fn find_sources(source: &Path, prefix: &str) -> Result<Vec<PathBuf>, Error> {
    let entries = std::fs::read_dir(source).context(ListSourcesSnafu { path: source })?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.context(ListSourcesSnafu { path: source })?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".csv"));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_source(path: &Path, id_column: &str) -> Result<SourceTable, Error> {
    let identifier = identifier(path)?;
    let mut reader = CsvReader::from_path(path).context(ReadCsvSnafu { path })?;
    let headers = reader
        .headers()
        .context(ReadCsvSnafu { path })?
        .iter()
        .map(String::from)
        .collect::<Vec<_>>();
    ensure!(
        !headers.iter().any(|h| h == id_column),
        DuplicateIdentifierColumnSnafu {
            path,
            column: id_column,
        }
    );
    let rows = reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(String::from).collect::<Vec<_>>())
                .context(ReadCsvSnafu { path })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SourceTable {
        identifier,
        headers,
        rows,
    })
}

fn write_csv(table: &CombinedTable, dest: &Path) -> Result<(), Error> {
    let file = File::create(dest).context(CreateOutputSnafu { path: dest })?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&table.columns).context(WriteCsvSnafu)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or_default()))
            .context(WriteCsvSnafu)?;
    }
    writer.flush().context(CreateOutputSnafu { path: dest })?;
    Ok(())
}

fn write_parquet(table: &CombinedTable, dest: &Path) -> Result<(), Error> {
    let fields = table
        .columns
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect::<Vec<_>>();
    let arrays = (0..table.columns.len())
        .map(|i| {
            let values = table
                .rows
                .iter()
                .map(|row| row[i].as_deref())
                .collect::<Vec<_>>();
            Arc::new(StringArray::from(values)) as ArrayRef
        })
        .collect::<Vec<_>>();

    let batch =
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context(ArrowSnafu)?;

    let file = File::create(dest).context(CreateOutputSnafu { path: dest })?;
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).context(ParquetSnafu)?;
    writer.write(&batch).context(ParquetSnafu)?;
    writer.close().context(ParquetSnafu)?;
    Ok(())
}

fn run(args: Args) -> Result<Option<PathBuf>, Error> {
    let source = if args.source.is_dir() {
        Ok(args.source)
    } else {
        Err(Error::InvalidSourcePath {
            path: args.source.to_path_buf(),
        })
    }?;
    let dest = match args.output {
        Some(output) if output.is_dir() => Err(Error::InvalidOutputPath { path: output }),
        Some(output) => Ok(output),
        None => Ok(source.join(DEFAULT_OUTPUT_FILENAME)),
    }?;
    let format = OutputFormat::from_extension(&dest)?;

    let paths = find_sources(&source, &args.prefix)?;
    if paths.is_empty() {
        return NoSourcesSnafu {
            path: source,
            prefix: args.prefix,
        }
        .fail();
    }
    info!("Number of CSV files found: {}", paths.len());

    let pb = default_bar(paths.len() as u64).with_finish(ProgressFinish::AndLeave);
    pb.set_message("Combining CSV files");
    let sources = paths
        .iter()
        .filter_map(|path| {
            let result = read_source(path, &args.column);
            pb.inc(1);
            match result {
                Ok(table) => Some(table),
                Err(e) => {
                    error!("Skipping {}: {}", path.display(), Report::from_error(&e));
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    let table = CombinedTable::from_sources(&args.column, &sources);
    if table.is_empty() {
        info!("No rows found in {} files", paths.len());
        return Ok(None);
    }

    match format {
        OutputFormat::Csv => write_csv(&table, &dest)?,
        OutputFormat::Parquet => write_parquet(&table, &dest)?,
    }
    info!("Wrote {} rows to {}", table.rows.len(), dest.display());
    Ok(Some(dest))
}
