use clap::Parser;
use snafu::{Report, ResultExt, Snafu, Whatever};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info, warn, Level};

use segmentation_stats::file::default_bar;

const DEFAULT_COMMAND: &str = "fets_preprocess";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Invalid input path: {}", path.display()))]
    InvalidSourcePath { path: PathBuf },

    #[snafu(display("No patients found in input path: {}", path.display()))]
    NoSources { path: PathBuf },

    #[snafu(display("Error listing {}: {:?}", path.display(), source))]
    ListPatients {
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

    #[snafu(display("Failed to run {}: {:?}", command, source))]
    Spawn {
        command: String,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("{} exited with {}", command, status))]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
    },
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Run the brain preprocessing pipeline over a directory of patients", long_about = None)]
struct Args {
    #[arg(help = "Input directory, one subdirectory per patient")]
    input_dir: PathBuf,

    #[arg(help = "Output directory. One subdirectory per patient is created.")]
    output_dir: PathBuf,

    #[arg(
        help = "Patient IDs to process (default: every entry of the input directory)",
        long = "patients",
        num_args = 1..
    )]
    patients: Option<Vec<String>>,

    #[arg(
        help = "Preprocessing program, called with --inputPath and --outputPath",
        long = "command",
        default_value = DEFAULT_COMMAND
    )]
    command: String,
}

/// Counts of a preprocessing run
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    processed: usize,
    failed: usize,
    skipped: usize,
}

fn main() {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(Level::WARN)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    match run(args) {
        Ok(summary) => println!(
            "Preprocessing finished: {} processed, {} failed, {} skipped",
            summary.processed, summary.failed, summary.skipped
        ),
        Err(e) => {
            error!("{}", Report::from_error(e));
            std::process::exit(-1);
        }
    }
}

fn list_patients(input_dir: &Path) -> Result<Vec<String>, Error> {
    let entries = std::fs::read_dir(input_dir).context(ListPatientsSnafu { path: input_dir })?;
    let mut patients = Vec::new();
    for entry in entries {
        let entry = entry.context(ListPatientsSnafu { path: input_dir })?;
        patients.push(entry.file_name().to_string_lossy().into_owned());
    }
    patients.sort();
    Ok(patients)
}

fn preprocess_patient(command: &str, input: &Path, output: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(output).context(CreateDirSnafu { path: output })?;
    let status = Command::new(command)
        .arg("--inputPath")
        .arg(input)
        .arg("--outputPath")
        .arg(output)
        .status()
        .context(SpawnSnafu { command })?;
    if !status.success() {
        return CommandFailedSnafu { command, status }.fail();
    }
    Ok(())
}

fn run(args: Args) -> Result<Summary, Error> {
    if !args.input_dir.is_dir() {
        return InvalidSourcePathSnafu {
            path: args.input_dir,
        }
        .fail();
    }
    let patients = match args.patients {
        Some(patients) => patients,
        None => list_patients(&args.input_dir)?,
    };
    if patients.is_empty() {
        return NoSourcesSnafu {
            path: args.input_dir,
        }
        .fail();
    }
    info!("Number of patients: {}", patients.len());

    let pb = default_bar(patients.len() as u64);
    pb.set_message("Preprocessing patients");

    let mut summary = Summary::default();
    for patient in &patients {
        let input = args.input_dir.join(patient);
        if !input.is_dir() {
            warn!("Skipping {}: {} is not a directory", patient, input.display());
            summary.skipped += 1;
            pb.inc(1);
            continue;
        }

        let output = args.output_dir.join(patient);
        match preprocess_patient(&args.command, &input, &output) {
            Ok(()) => {
                info!("Preprocessed {}", patient);
                summary.processed += 1;
            }
            Err(e) => {
                error!(
                    "Error preprocessing {}: {}",
                    patient,
                    Report::from_error(&e)
                );
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish();

    Ok(summary)
}
