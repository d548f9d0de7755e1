use clap::Parser;
use snafu::{Report, ResultExt, Whatever};
use std::path::PathBuf;
use tracing::{error, Level};

use segmentation_stats::batch::{BatchError, BatchRunner, BatchSummary};
use segmentation_stats::load::VolumeFormat;
use segmentation_stats::modality::DatasetLayout;

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Compute per-label volume and intensity statistics from segmentation masks", long_about = None)]
struct Args {
    #[arg(
        help = "Directory holding one segmentation file per patient",
        long = "seg-dir",
        alias = "seg_dir"
    )]
    seg_dir: PathBuf,

    #[arg(
        help = "Root directory of the imaging data, one subdirectory per patient",
        long = "data-dir",
        alias = "data_dir"
    )]
    data_dir: PathBuf,

    #[arg(
        help = "Directory to write the statistics table to. Created if absent.",
        long = "output-dir",
        alias = "output_dir"
    )]
    output_dir: PathBuf,

    #[arg(
        help = "Naming convention of the imaging data",
        long = "layout",
        short = 'l',
        value_enum,
        default_value_t = DatasetLayout::default()
    )]
    layout: DatasetLayout,

    #[arg(
        help = "Volume file format of segmentations and modalities",
        long = "format",
        short = 'f',
        value_enum,
        default_value_t = VolumeFormat::default()
    )]
    format: VolumeFormat,

    #[arg(
        help = "Process patients in parallel. Row order is unchanged.",
        long = "parallel",
        short = 'p',
        default_value_t = false
    )]
    parallel: bool,

    #[arg(
        help = "Enable debug logging",
        long = "verbose",
        short = 'v',
        default_value_t = false
    )]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    match run(args) {
        Ok(summary) => println!(
            "Wrote {} rows ({} patients, {} skipped) to {}",
            summary.table.len(),
            summary.processed,
            summary.skipped,
            summary.output.display()
        ),
        Err(e) => {
            error!("{}", Report::from_error(e));
            std::process::exit(-1);
        }
    }
}

fn run(args: Args) -> Result<BatchSummary, BatchError> {
    let runner = BatchRunner {
        layout: args.layout,
        format: args.format,
        parallel: args.parallel,
    };
    runner.run(&args.seg_dir, &args.data_dir, &args.output_dir)
}
