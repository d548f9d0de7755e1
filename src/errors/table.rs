pub use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TableError {
    #[snafu(display("could not create table file {}", path.display()))]
    CreateTable {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("could not write table file {}", path.display()))]
    WriteTable {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("could not flush table file {}", path.display()))]
    FlushTable {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("could not read table file {}", path.display()))]
    ReadTable {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display(
        "unexpected columns in {}: expected {:?}, found {:?}",
        path.display(),
        expected,
        found
    ))]
    Columns {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[snafu(display("invalid value '{}' in column '{}' of {}", value, column, path.display()))]
    ParseValue {
        path: PathBuf,
        column: String,
        value: String,
    },
}
