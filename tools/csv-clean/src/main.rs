//! CSV cleanup tool
//!
//! Removes incomplete rows from recorded telemetry before it is replayed.
//!
//! # Usage
//!
//! ```bash
//! # Clean in place
//! csv-clean data/accelerometer.csv
//!
//! # Write the result elsewhere, keeping rows with at least 2 fields
//! csv-clean data/gps.csv --output data/gps.clean.csv --min-columns 2
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use roadwatch_csv_clean::{clean_file, DEFAULT_MIN_COLUMNS};

/// Strip rows with too few fields from a CSV file
#[derive(Parser)]
#[command(name = "csv-clean")]
#[command(author, version)]
#[command(about = "Remove incomplete rows from a CSV file")]
struct Args {
    /// CSV file to clean
    input: PathBuf,

    /// Output file (defaults to rewriting the input in place)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rows with fewer fields than this are removed
    #[arg(long, default_value_t = DEFAULT_MIN_COLUMNS)]
    min_columns: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let output = args.output.unwrap_or_else(|| args.input.clone());

    let report = clean_file(&args.input, &output, args.min_columns)?;

    println!(
        "{}: kept {} rows, removed {}",
        output.display(),
        report.kept,
        report.removed
    );
    Ok(())
}
