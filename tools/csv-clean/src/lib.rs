//! Recorded data cleanup
//!
//! Drops every row with fewer than `min_columns` fields from a CSV file.
//! The header row is treated like any other row.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

/// Rows a sample needs to carry one `x,y,z` reading
pub const DEFAULT_MIN_COLUMNS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// What a cleanup pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: usize,
    pub removed: usize,
}

/// Filter `input` into `output`; the two may be the same file
pub fn clean_file(
    input: &Path,
    output: &Path,
    min_columns: usize,
) -> Result<CleanReport, CleanError> {
    let read_err = |source| CleanError::Read {
        path: input.display().to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .map_err(read_err)?;

    // Read everything first so cleaning in place never reads its own output
    let rows = reader
        .records()
        .collect::<Result<Vec<StringRecord>, _>>()
        .map_err(read_err)?;

    let total = rows.len();
    let kept: Vec<StringRecord> = rows
        .into_iter()
        .filter(|row| row.len() >= min_columns)
        .collect();

    write_rows(output, &kept).map_err(|source| CleanError::Write {
        path: output.display().to_string(),
        source,
    })?;

    Ok(CleanReport {
        kept: kept.len(),
        removed: total - kept.len(),
    })
}

fn write_rows(output: &Path, rows: &[StringRecord]) -> csv::Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_path(output)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
