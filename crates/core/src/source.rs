//! Recorded-data replay source
//!
//! `StreamSource` reads two header-plus-rows CSV files (accelerometer and
//! GPS) in lockstep and turns them into an endless stream of fixed-size
//! batches. When either file runs out, both are rewound to their first data
//! row and the current batch continues from there, so every batch is full and
//! no row is skipped or repeated across the wrap.
//!
//! ```text
//! Unopened --open--> Open --read--> Open (rewinds on end of data) --close--> Closed
//! ```
//!
//! Reads block: each sample is followed by `sample_delay` of sleep on the
//! configured [`Clock`], so one batch takes `batch_size * sample_delay`.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::model::{AggregatedSample, Batch, MotionSample, PositionSample};

/// Samples per batch in the reference cadence
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause after each sample in the reference cadence
pub const DEFAULT_SAMPLE_DELAY: Duration = Duration::from_millis(500);

const MOTION_COLUMNS: [&str; 3] = ["x", "y", "z"];
const POSITION_COLUMNS: [&str; 2] = ["latitude", "longitude"];

/// Replay configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// CSV with one `x,y,z` row per accelerometer sample
    pub accelerometer_path: PathBuf,

    /// CSV with one `latitude,longitude` row per GPS sample
    pub gps_path: PathBuf,

    /// Samples per batch
    pub batch_size: usize,

    /// Pause after each sample
    pub sample_delay: Duration,
}

impl SourceConfig {
    pub fn new(accelerometer_path: impl Into<PathBuf>, gps_path: impl Into<PathBuf>) -> Self {
        Self {
            accelerometer_path: accelerometer_path.into(),
            gps_path: gps_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            sample_delay: DEFAULT_SAMPLE_DELAY,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_sample_delay(mut self, sample_delay: Duration) -> Self {
        self.sample_delay = sample_delay;
        self
    }
}

/// Lifecycle state of a [`StreamSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unopened,
    Open,
    Closed,
}

/// Endless, batching replay of two recorded CSV files
pub struct StreamSource {
    config: SourceConfig,
    clock: Arc<dyn Clock>,
    state: State,
}

enum State {
    Unopened,
    Open(Cursors),
    Closed,
}

impl StreamSource {
    /// Create an unopened source paced by the system clock
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            state: State::Unopened,
        }
    }

    /// Replace the clock used for timestamps and pacing
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn state(&self) -> SourceState {
        match self.state {
            State::Unopened => SourceState::Unopened,
            State::Open(_) => SourceState::Open,
            State::Closed => SourceState::Closed,
        }
    }

    /// Open both files and position at their first data row
    ///
    /// Opening an already open source rewinds it.
    pub fn open(&mut self) -> Result<()> {
        if self.config.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if matches!(self.state, State::Closed) {
            return Err(Error::SourceClosed);
        }

        let cursors = Cursors::open(&self.config)?;
        self.state = State::Open(cursors);

        tracing::info!(
            accelerometer = %self.config.accelerometer_path.display(),
            gps = %self.config.gps_path.display(),
            batch_size = self.config.batch_size,
            "Recorded data source opened"
        );
        Ok(())
    }

    /// Read the next batch of exactly `batch_size` samples
    ///
    /// All samples share one timestamp, captured before the first row is
    /// read. Rows that fail to decode are logged and skipped; the batch is
    /// filled from the rows after them. `Error::Decode` is returned only when
    /// a whole pass over the data produced nothing decodable.
    pub fn read(&mut self) -> Result<Batch> {
        let Self {
            config,
            clock,
            state,
        } = self;

        let cursors = match state {
            State::Open(cursors) => cursors,
            State::Unopened => return Err(Error::NotOpen),
            State::Closed => return Err(Error::SourceClosed),
        };

        if cursors.spent {
            *cursors = Cursors::open(config)?;
        }

        let timestamp = clock.now();
        let mut batch = Vec::with_capacity(config.batch_size);

        while batch.len() < config.batch_size {
            match cursors.next_pair(timestamp) {
                Step::Sample(sample) => {
                    batch.push(sample);
                    clock.sleep(config.sample_delay);
                }
                Step::Skipped(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable recorded row");
                }
                Step::Exhausted => cursors.rewind(config)?,
            }
        }

        Ok(batch)
    }

    /// Release both files; later reads fail with `Error::SourceClosed`
    pub fn close(&mut self) {
        if !matches!(self.state, State::Closed) {
            self.state = State::Closed;
            tracing::info!("Recorded data source closed");
        }
    }
}

enum Step {
    Sample(AggregatedSample),
    Skipped(Error),
    Exhausted,
}

/// Paired read positions plus bookkeeping for the current pass over the data
struct Cursors {
    motion: RecordCursor<3>,
    position: RecordCursor<2>,
    rows_this_pass: u64,
    decoded_this_pass: u64,
    last_error: Option<Error>,
    spent: bool,
}

impl Cursors {
    fn open(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            motion: RecordCursor::open(&config.accelerometer_path, MOTION_COLUMNS)?,
            position: RecordCursor::open(&config.gps_path, POSITION_COLUMNS)?,
            rows_this_pass: 0,
            decoded_this_pass: 0,
            last_error: None,
            spent: false,
        })
    }

    fn next_pair(&mut self, timestamp: DateTime<Utc>) -> Step {
        let motion_row = self.motion.advance();
        let position_row = self.position.advance();

        if matches!(motion_row, Ok(false)) || matches!(position_row, Ok(false)) {
            return Step::Exhausted;
        }
        self.rows_this_pass += 1;

        let motion = motion_row.and_then(|_| self.motion.decode::<i32>());
        let position = position_row.and_then(|_| self.position.decode::<f64>());

        match (motion, position) {
            (Ok([x, y, z]), Ok([latitude, longitude])) => {
                self.decoded_this_pass += 1;
                Step::Sample(AggregatedSample {
                    accelerometer: MotionSample { x, y, z },
                    gps: PositionSample {
                        latitude,
                        longitude,
                    },
                    timestamp,
                })
            }
            (Err(e), _) | (_, Err(e)) => {
                self.last_error = Some(e.clone());
                Step::Skipped(e)
            }
        }
    }

    /// Reopen both files at their first data row
    ///
    /// A pass that produced nothing is reported as an error and leaves the
    /// cursors spent; the next `read` reopens the files and starts over.
    fn rewind(&mut self, config: &SourceConfig) -> Result<()> {
        if self.rows_this_pass == 0 {
            self.spent = true;
            return Err(Error::EmptyDataset(format!(
                "{} / {}",
                config.accelerometer_path.display(),
                config.gps_path.display()
            )));
        }
        if self.decoded_this_pass == 0 {
            self.spent = true;
            return Err(self.last_error.clone().unwrap_or_else(|| {
                Error::InvalidConfig("no decodable rows in recorded data".to_string())
            }));
        }

        tracing::debug!(rows = self.rows_this_pass, "End of recorded data, rewinding");
        *self = Self::open(config)?;
        Ok(())
    }
}

/// One CSV file, read row by row with `N` numeric columns
struct RecordCursor<const N: usize> {
    path: PathBuf,
    reader: csv::Reader<File>,
    record: StringRecord,
    columns: [usize; N],
}

impl<const N: usize> RecordCursor<N> {
    fn open(path: &Path, names: [&str; N]) -> Result<Self> {
        let unavailable = |e: csv::Error| Error::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)
            .map_err(unavailable)?;
        let headers = reader.headers().map_err(unavailable)?.clone();

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            record: StringRecord::new(),
            columns: resolve_columns(&headers, names),
        })
    }

    /// Move to the next row; `Ok(false)` at end of data
    fn advance(&mut self) -> Result<bool> {
        self.reader
            .read_record(&mut self.record)
            .map_err(|e| self.error(e.to_string()))
    }

    fn decode<T>(&self) -> Result<[T; N]>
    where
        T: FromStr + Copy + Default,
        T::Err: std::fmt::Display,
    {
        let needed = self.columns.iter().max().map_or(0, |c| c + 1);
        if self.record.len() < needed {
            return Err(self.error(format!(
                "expected at least {} columns, found {}",
                needed,
                self.record.len()
            )));
        }

        let mut values = [T::default(); N];
        for (value, &column) in values.iter_mut().zip(self.columns.iter()) {
            let field = self.record.get(column).unwrap_or_default();
            *value = field
                .parse()
                .map_err(|e| self.error(format!("column {}: {:?}: {}", column, field, e)))?;
        }
        Ok(values)
    }

    fn error(&self, message: String) -> Error {
        Error::Decode {
            path: self.path.display().to_string(),
            line: self.record.position().map(|p| p.line()).unwrap_or(0),
            message,
        }
    }
}

/// Map expected column names to header positions
///
/// Falls back to positional order unless every name is found in the header.
fn resolve_columns<const N: usize>(headers: &StringRecord, names: [&str; N]) -> [usize; N] {
    let mut columns = [0; N];
    for (i, name) in names.iter().enumerate() {
        match headers.iter().position(|h| h.eq_ignore_ascii_case(name)) {
            Some(index) => columns[i] = index,
            None => return std::array::from_fn(|i| i),
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn write_dataset(dir: &TempDir, rows: usize) -> SourceConfig {
        let accelerometer = dir.path().join("accelerometer.csv");
        let gps = dir.path().join("gps.csv");

        let mut motion = String::from("X,Y,Z\n");
        let mut position = String::from("latitude,longitude\n");
        for i in 1..=rows {
            motion.push_str(&format!("{},{},{}\n", i, -(i as i32), 16000 + i));
            position.push_str(&format!("50.{:04},30.{:04}\n", i, i));
        }
        fs::write(&accelerometer, motion).unwrap();
        fs::write(&gps, position).unwrap();

        SourceConfig::new(accelerometer, gps).with_sample_delay(Duration::from_millis(500))
    }

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn open_source(config: SourceConfig, clock: Arc<ManualClock>) -> StreamSource {
        let mut source = StreamSource::new(config).with_clock(clock);
        source.open().unwrap();
        source
    }

    /// Row number (1-based) a sample was read from
    fn row_of(sample: &AggregatedSample) -> i32 {
        sample.accelerometer.x
    }

    #[test]
    fn test_batch_has_exactly_n_samples() {
        let dir = TempDir::new().unwrap();
        for n in 1..=12 {
            let config = write_dataset(&dir, 7).with_batch_size(n);
            let mut source = open_source(config, manual_clock());
            for _ in 0..3 {
                assert_eq!(source.read().unwrap().len(), n);
            }
        }
    }

    #[test]
    fn test_one_timestamp_per_batch() {
        let dir = TempDir::new().unwrap();
        let mut source = open_source(write_dataset(&dir, 7), manual_clock());

        for _ in 0..4 {
            let batch = source.read().unwrap();
            let first = batch[0].timestamp;
            assert!(batch.iter().all(|s| s.timestamp == first));
        }
    }

    #[test]
    fn test_seven_rows_batch_of_five_wraps() {
        let dir = TempDir::new().unwrap();
        let clock = manual_clock();
        let mut source = open_source(write_dataset(&dir, 7), clock.clone());

        let first = source.read().unwrap();
        let second = source.read().unwrap();

        assert_eq!(first.iter().map(row_of).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(second.iter().map(row_of).collect::<Vec<_>>(), vec![6, 7, 1, 2, 3]);

        assert!(second.iter().all(|s| s.timestamp == second[0].timestamp));
        assert_ne!(first[0].timestamp, second[0].timestamp);

        // Pacing went through the injected clock
        assert_eq!(clock.total_slept(), Duration::from_millis(500) * 10);
    }

    #[test]
    fn test_sample_after_last_row_is_first_row() {
        let dir = TempDir::new().unwrap();
        let config = write_dataset(&dir, 7).with_batch_size(3);
        let mut source = open_source(config, manual_clock());

        let samples: Vec<AggregatedSample> = (0..6).flat_map(|_| source.read().unwrap()).collect();
        let rows: Vec<i32> = samples.iter().map(row_of).collect();

        assert_eq!(rows[7], 1);
        assert_eq!(samples[7].accelerometer, samples[0].accelerometer);
        assert_eq!(samples[7].gps, samples[0].gps);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(*row, (i % 7) as i32 + 1);
        }
    }

    #[test]
    fn test_columns_resolved_by_header_name() {
        let dir = TempDir::new().unwrap();
        let accelerometer = dir.path().join("accelerometer.csv");
        let gps = dir.path().join("gps.csv");
        fs::write(&accelerometer, "x,y,z\n1,2,3\n").unwrap();
        fs::write(&gps, "longitude,latitude\n30.5,50.4\n").unwrap();

        let config = SourceConfig::new(accelerometer, gps).with_batch_size(1);
        let mut source = open_source(config, manual_clock());
        let batch = source.read().unwrap();

        assert_eq!(batch[0].gps.latitude, 50.4);
        assert_eq!(batch[0].gps.longitude, 30.5);
    }

    #[test]
    fn test_undecodable_row_is_skipped() {
        let dir = TempDir::new().unwrap();
        let accelerometer = dir.path().join("accelerometer.csv");
        let gps = dir.path().join("gps.csv");
        fs::write(&accelerometer, "x,y,z\n1,1,1\nbad,2,2\n3,3,3\n4\n5,5,5\n").unwrap();
        fs::write(&gps, "latitude,longitude\n1,1\n2,2\n3,3\n4,4\n5,5\n").unwrap();

        let config = SourceConfig::new(accelerometer, gps).with_batch_size(3);
        let mut source = open_source(config, manual_clock());
        let batch = source.read().unwrap();

        assert_eq!(batch.iter().map(row_of).collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(batch[1].gps.latitude, 3.0);
    }

    #[test]
    fn test_all_rows_undecodable_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let accelerometer = dir.path().join("accelerometer.csv");
        let gps = dir.path().join("gps.csv");
        fs::write(&accelerometer, "x,y,z\na,b,c\n").unwrap();
        fs::write(&gps, "latitude,longitude\n1,1\n").unwrap();

        let mut source = open_source(SourceConfig::new(accelerometer, gps), manual_clock());
        let err = source.read().unwrap_err();

        assert!(matches!(err, Error::Decode { line: 2, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_repaired_file_is_picked_up_after_decode_error() {
        let dir = TempDir::new().unwrap();
        let accelerometer = dir.path().join("accelerometer.csv");
        let gps = dir.path().join("gps.csv");
        fs::write(&accelerometer, "x,y,z\na,b,c\n").unwrap();
        fs::write(&gps, "latitude,longitude\n50.4,30.5\n").unwrap();

        let config = SourceConfig::new(&accelerometer, gps).with_batch_size(1);
        let mut source = open_source(config, manual_clock());
        assert!(matches!(source.read(), Err(Error::Decode { line: 2, .. })));

        fs::write(&accelerometer, "x,y,z\n1,2,3\n").unwrap();

        let batch = source.read().unwrap();
        assert_eq!(batch[0].accelerometer, MotionSample { x: 1, y: 2, z: 3 });
        assert_eq!(batch[0].gps.latitude, 50.4);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let dir = TempDir::new().unwrap();
        let accelerometer = dir.path().join("accelerometer.csv");
        let gps = dir.path().join("gps.csv");
        fs::write(
            &accelerometer,
            "timestamp,x,y,z\n2024-03-01T12:00:00Z,1,2,16384\n2024-03-01T12:00:01Z,4,5\n",
        )
        .unwrap();
        fs::write(&gps, "latitude,longitude,altitude\n50.4,30.5,180\n50.5,30.6,181\n").unwrap();

        let config = SourceConfig::new(accelerometer, gps).with_batch_size(2);
        let mut source = open_source(config, manual_clock());
        let batch = source.read().unwrap();

        // The short second row is skipped and the first row fills the batch
        assert_eq!(batch[0].accelerometer, MotionSample { x: 1, y: 2, z: 16384 });
        assert_eq!(batch[1].accelerometer, batch[0].accelerometer);
        assert_eq!(batch[0].gps.longitude, 30.5);
    }

    #[test]
    fn test_header_only_dataset_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = write_dataset(&dir, 0);
        let mut source = open_source(config, manual_clock());

        assert!(matches!(source.read(), Err(Error::EmptyDataset(_))));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let mut config = write_dataset(&dir, 3);
        config.gps_path = dir.path().join("missing.csv");

        let mut source = StreamSource::new(config);
        assert!(matches!(source.open(), Err(Error::SourceUnavailable { .. })));
        assert_eq!(source.state(), SourceState::Unopened);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = TempDir::new().unwrap();
        let config = write_dataset(&dir, 3).with_batch_size(0);

        let mut source = StreamSource::new(config);
        assert!(matches!(source.open(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_read_before_open_and_after_close() {
        let dir = TempDir::new().unwrap();
        let mut source = StreamSource::new(write_dataset(&dir, 3)).with_clock(manual_clock());
        assert!(matches!(source.read(), Err(Error::NotOpen)));

        source.open().unwrap();
        source.close();
        source.close();

        assert_eq!(source.state(), SourceState::Closed);
        assert!(matches!(source.read(), Err(Error::SourceClosed)));
        assert!(matches!(source.open(), Err(Error::SourceClosed)));
    }
}
