use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{DriverError, feed::SensorDriver, sample::RawReading};

/// Sensor driver playing back a raw log written by `CsvRawSink`. The first
/// column is the timestamp in ns, every other column is a channel.
pub struct CsvReplayDriver {
    path: PathBuf,
    name: String,
    skipped: u64,
    reader: Option<csv::Reader<File>>,
    channels: Vec<String>,
    readings_per_poll: usize,
}

impl CsvReplayDriver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: path.as_ref().display().to_string(),
            skipped: 0,
            reader: None,
            channels: Vec::new(),
            readings_per_poll: 1,
        }
    }

    pub fn with_readings_per_poll(mut self, readings_per_poll: usize) -> Self {
        self.readings_per_poll = readings_per_poll.max(1);
        self
    }

    /// records skipped for a bad timestamp or an unreadable row
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl SensorDriver for CsvReplayDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), DriverError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| DriverError::new(format!("{}: {e}", self.name)))?;
        let headers = reader
            .headers()
            .map_err(|e| DriverError::new(format!("{}: {e}", self.name)))?;
        if headers.len() < 2 {
            return Err(DriverError::new(format!(
                "{} needs a timestamp column and at least one channel",
                self.name
            )));
        }
        self.channels = headers.iter().skip(1).map(String::from).collect();
        self.reader = Some(reader);
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<Option<Vec<RawReading>>, DriverError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(DriverError::new(format!("{} is not open", self.name)));
        };

        let mut readings = Vec::with_capacity(self.readings_per_poll);
        let mut record = csv::StringRecord::new();
        while readings.len() < self.readings_per_poll {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_io_error() => {
                    // hand out what was read, the error shows up again on the next poll
                    if readings.is_empty() {
                        return Err(DriverError::new(format!("{}: {e}", self.name)));
                    }
                    log_warn!(
                        "{}: read failed after {} readings: {}",
                        self.name,
                        readings.len(),
                        e
                    );
                    break;
                }
                Err(e) => {
                    self.skipped += 1;
                    log_warn!("{}: skipping unreadable record: {}", self.name, e);
                    continue;
                }
            }

            let Some(timestamp) = record.get(0).and_then(|value| value.parse::<u64>().ok()) else {
                self.skipped += 1;
                log_warn!(
                    "{}: skipping record on line {:?} with bad timestamp {:?}",
                    self.name,
                    record.position().map(|p| p.line()),
                    record.get(0)
                );
                continue;
            };
            let mut reading = RawReading::new(timestamp);
            for (channel, value) in self.channels.iter().zip(record.iter().skip(1)) {
                if value.is_empty() {
                    continue;
                }
                // unparsable values are passed on as NaN and rejected downstream
                reading = reading.with_channel(channel.clone(), value.parse().unwrap_or(f64::NAN));
            }
            readings.push(reading);
        }

        if readings.is_empty() {
            Ok(None)
        } else {
            Ok(Some(readings))
        }
    }
}
