use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{FlightError, feed::RawSink, sample::RawReading};

type OpenLog<W> = Box<dyn FnMut(usize) -> Result<W, FlightError> + Send>;

/// Raw reading logs, one csv per distinct channel set. A log gets its header
/// from the first reading carrying that set of channels, so every reading is
/// kept whole and each log can be replayed on its own.
pub struct CsvRawSink<W: Write + Send + 'static> {
    open_log: OpenLog<W>,
    logs: Vec<ChannelLog<W>>,
}

struct ChannelLog<W: Write> {
    channels: Vec<String>,
    writer: csv::Writer<W>,
}

impl<W: Write> ChannelLog<W> {
    fn matches(&self, reading: &RawReading) -> bool {
        self.channels.len() == reading.channels.len()
            && reading
                .channels
                .iter()
                .all(|(name, _)| self.channels.contains(name))
    }
}

impl CsvRawSink<File> {
    /// the first channel set goes to `path`, later ones to `<stem>-<n>.<ext>`
    /// next to it
    pub fn create(path: impl AsRef<Path>) -> Result<Self, FlightError> {
        let path = path.as_ref().to_path_buf();
        let mut first = Some(File::create(&path)?);
        Ok(Self::new(move |index| match first.take() {
            Some(file) => Ok(file),
            None => Ok(File::create(numbered_log_path(&path, index))?),
        }))
    }
}

impl<W: Write + Send + 'static> CsvRawSink<W> {
    /// `open_log` is called with 0, 1, ... each time a new channel set shows up
    pub fn new(open_log: impl FnMut(usize) -> Result<W, FlightError> + Send + 'static) -> Self {
        Self {
            open_log: Box::new(open_log),
            logs: Vec::new(),
        }
    }

    fn open_channel_log(&mut self, reading: &RawReading) -> Result<usize, FlightError> {
        let index = self.logs.len();
        let channels: Vec<String> = reading.channels.iter().map(|(name, _)| name.clone()).collect();

        let mut writer = csv::Writer::from_writer((self.open_log)(index)?);
        writer.write_record(std::iter::once("timestamp").chain(channels.iter().map(String::as_str)))?;
        log_info!("raw log {} records {:?}", index, channels);

        self.logs.push(ChannelLog { channels, writer });
        Ok(index)
    }
}

impl<W: Write + Send + 'static> RawSink for CsvRawSink<W> {
    fn write(&mut self, reading: &RawReading) -> Result<(), FlightError> {
        let index = match self.logs.iter().position(|log| log.matches(reading)) {
            Some(index) => index,
            None => self.open_channel_log(reading)?,
        };
        let log = &mut self.logs[index];

        let mut record = Vec::with_capacity(log.channels.len() + 1);
        record.push(reading.timestamp.to_string());
        record.extend(log.channels.iter().map(|channel| {
            reading
                .channel(channel)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));

        log.writer.write_record(&record)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), FlightError> {
        for log in self.logs.iter_mut() {
            log.writer.flush()?;
        }
        Ok(())
    }
}

fn numbered_log_path(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raw".into());
    let name = match path.extension() {
        Some(extension) => format!("{stem}-{index}.{}", extension.to_string_lossy()),
        None => format!("{stem}-{index}"),
    };
    path.with_file_name(name)
}
