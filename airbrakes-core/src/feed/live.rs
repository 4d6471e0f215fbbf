use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    FlightError,
    config::SensorConfig,
    feed::{ChannelAssembler, RawSink, SampleHandoff, SensorDriver, SensorFeed},
    sample::{RawReading, Sample},
};

#[derive(Debug, Default)]
pub struct FeedStats {
    published: AtomicU64,
    overwritten: AtomicU64,
    malformed: AtomicU64,
    poll_errors: AtomicU64,
}

impl FeedStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// samples dropped unread because the flight loop fell behind
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn poll_errors(&self) -> u64 {
        self.poll_errors.load(Ordering::Relaxed)
    }
}

/// Polls a sensor driver on its own thread and hands the freshest samples to
/// the flight loop.
pub struct LiveFeed {
    handoff: Arc<SampleHandoff>,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    stats: Arc<FeedStats>,
    worker: Option<JoinHandle<Result<(), FlightError>>>,
}

impl LiveFeed {
    /// opens the driver and spawns the polling thread, the driver and sink
    /// are owned by that thread until `stop`
    pub fn start(
        mut driver: impl SensorDriver + 'static,
        config: &SensorConfig,
        sink: Option<Box<dyn RawSink>>,
    ) -> Result<Self, FlightError> {
        let device = driver.name().to_string();
        driver
            .open()
            .map_err(|e| FlightError::hardware(&device, e))?;
        log_info!("opened sensor {}", device);

        let handoff = Arc::new(SampleHandoff::new());
        let running = Arc::new(AtomicBool::new(true));
        let finished = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(FeedStats::default());

        let mut poller = Poller {
            driver,
            sink,
            assembler: ChannelAssembler::new(config),
            interval: Duration::from_millis(config.poll_interval_ms),
            handoff: handoff.clone(),
            stats: stats.clone(),
        };
        let worker = {
            let running = running.clone();
            let finished = finished.clone();
            thread::Builder::new()
                .name("sensor-feed".into())
                .spawn(move || {
                    poller.run(&running);
                    finished.store(true, Ordering::Release);
                    poller.close()
                })?
        };

        Ok(Self {
            handoff,
            running,
            finished,
            stats,
            worker: Some(worker),
        })
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }
}

impl SensorFeed for LiveFeed {
    fn poll_next(&mut self) -> Option<Sample> {
        self.handoff.take_latest()
    }

    fn is_exhausted(&self) -> bool {
        self.finished.load(Ordering::Acquire) && self.handoff.is_empty()
    }

    fn stop(&mut self) -> Result<(), FlightError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::Release);
        let result = worker
            .join()
            .map_err(|_| FlightError::Io(io::Error::other("sensor feed thread panicked")))?;
        log_info!(
            "sensor feed stopped, published {}, overwritten {}, malformed {}, poll errors {}",
            self.stats.published(),
            self.stats.overwritten(),
            self.stats.malformed(),
            self.stats.poll_errors()
        );
        result
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log_warn!("failed to stop sensor feed: {}", e);
        }
    }
}

struct Poller<D> {
    driver: D,
    sink: Option<Box<dyn RawSink>>,
    assembler: ChannelAssembler,
    interval: Duration,
    handoff: Arc<SampleHandoff>,
    stats: Arc<FeedStats>,
}

impl<D: SensorDriver> Poller<D> {
    fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::Acquire) {
            let started = Instant::now();
            match self.driver.poll(self.interval) {
                Ok(Some(readings)) => {
                    for reading in readings.iter() {
                        self.handle(reading);
                    }
                }
                Ok(None) => {
                    log_info!("sensor {} reached end of data", self.driver.name());
                    return;
                }
                Err(e) => {
                    self.stats.poll_errors.fetch_add(1, Ordering::Relaxed);
                    log_warn!("sensor poll failed: {}", e);
                }
            }

            // fixed rate even when the driver returns early
            let elapsed = started.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
    }

    fn handle(&mut self, reading: &RawReading) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write(reading) {
                log_warn!("failed to log raw reading: {}", e);
            }
        }

        match self.assembler.assemble(reading) {
            Ok(Some(sample)) => {
                if self.handoff.push(sample) {
                    self.stats.overwritten.fetch_add(1, Ordering::Relaxed);
                }
                self.stats.published.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                log_warn!("skipping reading at {}: {}", reading.timestamp, e);
            }
        }
    }

    fn close(mut self) -> Result<(), FlightError> {
        match self.sink.take() {
            Some(mut sink) => sink.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::DriverError;

    /// Plays back canned poll results, then reports end of data.
    struct ScriptedDriver {
        polls: Vec<Result<Option<Vec<RawReading>>, DriverError>>,
        fail_open: bool,
    }

    impl SensorDriver for ScriptedDriver {
        fn name(&self) -> &str {
            "scripted"
        }

        fn open(&mut self) -> Result<(), DriverError> {
            if self.fail_open {
                Err(DriverError::new("no such device"))
            } else {
                Ok(())
            }
        }

        fn poll(&mut self, _timeout: Duration) -> Result<Option<Vec<RawReading>>, DriverError> {
            if self.polls.is_empty() {
                return Ok(None);
            }
            self.polls.remove(0)
        }
    }

    /// Never ends, blocks for the whole timeout like a quiet device.
    struct IdleDriver;

    impl SensorDriver for IdleDriver {
        fn name(&self) -> &str {
            "idle"
        }

        fn open(&mut self) -> Result<(), DriverError> {
            Ok(())
        }

        fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<RawReading>>, DriverError> {
            thread::sleep(timeout);
            Ok(Some(vec![]))
        }
    }

    #[derive(Default)]
    struct SinkLog {
        written: Vec<u64>,
        closed: bool,
        written_after_close: bool,
    }

    struct RecordingSink(Arc<Mutex<SinkLog>>);

    impl RawSink for RecordingSink {
        fn write(&mut self, reading: &RawReading) -> Result<(), FlightError> {
            let mut log = self.0.lock().unwrap();
            if log.closed {
                log.written_after_close = true;
            }
            log.written.push(reading.timestamp);
            Ok(())
        }

        fn close(&mut self) -> Result<(), FlightError> {
            self.0.lock().unwrap().closed = true;
            Ok(())
        }
    }

    fn config() -> SensorConfig {
        SensorConfig {
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    fn reading(timestamp: u64, acceleration: f64, altitude: f64) -> RawReading {
        RawReading::new(timestamp)
            .with_channel("estLinearAccelX", acceleration)
            .with_channel("estPressureAlt", altitude)
    }

    fn wait_until_exhausted(feed: &mut LiveFeed) -> Vec<Sample> {
        let mut samples = Vec::new();
        while !feed.is_exhausted() {
            if let Some(sample) = feed.poll_next() {
                samples.push(sample);
            }
            thread::yield_now();
        }
        samples
    }

    #[test]
    fn open_failure_is_hardware_unavailable() {
        let driver = ScriptedDriver {
            polls: vec![],
            fail_open: true,
        };
        let result = LiveFeed::start(driver, &config(), None);
        assert!(matches!(
            result,
            Err(FlightError::HardwareUnavailable { .. })
        ));
    }

    #[test]
    fn poll_errors_and_malformed_readings_are_skipped() {
        let driver = ScriptedDriver {
            polls: vec![
                Ok(Some(vec![reading(1, 1.0, 10.0)])),
                Err(DriverError::new("serial timeout")),
                Ok(Some(vec![reading(2, f64::INFINITY, 11.0)])),
                Ok(Some(vec![reading(3, 1.0, 12.0)])),
            ],
            fail_open: false,
        };
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let mut feed =
            LiveFeed::start(driver, &config(), Some(Box::new(RecordingSink(log.clone())))).unwrap();

        let samples = wait_until_exhausted(&mut feed);
        feed.stop().unwrap();

        assert!(!samples.is_empty());
        assert_eq!(samples.last().unwrap().timestamp, 3);
        assert!(samples.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
        assert_eq!(feed.stats().published(), 2);
        assert_eq!(feed.stats().malformed(), 1);
        assert_eq!(feed.stats().poll_errors(), 1);

        let log = log.lock().unwrap();
        // the malformed reading is still logged
        assert_eq!(log.written, vec![1, 2, 3]);
        assert!(log.closed);
    }

    #[test]
    fn stop_joins_and_closes_sink() {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let mut feed =
            LiveFeed::start(IdleDriver, &config(), Some(Box::new(RecordingSink(log.clone())))).unwrap();
        thread::sleep(Duration::from_millis(20));
        feed.stop().unwrap();

        let log = log.lock().unwrap();
        assert!(log.closed);
        assert!(!log.written_after_close);
        assert!(feed.is_exhausted());
        // stopping twice is fine
        drop(log);
        assert!(feed.stop().is_ok());
    }
}
