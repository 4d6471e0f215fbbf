use std::time::Duration;

use crate::{
    DriverError, FlightError,
    sample::{RawReading, Sample},
};

mod channels;
mod handoff;
mod live;
mod lockstep;
mod raw_log;
mod replay;

pub use channels::ChannelAssembler;
pub use handoff::{HANDOFF_CAPACITY, SampleHandoff};
pub use live::{FeedStats, LiveFeed};
pub use lockstep::{LockstepFeed, SampleSender};
pub use raw_log::CsvRawSink;
pub use replay::CsvReplayDriver;

/// Source of samples for the flight loop.
pub trait SensorFeed {
    /// freshest unread sample, None if nothing arrived since the last call
    fn poll_next(&mut self) -> Option<Sample>;

    /// the producer signalled end of data and every sample was handed out
    fn is_exhausted(&self) -> bool;

    /// stops the producer and waits for it to exit, sinks are closed before
    /// this returns
    fn stop(&mut self) -> Result<(), FlightError>;
}

/// Inertial sensor driver boundary.
pub trait SensorDriver: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), DriverError>;

    /// waits up to `timeout` for new readings, Ok(None) once the device will
    /// never produce data again
    fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<RawReading>>, DriverError>;
}

/// Receives every raw reading, usable or not.
pub trait RawSink: Send {
    fn write(&mut self, reading: &RawReading) -> Result<(), FlightError>;

    fn close(&mut self) -> Result<(), FlightError>;
}
