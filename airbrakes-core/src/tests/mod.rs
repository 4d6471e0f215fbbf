#[cfg(feature = "log")]
use log::LevelFilter;

use crate::{Actuator, MockServoDriver, ServoPosition, sample::Sample};

mod sim;

pub fn init_logger() {
    #[cfg(feature = "log")]
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .filter(Some("airbrakes_core"), LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub fn mock_actuator() -> (Actuator, ServoPosition) {
    let position = ServoPosition::new();
    let actuator = Actuator::new(MockServoDriver::new(position.clone(), 3.5, 11.5));
    (actuator, position)
}

/// Builds a flight profile at 100 Hz, one segment at a time.
#[derive(Debug, Default)]
pub struct FlightScript {
    samples: Vec<Sample>,
}

impl FlightScript {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_timestamp(&self) -> u64 {
        self.samples.len() as u64 * 10_000_000
    }

    /// `count` samples with a constant acceleration, altitude moving by
    /// `climb` per sample from the last altitude
    pub fn segment(mut self, count: usize, acceleration: f32, climb: f32) -> Self {
        let mut altitude = self.samples.last().map_or(0.0, |sample| sample.altitude);
        for _ in 0..count {
            altitude += climb;
            let sample = Sample::new(acceleration, self.next_timestamp(), altitude, 0.0);
            self.samples.push(sample);
        }
        self
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}
