use serde::{Deserialize, Serialize};

pub const NS_PER_S: f64 = 1e9;

/// One fused reading as seen by the flight state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// m/s^2 along the sensitive axis, already sign corrected for mounting
    pub acceleration: f32,
    /// sensor clock in ns, never wall clock
    pub timestamp: u64,
    /// m, same reference as the target apogee
    pub altitude: f32,
    /// m/s, vertical
    pub velocity: f32,
}

impl Sample {
    pub fn new(acceleration: f32, timestamp: u64, altitude: f32, velocity: f32) -> Self {
        Self {
            acceleration,
            timestamp,
            altitude,
            velocity,
        }
    }

    pub fn timestamp_s(&self) -> f64 {
        self.timestamp as f64 / NS_PER_S
    }
}

/// Every channel of one sensor packet, forwarded verbatim to the raw log.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub timestamp: u64,
    pub channels: Vec<(String, f64)>,
}

impl RawReading {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, value: f64) -> Self {
        self.channels.push((name.into(), value));
        self
    }

    pub fn channel(&self, name: &str) -> Option<f64> {
        self.channels
            .iter()
            .find(|(channel, _)| channel == name)
            .map(|(_, value)| *value)
    }
}

pub fn seconds_to_ns(seconds: f32) -> u64 {
    (seconds.max(0.0) as f64 * NS_PER_S) as u64
}
