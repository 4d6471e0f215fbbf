use crate::{
    FlightError,
    config::SensorConfig,
    sample::{RawReading, Sample},
};

/// Builds samples out of raw channel readings, keeping the last value of
/// every consumed channel between packets.
#[derive(Debug, Clone)]
pub struct ChannelAssembler {
    acceleration_channel: String,
    altitude_channel: String,
    velocity_channel: Option<String>,
    invert_acceleration: bool,
    acceleration: Option<f32>,
    altitude: Option<f32>,
    velocity: f32,
}

impl ChannelAssembler {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            acceleration_channel: config.acceleration_channel.clone(),
            altitude_channel: config.altitude_channel.clone(),
            velocity_channel: config.velocity_channel.clone(),
            invert_acceleration: config.invert_acceleration,
            acceleration: None,
            altitude: None,
            velocity: 0.0,
        }
    }

    /// Ok(None) until both acceleration and altitude have been seen, or when
    /// the reading carries no consumed channel. A malformed value rejects the
    /// whole reading and keeps the previous values.
    pub fn assemble(&mut self, reading: &RawReading) -> Result<Option<Sample>, FlightError> {
        let acceleration = finite(reading, &self.acceleration_channel)?;
        let altitude = finite(reading, &self.altitude_channel)?;
        let velocity = match &self.velocity_channel {
            Some(channel) => finite(reading, channel)?,
            None => None,
        };

        if acceleration.is_none() && altitude.is_none() && velocity.is_none() {
            return Ok(None);
        }

        if let Some(acceleration) = acceleration {
            self.acceleration = Some(if self.invert_acceleration {
                -acceleration
            } else {
                acceleration
            });
        }
        if altitude.is_some() {
            self.altitude = altitude;
        }
        if let Some(velocity) = velocity {
            self.velocity = velocity;
        }

        match (self.acceleration, self.altitude) {
            (Some(acceleration), Some(altitude)) => Ok(Some(Sample::new(
                acceleration,
                reading.timestamp,
                altitude,
                self.velocity,
            ))),
            _ => Ok(None),
        }
    }
}

fn finite(reading: &RawReading, channel: &str) -> Result<Option<f32>, FlightError> {
    match reading.channel(channel) {
        Some(value) if !value.is_finite() || value.abs() > f32::MAX as f64 => {
            Err(FlightError::MalformedReading {
                channel: channel.into(),
                value,
            })
        }
        Some(value) => Ok(Some(value as f32)),
        None => Ok(None),
    }
}
