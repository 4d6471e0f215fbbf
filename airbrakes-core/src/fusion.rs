use crate::{
    FlightError,
    config::{FusionConfig, VelocitySource},
    sample::{NS_PER_S, Sample},
};

/// A sample with monotonic timestamp and fused velocity, plus the time step
/// since the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedSample {
    pub sample: Sample,
    /// seconds, never zero or negative
    pub dt: f32,
}

/// Turns the raw sample stream into monotonic, velocity carrying samples.
#[derive(Debug, Clone)]
pub struct SensorFusion {
    config: FusionConfig,
    last: Option<Sample>,
    velocity: f32,
}

impl SensorFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            last: None,
            velocity: 0.0,
        }
    }

    pub fn update(&mut self, sample: Sample) -> FusedSample {
        let mut sample = sample;

        let Some(last) = self.last else {
            if self.config.velocity_source == VelocitySource::Sensor {
                self.velocity = sample.velocity;
            }
            sample.velocity = self.velocity;
            self.last = Some(sample);
            return FusedSample {
                sample,
                dt: self.config.min_dt_s,
            };
        };

        if sample.timestamp <= last.timestamp {
            log_warn!(
                "{}, using dt of {}s",
                FlightError::TimingAnomaly {
                    previous_ns: last.timestamp,
                    current_ns: sample.timestamp,
                },
                self.config.min_dt_s
            );
            sample.timestamp = last.timestamp;
        }

        let elapsed_ns = sample.timestamp - last.timestamp;
        let dt = if elapsed_ns == 0 {
            self.config.min_dt_s
        } else {
            (elapsed_ns as f64 / NS_PER_S) as f32
        };

        self.velocity = match self.config.velocity_source {
            VelocitySource::Acceleration => {
                let velocity = self.velocity + sample.acceleration * dt;
                if velocity.abs() < self.config.velocity_noise_floor {
                    0.0
                } else {
                    velocity
                }
            }
            VelocitySource::Altitude => (sample.altitude - last.altitude) / dt,
            VelocitySource::Sensor => sample.velocity,
        };
        sample.velocity = self.velocity;

        self.last = Some(sample);
        FusedSample { sample, dt }
    }
}
