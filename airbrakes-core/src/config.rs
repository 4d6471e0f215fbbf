use serde::{Deserialize, Serialize};

use crate::{FlightError, pid::PidGains};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// m, same reference as the altitude channel
    pub target_apogee: f32,
    /// time from liftoff detection to control start
    pub motor_burn_s: f32,
    pub gravity: f32,
    pub standby: StandbyConfig,
    pub control: ControlConfig,
    pub fusion: FusionConfig,
    pub sensor: SensorConfig,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            target_apogee: 950.0,
            motor_burn_s: 1.7,
            gravity: 9.81,
            standby: StandbyConfig::default(),
            control: ControlConfig::default(),
            fusion: FusionConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandbyConfig {
    /// number of accelerations in the liftoff rolling average
    pub window: usize,
    /// m/s^2, compared against the absolute rolling average
    pub acceleration_threshold: f32,
}

impl Default for StandbyConfig {
    fn default() -> Self {
        Self {
            window: 250,
            acceleration_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// airbrakes stay fully extended for this long after control starts
    pub min_deploy_s: f32,
    /// number of altitudes in the apogee rolling average
    pub altitude_window: usize,
    /// consecutive samples without a new rolling maximum before apogee
    pub apogee_confirm_samples: u32,
    pub pid: PidGains,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_deploy_s: 0.5,
            altitude_window: 10,
            apogee_confirm_samples: 10,
            pid: PidGains {
                kp: 1.0,
                ki: 0.0,
                kd: 0.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocitySource {
    /// integrate the acceleration channel
    Acceleration,
    /// differentiate the altitude channel
    Altitude,
    /// use the velocity reported in the sample
    Sensor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub velocity_source: VelocitySource,
    /// integrated velocity below this magnitude snaps to zero
    pub velocity_noise_floor: f32,
    /// substituted for zero or negative time deltas
    pub min_dt_s: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            velocity_source: VelocitySource::Acceleration,
            velocity_noise_floor: 0.001,
            min_dt_s: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub acceleration_channel: String,
    pub altitude_channel: String,
    pub velocity_channel: Option<String>,
    /// set when the imu is mounted upside down
    pub invert_acceleration: bool,
    pub poll_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            acceleration_channel: "estLinearAccelX".into(),
            altitude_channel: "estPressureAlt".into(),
            velocity_channel: None,
            invert_acceleration: true,
            poll_interval_ms: 10,
        }
    }
}

impl FlightConfig {
    pub fn validate(&self) -> Result<(), FlightError> {
        let finite = [
            ("target_apogee", self.target_apogee),
            ("motor_burn_s", self.motor_burn_s),
            ("gravity", self.gravity),
            ("standby.acceleration_threshold", self.standby.acceleration_threshold),
            ("control.min_deploy_s", self.control.min_deploy_s),
            ("control.pid.kp", self.control.pid.kp),
            ("control.pid.ki", self.control.pid.ki),
            ("control.pid.kd", self.control.pid.kd),
            ("fusion.velocity_noise_floor", self.fusion.velocity_noise_floor),
            ("fusion.min_dt_s", self.fusion.min_dt_s),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, value)| !value.is_finite()) {
            return Err(FlightError::Config(format!("{name} must be finite, got {value}")));
        }

        if self.motor_burn_s < 0.0 || self.control.min_deploy_s < 0.0 {
            return Err(FlightError::Config("durations must not be negative".into()));
        }
        if self.gravity <= 0.0 {
            return Err(FlightError::Config("gravity must be positive".into()));
        }
        if self.fusion.min_dt_s <= 0.0 {
            return Err(FlightError::Config("fusion.min_dt_s must be positive".into()));
        }
        if self.standby.window == 0 || self.control.altitude_window == 0 {
            return Err(FlightError::Config("rolling windows must not be empty".into()));
        }
        if self.control.apogee_confirm_samples == 0 {
            return Err(FlightError::Config(
                "control.apogee_confirm_samples must be at least 1".into(),
            ));
        }
        if self.sensor.poll_interval_ms == 0 {
            return Err(FlightError::Config("sensor.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(FlightConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_window() {
        let mut config = FlightConfig::default();
        config.standby.window = 0;
        assert!(matches!(config.validate(), Err(FlightError::Config(_))));
    }

    #[test]
    fn rejects_non_finite_target() {
        let config = FlightConfig {
            target_apogee: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FlightError::Config(_))));
    }
}
