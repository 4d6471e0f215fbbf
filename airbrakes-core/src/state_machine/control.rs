use std::sync::Arc;

use crate::{
    actuator::Actuator,
    config::FlightConfig,
    estimator::{ApogeeEstimator, Estimate, Kinematics},
    fusion::FusedSample,
    pid::Pid,
    rolling::RollingWindow,
    sample::seconds_to_ns,
};

/// What the control phase did with one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutcome {
    pub estimate: Estimate,
    /// command sent to the actuator after the guard and clamping
    pub command: f32,
    pub guarded: bool,
    pub rolling_altitude: f32,
    pub apogee: bool,
}

/// Rolling maximum of the altitude average, apogee is declared after
/// `confirm_samples` consecutive samples without a new maximum.
#[derive(Debug, Clone)]
struct ApogeeDetector {
    altitudes: RollingWindow,
    max_average: f32,
    stale_samples: u32,
    confirm_samples: u32,
}

impl ApogeeDetector {
    fn new(window: usize, confirm_samples: u32) -> Self {
        Self {
            altitudes: RollingWindow::new(window),
            max_average: f32::NEG_INFINITY,
            stale_samples: 0,
            confirm_samples,
        }
    }

    /// returns (rolling average, apogee reached)
    fn update(&mut self, altitude: f32) -> (f32, bool) {
        self.altitudes.push(altitude);
        let average = self.altitudes.filled_average().unwrap_or(altitude);

        if average > self.max_average {
            self.max_average = average;
            self.stale_samples = 0;
        } else {
            self.stale_samples += 1;
        }

        (average, self.stale_samples >= self.confirm_samples)
    }
}

/// Steers toward the target apogee with the configured estimator.
pub struct ControlPhase {
    estimator: Arc<dyn ApogeeEstimator>,
    pid: Pid,
    target_apogee: f32,
    entered_at: u64,
    min_deploy_ns: u64,
    detector: ApogeeDetector,
}

impl ControlPhase {
    pub fn new(config: &FlightConfig, estimator: Arc<dyn ApogeeEstimator>, entered_at: u64) -> Self {
        Self {
            estimator,
            pid: Pid::new(config.control.pid),
            target_apogee: config.target_apogee,
            entered_at,
            min_deploy_ns: seconds_to_ns(config.control.min_deploy_s),
            detector: ApogeeDetector::new(
                config.control.altitude_window,
                config.control.apogee_confirm_samples,
            ),
        }
    }

    pub fn update(&mut self, fused: &FusedSample, actuator: &mut Actuator) -> ControlOutcome {
        let sample = fused.sample;
        let estimate = self.estimator.estimate(&Kinematics {
            altitude: sample.altitude,
            velocity: sample.velocity,
            extension: actuator.command(),
        });

        let requested = match estimate {
            // overshooting gives a positive error, which extends the brakes
            Estimate::Apogee(apogee) => self
                .pid
                .process(apogee - self.target_apogee, fused.dt)
                .clamp(0.0, 1.0),
            Estimate::Deploy(true) => 1.0,
            Estimate::Deploy(false) => 0.0,
        };

        let guarded = sample.timestamp.saturating_sub(self.entered_at) < self.min_deploy_ns;
        let command = if guarded { 1.0 } else { requested };
        actuator.set_command(command);

        let (rolling_altitude, apogee) = self.detector.update(sample.altitude);
        ControlOutcome {
            estimate,
            command: actuator.command(),
            guarded,
            rolling_altitude,
            apogee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actuator::{ActuatorDriver, MockServoDriver, ServoPosition},
        estimator::KinematicPredictor,
        pid::PidGains,
        sample::Sample,
    };

    struct Fixed(Estimate);

    impl ApogeeEstimator for Fixed {
        fn estimate(&self, _kinematics: &Kinematics) -> Estimate {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn actuator() -> (Actuator, ServoPosition) {
        let position = ServoPosition::new();
        let driver = MockServoDriver::new(position.clone(), 3.5, 11.5);
        (Actuator::new(driver), position)
    }

    fn fused(timestamp: u64, altitude: f32, velocity: f32) -> FusedSample {
        FusedSample {
            sample: Sample::new(0.0, timestamp, altitude, velocity),
            dt: 0.01,
        }
    }

    #[test]
    fn guard_holds_full_extension() {
        let config = FlightConfig::default();
        let mut control = ControlPhase::new(&config, Arc::new(Fixed(Estimate::Deploy(false))), 1_000);
        let (mut actuator, position) = actuator();

        let outcome = control.update(&fused(1_000 + 400_000_000, 100.0, 80.0), &mut actuator);
        assert!(outcome.guarded);
        assert_eq!(outcome.command, 1.0);
        assert_eq!(position.get(), 1.0);

        let outcome = control.update(&fused(1_000 + 500_000_000, 101.0, 80.0), &mut actuator);
        assert!(!outcome.guarded);
        assert_eq!(outcome.command, 0.0);
        assert_eq!(position.get(), 0.0);
    }

    #[test]
    fn pid_output_is_clamped() {
        let mut config = FlightConfig::default();
        config.control.min_deploy_s = 0.0;
        config.control.pid = PidGains {
            kp: 0.01,
            ki: 0.0,
            kd: 0.0,
        };
        config.target_apogee = 500.0;
        let (mut actuator, _) = actuator();

        let mut control = ControlPhase::new(&config, Arc::new(Fixed(Estimate::Apogee(550.0))), 0);
        let outcome = control.update(&fused(10, 100.0, 80.0), &mut actuator);
        assert!((outcome.command - 0.5).abs() < 1e-6);

        let mut control = ControlPhase::new(&config, Arc::new(Fixed(Estimate::Apogee(900.0))), 0);
        assert_eq!(control.update(&fused(10, 100.0, 80.0), &mut actuator).command, 1.0);

        let mut control = ControlPhase::new(&config, Arc::new(Fixed(Estimate::Apogee(100.0))), 0);
        assert_eq!(control.update(&fused(10, 100.0, 80.0), &mut actuator).command, 0.0);
    }

    #[test]
    fn estimator_sees_current_extension() {
        struct Echo;
        impl ApogeeEstimator for Echo {
            fn estimate(&self, kinematics: &Kinematics) -> Estimate {
                Estimate::Apogee(kinematics.extension)
            }

            fn name(&self) -> &'static str {
                "echo"
            }
        }

        let config = FlightConfig::default();
        let (mut actuator, _) = actuator();
        actuator.set_command(0.25);
        let mut control = ControlPhase::new(&config, Arc::new(Echo), 0);
        let outcome = control.update(&fused(0, 0.0, 0.0), &mut actuator);
        assert_eq!(outcome.estimate, Estimate::Apogee(0.25));
    }

    #[test]
    fn apogee_after_consecutive_non_improvement() {
        let mut config = FlightConfig::default();
        config.control.altitude_window = 3;
        config.control.apogee_confirm_samples = 4;
        let (mut actuator, _) = actuator();
        let estimator = Arc::new(KinematicPredictor::new(config.gravity));
        let mut control = ControlPhase::new(&config, estimator, 0);

        let mut timestamp = 0;
        let mut step = |control: &mut ControlPhase, altitude: f32| {
            timestamp += 10_000_000;
            control.update(&fused(timestamp, altitude, 0.0), &mut actuator)
        };

        for altitude in [100.0, 110.0, 120.0, 130.0] {
            assert!(!step(&mut control, altitude).apogee);
        }
        // a single new maximum resets the count
        for altitude in [125.0, 120.0, 140.0] {
            assert!(!step(&mut control, altitude).apogee);
        }
        for _ in 0..3 {
            assert!(!step(&mut control, 100.0).apogee);
        }
        assert!(step(&mut control, 100.0).apogee);
    }

    #[test]
    fn nan_estimate_retracts() {
        let mut config = FlightConfig::default();
        config.control.min_deploy_s = 0.0;
        let (mut actuator, _) = actuator();
        let mut control = ControlPhase::new(&config, Arc::new(Fixed(Estimate::Apogee(f32::NAN))), 0);
        let outcome = control.update(&fused(10, 100.0, 80.0), &mut actuator);
        assert_eq!(outcome.command, 0.0);
    }

    #[test]
    fn broken_driver_does_not_stop_control() {
        struct Broken;
        impl ActuatorDriver for Broken {
            fn set_position(&mut self, _position: f32) -> Result<(), crate::DriverError> {
                Err(crate::DriverError::new("pwm gone"))
            }
        }

        let config = FlightConfig::default();
        let mut actuator = Actuator::new(Broken);
        let mut control = ControlPhase::new(&config, Arc::new(Fixed(Estimate::Deploy(true))), 0);
        let outcome = control.update(&fused(0, 10.0, 10.0), &mut actuator);
        assert_eq!(outcome.command, 1.0);
        assert_eq!(actuator.command(), 1.0);
    }
}
