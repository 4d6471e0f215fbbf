use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use crate::DriverError;

/// Physical airbrake driver, takes a normalized position in 0-1.
pub trait ActuatorDriver: Send {
    fn set_position(&mut self, position: f32) -> Result<(), DriverError>;
}

/// Normalized airbrake extension command, 0 = retracted, 1 = fully extended.
pub struct Actuator {
    driver: Box<dyn ActuatorDriver>,
    command: f32,
}

impl Actuator {
    pub fn new(driver: impl ActuatorDriver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            command: 0.0,
        }
    }

    /// clamps to 0-1 and forwards to the driver, NaN retracts.
    /// driver errors are logged, never retried
    pub fn set_command(&mut self, command: f32) {
        let command = if command.is_nan() {
            log_warn!("NaN airbrakes command, retracting");
            0.0
        } else {
            command.clamp(0.0, 1.0)
        };

        self.command = command;
        if let Err(e) = self.driver.set_position(command) {
            log_warn!("failed to set airbrakes position {}: {}", command, e);
        }
    }

    pub fn command(&self) -> f32 {
        self.command
    }

    pub fn retract(&mut self) {
        self.set_command(0.0);
    }

    pub fn extend_fully(&mut self) {
        self.set_command(1.0);
    }
}

/// Lock free cell holding the last servo position, shared with the simulator.
#[derive(Debug, Clone, Default)]
pub struct ServoPosition(Arc<AtomicU32>);

impl ServoPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, position: f32) {
        self.0.store(position.to_bits(), Ordering::Release);
    }
}

/// Servo stand-in, records the position instead of driving a pwm pin.
pub struct MockServoDriver {
    position: ServoPosition,
    /// duty cycle % at 0 and 1
    closed_duty: f32,
    open_duty: f32,
}

impl MockServoDriver {
    pub fn new(position: ServoPosition, closed_duty: f32, open_duty: f32) -> Self {
        log_info!(
            "mock servo set up with closed duty {}%, open duty {}%",
            closed_duty,
            open_duty
        );
        Self {
            position,
            closed_duty,
            open_duty,
        }
    }

    pub fn duty_cycle(&self, position: f32) -> f32 {
        self.closed_duty * (1.0 - position) + self.open_duty * position
    }
}

impl ActuatorDriver for MockServoDriver {
    fn set_position(&mut self, position: f32) -> Result<(), DriverError> {
        log_trace!(
            "servo position {:.3}, duty cycle {:.2}%",
            position,
            self.duty_cycle(position)
        );
        self.position.set(position);
        Ok(())
    }
}
