use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Textbook PID without windup protection, the caller clamps the output.
#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    integral: f32,
    last_error: f32,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            last_error: 0.0,
        }
    }

    /// `dt` is in seconds and must be non-zero, callers substitute a minimum
    /// dt before calling this
    pub fn process(&mut self, error: f32, dt: f32) -> f32 {
        self.integral += error * dt;
        let derivative = (error - self.last_error) / dt;
        self.last_error = error;

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}
