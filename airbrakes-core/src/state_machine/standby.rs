use crate::{config::StandbyConfig, rolling::RollingWindow};

/// Waits on the pad for the rolling acceleration average to cross the
/// liftoff threshold.
#[derive(Debug, Clone)]
pub struct StandbyPhase {
    accelerations: RollingWindow,
    threshold: f32,
}

impl StandbyPhase {
    pub fn new(config: &StandbyConfig) -> Self {
        Self {
            accelerations: RollingWindow::new(config.window),
            threshold: config.acceleration_threshold,
        }
    }

    /// returns the new rolling average
    pub fn update(&mut self, acceleration: f32) -> f32 {
        self.accelerations.push(acceleration);
        self.accelerations.average()
    }

    /// mounting decides the sign of the liftoff acceleration
    pub fn is_liftoff(&self, average: f32) -> bool {
        average.abs() >= self.threshold
    }
}
