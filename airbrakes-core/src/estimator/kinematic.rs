use crate::estimator::{ApogeeEstimator, Estimate, Kinematics};

/// Drag free projectile estimate.
#[derive(Debug, Clone)]
pub struct KinematicPredictor {
    gravity: f32,
}

impl KinematicPredictor {
    pub fn new(gravity: f32) -> Self {
        Self { gravity }
    }

    /// peak altitude of y = -g/2 t^2 + v t + altitude,
    /// at or past apogee (v <= 0) the current altitude is returned
    pub fn predict_apogee(&self, altitude: f32, velocity: f32) -> f32 {
        if velocity <= 0.0 {
            return altitude;
        }

        let a = -0.5 * self.gravity;
        let b = velocity;
        let c = altitude;

        let peak_time = -b / (2.0 * a);
        a * peak_time * peak_time + b * peak_time + c
    }
}

impl ApogeeEstimator for KinematicPredictor {
    fn estimate(&self, kinematics: &Kinematics) -> Estimate {
        Estimate::Apogee(self.predict_apogee(kinematics.altitude, kinematics.velocity))
    }

    fn name(&self) -> &'static str {
        "kinematic"
    }
}
