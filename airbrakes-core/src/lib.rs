mod fmt;

pub mod actuator;
pub mod config;
mod error;
pub mod estimator;
pub mod feed;
pub mod flight_loop;
pub mod fusion;
pub mod pid;
pub mod rolling;
pub mod sample;
pub mod simulation;
pub mod state_machine;
pub mod telemetry;
mod utils;

pub use actuator::{Actuator, ActuatorDriver, MockServoDriver, ServoPosition};
pub use config::FlightConfig;
pub use error::{DriverError, FlightError};
pub use estimator::{ApogeeEstimator, Estimate, EstimatorKind, build_estimator};
pub use feed::{LiveFeed, LockstepFeed, SensorDriver, SensorFeed};
pub use flight_loop::{FlightLoop, FlightSummary, Termination};
pub use sample::Sample;
pub use state_machine::{FlightStateMachine, PhaseKind};
pub use utils::{approximate_air_density, lerp, linearly_interpolate};

#[cfg(test)]
mod tests;
