use std::{fmt::Display, sync::Arc};

use serde::Serialize;

use crate::{
    actuator::Actuator,
    config::FlightConfig,
    estimator::{ApogeeEstimator, Estimate},
    fusion::SensorFusion,
    sample::{Sample, seconds_to_ns},
    telemetry::{FlightEvent, TelemetrySink},
};

mod control;
mod standby;

pub use control::{ControlOutcome, ControlPhase};
pub use standby::StandbyPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PhaseKind {
    Standby,
    Liftoff,
    Control,
    Freefall,
}

impl Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseKind::Standby => write!(f, "Standby"),
            PhaseKind::Liftoff => write!(f, "Liftoff"),
            PhaseKind::Control => write!(f, "Control"),
            PhaseKind::Freefall => write!(f, "Freefall"),
        }
    }
}

/// The live phase and the data only it owns, replaced wholesale on every
/// transition.
pub enum FlightPhase {
    Standby(StandbyPhase),
    Liftoff { entered_at: u64 },
    Control(ControlPhase),
    Freefall,
}

impl FlightPhase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            FlightPhase::Standby(_) => PhaseKind::Standby,
            FlightPhase::Liftoff { .. } => PhaseKind::Liftoff,
            FlightPhase::Control(_) => PhaseKind::Control,
            FlightPhase::Freefall => PhaseKind::Freefall,
        }
    }
}

pub struct FlightStateMachine {
    config: FlightConfig,
    estimator: Arc<dyn ApogeeEstimator>,
    actuator: Actuator,
    fusion: SensorFusion,
    telemetry: Box<dyn TelemetrySink>,
    burn_ns: u64,
    phase: FlightPhase,
}

impl FlightStateMachine {
    /// starts in standby with the airbrakes retracted
    pub fn new(
        config: FlightConfig,
        estimator: Arc<dyn ApogeeEstimator>,
        mut actuator: Actuator,
        mut telemetry: Box<dyn TelemetrySink>,
    ) -> Self {
        actuator.retract();
        telemetry.record(&FlightEvent::Transition {
            timestamp: 0,
            from: None,
            to: PhaseKind::Standby,
        });
        Self {
            fusion: SensorFusion::new(config.fusion.clone()),
            burn_ns: seconds_to_ns(config.motor_burn_s),
            phase: FlightPhase::Standby(StandbyPhase::new(&config.standby)),
            config,
            estimator,
            actuator,
            telemetry,
        }
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    /// processes one sample in the live phase, returns the new phase if
    /// the sample caused a transition
    pub fn process(&mut self, sample: Sample) -> Option<PhaseKind> {
        let fused = self.fusion.update(sample);
        let sample = fused.sample;
        self.telemetry.record(&FlightEvent::Sample {
            timestamp: sample.timestamp,
            phase: self.phase.kind(),
            acceleration: sample.acceleration,
            altitude: sample.altitude,
            velocity: sample.velocity,
            dt: fused.dt,
        });

        let next = match &mut self.phase {
            FlightPhase::Standby(standby) => {
                let average = standby.update(sample.acceleration);
                self.telemetry.record(&FlightEvent::Standby {
                    timestamp: sample.timestamp,
                    average_acceleration: average,
                });
                if standby.is_liftoff(average) {
                    log_info!(
                        "liftoff detected, average acceleration {} m/s^2",
                        average
                    );
                    Some(PhaseKind::Liftoff)
                } else {
                    None
                }
            }
            FlightPhase::Liftoff { entered_at } => {
                (sample.timestamp.saturating_sub(*entered_at) > self.burn_ns)
                    .then_some(PhaseKind::Control)
            }
            FlightPhase::Control(control) => {
                let outcome = control.update(&fused, &mut self.actuator);
                let (predicted_apogee, deploy) = match outcome.estimate {
                    Estimate::Apogee(apogee) => (Some(apogee), None),
                    Estimate::Deploy(deploy) => (None, Some(deploy)),
                };
                self.telemetry.record(&FlightEvent::Control {
                    timestamp: sample.timestamp,
                    predicted_apogee,
                    deploy,
                    command: outcome.command,
                    rolling_altitude: outcome.rolling_altitude,
                    guarded: outcome.guarded,
                });
                if outcome.apogee {
                    log_info!("apogee detected near {} m", outcome.rolling_altitude);
                    Some(PhaseKind::Freefall)
                } else {
                    None
                }
            }
            FlightPhase::Freefall => None,
        };

        if let Some(next) = next {
            self.transition_to(next, sample.timestamp);
        }
        next
    }

    /// replaces the live phase, running the entry action of the new one
    fn transition_to(&mut self, next: PhaseKind, timestamp: u64) {
        let from = self.phase.kind();
        self.phase = match next {
            PhaseKind::Standby => {
                self.actuator.retract();
                FlightPhase::Standby(StandbyPhase::new(&self.config.standby))
            }
            PhaseKind::Liftoff => FlightPhase::Liftoff {
                entered_at: timestamp,
            },
            PhaseKind::Control => {
                self.actuator.extend_fully();
                FlightPhase::Control(ControlPhase::new(
                    &self.config,
                    self.estimator.clone(),
                    timestamp,
                ))
            }
            PhaseKind::Freefall => {
                self.actuator.retract();
                FlightPhase::Freefall
            }
        };

        log_info!("[{}] {} -> {}", timestamp, from, next);
        self.telemetry.record(&FlightEvent::Transition {
            timestamp,
            from: Some(from),
            to: next,
        });
    }

    pub fn flush_telemetry(&mut self) {
        if let Err(e) = self.telemetry.flush() {
            log_warn!("failed to flush telemetry: {}", e);
        }
    }
}
