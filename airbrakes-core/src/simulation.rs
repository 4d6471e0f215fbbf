use serde::{Deserialize, Serialize};

use crate::{
    FlightError,
    actuator::ServoPosition,
    sample::{NS_PER_S, Sample},
    utils::{approximate_air_density, lerp},
};

const GRAVITY: f32 = 9.81;

/// Point mass rocket flying straight up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RocketModel {
    /// kg, constant over the flight
    pub mass: f32,
    /// N, constant while the motor burns
    pub thrust: f32,
    pub burn_s: f32,
    /// m^2
    pub reference_area: f32,
    /// drag coefficient at evenly spaced extensions from 0 to 1
    pub cd: [f32; 5],
    /// only used for air density
    pub launch_altitude_asl: f32,
    /// time on the pad before ignition
    pub pad_time_s: f32,
    /// time simulated after apogee
    pub post_apogee_s: f32,
    pub sample_rate_hz: f32,
}

impl Default for RocketModel {
    fn default() -> Self {
        Self {
            mass: 20.0,
            thrust: 2000.0,
            burn_s: 1.7,
            reference_area: 0.0136,
            cd: [0.5, 0.65, 0.8, 0.95, 1.1],
            launch_altitude_asl: 250.0,
            pad_time_s: 3.0,
            post_apogee_s: 2.0,
            sample_rate_hz: 100.0,
        }
    }
}

impl RocketModel {
    pub fn validate(&self) -> Result<(), FlightError> {
        let finite = [
            ("simulation.mass", self.mass),
            ("simulation.thrust", self.thrust),
            ("simulation.burn_s", self.burn_s),
            ("simulation.reference_area", self.reference_area),
            ("simulation.launch_altitude_asl", self.launch_altitude_asl),
            ("simulation.pad_time_s", self.pad_time_s),
            ("simulation.post_apogee_s", self.post_apogee_s),
            ("simulation.sample_rate_hz", self.sample_rate_hz),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, value)| !value.is_finite()) {
            return Err(FlightError::Config(format!("{name} must be finite, got {value}")));
        }
        if let Some(cd) = self.cd.iter().find(|cd| !cd.is_finite() || **cd < 0.0) {
            return Err(FlightError::Config(format!(
                "simulation.cd must be finite and not negative, got {cd}"
            )));
        }

        if self.mass <= 0.0 {
            return Err(FlightError::Config("simulation.mass must be positive".into()));
        }
        // at least one ns per step
        if self.sample_rate_hz <= 0.0 || self.sample_rate_hz as f64 > NS_PER_S {
            return Err(FlightError::Config(format!(
                "simulation.sample_rate_hz must be in (0, {NS_PER_S}], got {}",
                self.sample_rate_hz
            )));
        }
        if self.burn_s <= 0.0 || self.pad_time_s < 0.0 || self.post_apogee_s < 0.0 {
            return Err(FlightError::Config(
                "simulation durations must not be negative and burn_s must be positive".into(),
            ));
        }
        if self.reference_area < 0.0 {
            return Err(FlightError::Config(
                "simulation.reference_area must not be negative".into(),
            ));
        }
        // a motor that can not lift off would keep the simulation on the pad forever
        if self.thrust <= self.mass * GRAVITY {
            return Err(FlightError::Config(format!(
                "simulation.thrust {} N can not lift {} kg",
                self.thrust, self.mass
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    altitude: f32,
    velocity: f32,
}

struct Derivative(State);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationReport {
    pub apogee: f32,
    pub samples: u64,
    /// false when the consumer stopped the simulation early
    pub completed: bool,
}

/// Flies a `RocketModel` with RK2, reading the airbrakes extension from the
/// servo every step.
pub struct FlightSimulator {
    model: RocketModel,
    servo: ServoPosition,
}

impl FlightSimulator {
    pub fn new(model: RocketModel, servo: ServoPosition) -> Result<Self, FlightError> {
        model.validate()?;
        Ok(Self { model, servo })
    }

    /// `time` is seconds since ignition, negative on the pad
    fn derivatives(&self, time: f32, extension: f32, state: &State) -> Derivative {
        let thrust = if (0.0..self.model.burn_s).contains(&time) {
            self.model.thrust
        } else {
            0.0
        };

        let air_density = approximate_air_density(self.model.launch_altitude_asl + state.altitude);
        let cd = lerp(extension.clamp(0.0, 1.0), &self.model.cd);
        let drag = 0.5 * cd * air_density * state.velocity * state.velocity.abs() * self.model.reference_area;
        let mut acceleration = (thrust - drag) / self.model.mass - GRAVITY;

        // resting on the pad
        if state.altitude <= 0.0 && state.velocity <= 0.0 && acceleration < 0.0 {
            acceleration = 0.0;
        }

        Derivative(State {
            altitude: state.velocity,
            velocity: acceleration,
        })
    }

    /// emits one sample per step until `post_apogee_s` after apogee or until
    /// `emit` returns false
    pub fn run(&self, mut emit: impl FnMut(Sample) -> bool) -> SimulationReport {
        let dt = 1.0 / self.model.sample_rate_hz;
        let dt_ns = (NS_PER_S / self.model.sample_rate_hz as f64) as u64;

        let mut state = State {
            altitude: 0.0,
            velocity: 0.0,
        };
        let mut step: u64 = 0;
        let mut apogee = 0.0f32;
        let mut apogee_time: Option<f32> = None;

        log_info!(
            "simulating {} kg rocket, {} N for {} s",
            self.model.mass,
            self.model.thrust,
            self.model.burn_s
        );

        loop {
            let time = step as f32 * dt - self.model.pad_time_s;
            let extension = self.servo.get();

            let Derivative(k1) = self.derivatives(time, extension, &state);
            let sample = Sample::new(
                k1.velocity,
                step.saturating_mul(dt_ns),
                state.altitude,
                state.velocity,
            );
            if !emit(sample) {
                log_info!("simulation stopped by consumer at {} s", time);
                return SimulationReport {
                    apogee,
                    samples: step,
                    completed: false,
                };
            }

            // RK2 midpoint
            let mid_state = State {
                altitude: state.altitude + k1.altitude * (0.5 * dt),
                velocity: state.velocity + k1.velocity * (0.5 * dt),
            };
            let Derivative(k2) = self.derivatives(time + 0.5 * dt, extension, &mid_state);
            let mut next_state = State {
                altitude: state.altitude + k2.altitude * dt,
                velocity: state.velocity + k2.velocity * dt,
            };
            if next_state.altitude < 0.0 {
                next_state = State {
                    altitude: 0.0,
                    velocity: 0.0,
                };
            }

            if next_state.altitude > apogee {
                apogee = next_state.altitude;
            }
            if apogee_time.is_none() && time > 0.0 && state.velocity > 0.0 && next_state.velocity <= 0.0 {
                log_info!("simulated apogee {} m at {} s", apogee, time);
                apogee_time = Some(time);
            }

            state = next_state;
            step += 1;

            let landed = time > self.model.burn_s && state.altitude <= 0.0;
            let done = apogee_time.is_some_and(|at| time - at >= self.model.post_apogee_s);
            if landed || done {
                return SimulationReport {
                    apogee,
                    samples: step,
                    completed: true,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sits_on_pad_until_ignition() {
        let model = RocketModel {
            pad_time_s: 1.0,
            ..Default::default()
        };
        let simulator = FlightSimulator::new(model, ServoPosition::new()).unwrap();
        let mut samples = Vec::new();
        simulator.run(|sample| {
            samples.push(sample);
            samples.len() < 100
        });
        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|sample| sample.altitude == 0.0 && sample.acceleration == 0.0));
        assert_eq!(samples[99].timestamp, 990_000_000);
    }

    #[test]
    fn extended_brakes_lower_apogee() {
        let retracted = FlightSimulator::new(RocketModel::default(), ServoPosition::new())
            .unwrap()
            .run(|_| true);

        let servo = ServoPosition::new();
        servo.set(1.0);
        let extended = FlightSimulator::new(RocketModel::default(), servo)
            .unwrap()
            .run(|_| true);

        assert!(retracted.completed && extended.completed);
        assert!(retracted.apogee > 500.0);
        assert!(extended.apogee < retracted.apogee - 50.0);
    }

    #[test]
    fn rejects_unusable_models() {
        let zero_rate = RocketModel {
            sample_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            FlightSimulator::new(zero_rate, ServoPosition::new()),
            Err(FlightError::Config(_))
        ));

        for model in [
            RocketModel {
                sample_rate_hz: f32::NAN,
                ..Default::default()
            },
            RocketModel {
                sample_rate_hz: -100.0,
                ..Default::default()
            },
            RocketModel {
                mass: 0.0,
                ..Default::default()
            },
            RocketModel {
                thrust: 100.0,
                ..Default::default()
            },
            RocketModel {
                cd: [0.5, f32::INFINITY, 0.8, 0.95, 1.1],
                ..Default::default()
            },
        ] {
            assert!(model.validate().is_err(), "{model:?}");
        }

        assert!(RocketModel::default().validate().is_ok());
    }
}
