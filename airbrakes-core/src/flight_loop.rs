use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use serde::Serialize;

use crate::{
    FlightError,
    feed::SensorFeed,
    state_machine::{FlightStateMachine, PhaseKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    Freefall,
    EndOfData,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightSummary {
    /// every phase entered with the sensor timestamp of its entry
    pub phases: Vec<(PhaseKind, u64)>,
    pub samples_processed: u64,
    pub max_altitude: Option<f32>,
    pub final_command: f32,
    pub termination: Termination,
}

impl FlightSummary {
    pub fn phase_kinds(&self) -> Vec<PhaseKind> {
        self.phases.iter().map(|(kind, _)| *kind).collect()
    }
}

/// Pulls samples out of the feed and runs them through the state machine on
/// the calling thread.
pub struct FlightLoop<F: SensorFeed> {
    feed: F,
    machine: FlightStateMachine,
    shutdown: Arc<AtomicBool>,
    stop_at_freefall: bool,
    idle_sleep: Duration,
}

impl<F: SensorFeed> FlightLoop<F> {
    pub fn new(feed: F, machine: FlightStateMachine) -> Self {
        Self {
            feed,
            machine,
            shutdown: Arc::new(AtomicBool::new(false)),
            stop_at_freefall: true,
            idle_sleep: Duration::from_micros(200),
        }
    }

    /// the loop exits with `Termination::Shutdown` once the flag is set
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// keep processing samples in freefall until the feed runs dry
    pub fn with_stop_at_freefall(mut self, stop_at_freefall: bool) -> Self {
        self.stop_at_freefall = stop_at_freefall;
        self
    }

    /// runs until freefall, end of data or shutdown, then stops the feed
    pub fn run(mut self) -> Result<FlightSummary, FlightError> {
        let mut phases = vec![(self.machine.phase(), 0)];
        let mut samples_processed = 0u64;
        let mut max_altitude: Option<f32> = None;

        let termination = loop {
            if self.shutdown.load(Ordering::Acquire) {
                log_info!("shutdown requested");
                break Termination::Shutdown;
            }

            let Some(sample) = self.feed.poll_next() else {
                if self.feed.is_exhausted() {
                    break Termination::EndOfData;
                }
                thread::sleep(self.idle_sleep);
                continue;
            };

            samples_processed += 1;
            max_altitude = Some(max_altitude.map_or(sample.altitude, |max| max.max(sample.altitude)));

            if let Some(next) = self.machine.process(sample) {
                phases.push((next, sample.timestamp));
                if next == PhaseKind::Freefall && self.stop_at_freefall {
                    break Termination::Freefall;
                }
            }
        };

        self.machine.flush_telemetry();
        self.feed.stop()?;

        let summary = FlightSummary {
            phases,
            samples_processed,
            max_altitude,
            final_command: self.machine.actuator().command(),
            termination,
        };
        log_info!(
            "flight loop finished: {:?} after {} samples, max altitude {:?}",
            summary.termination,
            summary.samples_processed,
            summary.max_altitude
        );
        Ok(summary)
    }
}
