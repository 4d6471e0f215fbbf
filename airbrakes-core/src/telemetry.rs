use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use serde::Serialize;

use crate::{FlightError, state_machine::PhaseKind};

/// Timestamped flight event, timestamps are sensor clock ns.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightEvent {
    Sample {
        timestamp: u64,
        phase: PhaseKind,
        acceleration: f32,
        altitude: f32,
        velocity: f32,
        dt: f32,
    },
    Transition {
        timestamp: u64,
        from: Option<PhaseKind>,
        to: PhaseKind,
    },
    Standby {
        timestamp: u64,
        average_acceleration: f32,
    },
    Control {
        timestamp: u64,
        predicted_apogee: Option<f32>,
        deploy: Option<bool>,
        command: f32,
        rolling_altitude: f32,
        guarded: bool,
    },
}

impl FlightEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            FlightEvent::Sample { timestamp, .. }
            | FlightEvent::Transition { timestamp, .. }
            | FlightEvent::Standby { timestamp, .. }
            | FlightEvent::Control { timestamp, .. } => *timestamp,
        }
    }
}

pub trait TelemetrySink: Send {
    fn record(&mut self, event: &FlightEvent);

    fn flush(&mut self) -> Result<(), FlightError> {
        Ok(())
    }
}

impl<A: TelemetrySink, B: TelemetrySink> TelemetrySink for (A, B) {
    fn record(&mut self, event: &FlightEvent) {
        self.0.record(event);
        self.1.record(event);
    }

    fn flush(&mut self) -> Result<(), FlightError> {
        self.0.flush()?;
        self.1.flush()
    }
}

/// Writes events to the `log` facade.
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record(&mut self, event: &FlightEvent) {
        match event {
            FlightEvent::Sample {
                timestamp,
                phase,
                acceleration,
                altitude,
                velocity,
                dt,
            } => log_trace!(
                "[{}] {} acc={} alt={} vel={} dt={}",
                timestamp,
                phase,
                acceleration,
                altitude,
                velocity,
                dt
            ),
            FlightEvent::Transition {
                timestamp,
                from,
                to,
            } => log_info!("[{}] transition {:?} -> {}", timestamp, from, to),
            FlightEvent::Standby {
                timestamp,
                average_acceleration,
            } => log_trace!("[{}] average acceleration {}", timestamp, average_acceleration),
            FlightEvent::Control {
                timestamp,
                predicted_apogee,
                deploy,
                command,
                rolling_altitude,
                guarded,
            } => log_debug!(
                "[{}] predicted apogee {:?} deploy {:?} command {:.3} rolling altitude {} guarded {}",
                timestamp,
                predicted_apogee,
                deploy,
                command,
                rolling_altitude,
                guarded
            ),
        }
    }
}

impl TelemetrySink for Vec<FlightEvent> {
    fn record(&mut self, event: &FlightEvent) {
        self.push(event.clone());
    }
}

/// Keeps events in memory, clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry(Arc<Mutex<Vec<FlightEvent>>>);

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FlightEvent> {
        self.0.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn record(&mut self, event: &FlightEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event.clone());
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct TelemetryRow {
    timestamp: u64,
    event: &'static str,
    phase: Option<PhaseKind>,
    acceleration: Option<f32>,
    altitude: Option<f32>,
    velocity: Option<f32>,
    dt: Option<f32>,
    average_acceleration: Option<f32>,
    predicted_apogee: Option<f32>,
    deploy: Option<bool>,
    command: Option<f32>,
    rolling_altitude: Option<f32>,
    guarded: Option<bool>,
}

impl From<&FlightEvent> for TelemetryRow {
    fn from(event: &FlightEvent) -> Self {
        match *event {
            FlightEvent::Sample {
                timestamp,
                phase,
                acceleration,
                altitude,
                velocity,
                dt,
            } => Self {
                timestamp,
                event: "sample",
                phase: Some(phase),
                acceleration: Some(acceleration),
                altitude: Some(altitude),
                velocity: Some(velocity),
                dt: Some(dt),
                ..Default::default()
            },
            FlightEvent::Transition { timestamp, to, .. } => Self {
                timestamp,
                event: "transition",
                phase: Some(to),
                ..Default::default()
            },
            FlightEvent::Standby {
                timestamp,
                average_acceleration,
            } => Self {
                timestamp,
                event: "standby",
                average_acceleration: Some(average_acceleration),
                ..Default::default()
            },
            FlightEvent::Control {
                timestamp,
                predicted_apogee,
                deploy,
                command,
                rolling_altitude,
                guarded,
            } => Self {
                timestamp,
                event: "control",
                predicted_apogee,
                deploy,
                command: Some(command),
                rolling_altitude: Some(rolling_altitude),
                guarded: Some(guarded),
                ..Default::default()
            },
        }
    }
}

/// One csv row per event, unused columns are left empty.
pub struct CsvTelemetry<W: Write + Send> {
    writer: csv::Writer<W>,
}

impl<W: Write + Send> CsvTelemetry<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }
}

impl<W: Write + Send> TelemetrySink for CsvTelemetry<W> {
    fn record(&mut self, event: &FlightEvent) {
        if let Err(e) = self.writer.serialize(TelemetryRow::from(event)) {
            log_warn!("failed to write telemetry row: {}", e);
        }
    }

    fn flush(&mut self) -> Result<(), FlightError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_have_stable_columns() {
        let mut buffer = Vec::new();
        {
            let mut sink = CsvTelemetry::new(&mut buffer);
            sink.record(&FlightEvent::Transition {
                timestamp: 5,
                from: Some(PhaseKind::Standby),
                to: PhaseKind::Liftoff,
            });
            sink.record(&FlightEvent::Control {
                timestamp: 7,
                predicted_apogee: Some(960.5),
                deploy: None,
                command: 0.25,
                rolling_altitude: 400.0,
                guarded: false,
            });
            sink.flush().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,event,phase,"));
        assert_eq!(lines[1], "5,transition,Liftoff,,,,,,,,,,");
        assert_eq!(lines[2], "7,control,,,,,,,960.5,,0.25,400.0,false");
    }

    #[test]
    fn memory_sink_clones_share_events() {
        let telemetry = MemoryTelemetry::new();
        let mut sink = (telemetry.clone(), LogTelemetry);
        sink.record(&FlightEvent::Standby {
            timestamp: 1,
            average_acceleration: 0.0,
        });
        assert_eq!(telemetry.events().len(), 1);
        assert_eq!(telemetry.events()[0].timestamp(), 1);
    }
}
