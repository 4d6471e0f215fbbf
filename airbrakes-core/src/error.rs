use std::{fmt::Display, io, path::PathBuf};

/// Error reported by a sensor or actuator driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError(pub String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DriverError {}

#[derive(Debug)]
pub enum FlightError {
    /// sensor or actuator driver can not be opened, fatal at startup
    HardwareUnavailable { device: String, reason: String },
    /// a channel value can not be mapped, the reading is skipped
    MalformedReading { channel: String, value: f64 },
    /// lookup table missing or corrupt, fatal at startup
    TableLoad { path: PathBuf, reason: String },
    /// non-monotonic or zero timestamp delta, dt gets clamped
    TimingAnomaly { previous_ns: u64, current_ns: u64 },
    Config(String),
    Io(io::Error),
}

impl FlightError {
    pub(crate) fn hardware(device: &str, error: DriverError) -> Self {
        Self::HardwareUnavailable {
            device: device.into(),
            reason: error.0,
        }
    }

    pub(crate) fn table(path: impl Into<PathBuf>, reason: impl Display) -> Self {
        Self::TableLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// errors that have to abort the process instead of being absorbed by the
    /// flight loop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HardwareUnavailable { .. } | Self::TableLoad { .. } | Self::Config(_)
        )
    }
}

impl Display for FlightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightError::HardwareUnavailable { device, reason } => {
                write!(f, "{device} unavailable: {reason}")
            }
            FlightError::MalformedReading { channel, value } => {
                write!(f, "malformed reading on channel {channel}: {value}")
            }
            FlightError::TableLoad { path, reason } => {
                write!(f, "failed to load lookup table {}: {reason}", path.display())
            }
            FlightError::TimingAnomaly {
                previous_ns,
                current_ns,
            } => write!(
                f,
                "timestamp went from {previous_ns}ns to {current_ns}ns"
            ),
            FlightError::Config(message) => write!(f, "invalid configuration: {message}"),
            FlightError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for FlightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlightError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FlightError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for FlightError {
    fn from(value: csv::Error) -> Self {
        Self::Io(value.into())
    }
}
