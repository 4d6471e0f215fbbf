use std::{fmt::Display, fs::File, path::Path, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{FlightError, config::FlightConfig};

mod bang_bang;
mod kinematic;
mod lookup;

pub use bang_bang::{BangBangEstimator, BangBangTable};
pub use kinematic::KinematicPredictor;
pub use lookup::{InterpolatedEstimator, LookupRow, LookupTable};

/// Current kinematic state handed to an estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub altitude: f32,
    pub velocity: f32,
    /// current airbrakes extension 0-1
    pub extension: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// predicted apogee altitude, fed to the pid
    Apogee(f32),
    /// bang-bang decision, true = fully extend
    Deploy(bool),
}

pub trait ApogeeEstimator: Send + Sync {
    fn estimate(&self, kinematics: &Kinematics) -> Estimate;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    #[default]
    Kinematic,
    Interpolated,
    BangBang,
}

impl Display for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorKind::Kinematic => write!(f, "kinematic"),
            EstimatorKind::Interpolated => write!(f, "interpolated"),
            EstimatorKind::BangBang => write!(f, "bang-bang"),
        }
    }
}

/// Builds the strategy once at startup, table backed strategies load their
/// table here.
pub fn build_estimator(
    kind: EstimatorKind,
    table_path: Option<&Path>,
    config: &FlightConfig,
) -> Result<Arc<dyn ApogeeEstimator>, FlightError> {
    let require_table = || {
        table_path.ok_or_else(|| FlightError::Config(format!("{kind} estimator requires a lookup table")))
    };

    let estimator: Arc<dyn ApogeeEstimator> = match kind {
        EstimatorKind::Kinematic => Arc::new(KinematicPredictor::new(config.gravity)),
        EstimatorKind::Interpolated => {
            let table = LookupTable::load(require_table()?)?;
            Arc::new(InterpolatedEstimator::new(Arc::new(table)))
        }
        EstimatorKind::BangBang => {
            let table = BangBangTable::load(require_table()?)?;
            Arc::new(BangBangEstimator::new(Arc::new(table), config.target_apogee))
        }
    };
    log_info!("using {} apogee estimator", estimator.name());
    Ok(estimator)
}

/// reads every data row of a csv table positionally, the header row is skipped
fn read_table_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, FlightError> {
    let file = File::open(path).map_err(|e| FlightError::table(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        // +2: one based, after the header
        let row = row.map_err(|e| FlightError::table(path, format!("row {}: {e}", i + 2)))?;
        rows.push(row);
    }
    Ok(rows)
}
