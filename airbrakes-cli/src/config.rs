use std::{
    fs,
    path::{Path, PathBuf},
};

use airbrakes_core::{EstimatorKind, FlightConfig, simulation::RocketModel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::args::Cli;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: EstimatorKind,
    pub table: Option<PathBuf>,
    pub flight: FlightConfig,
    pub simulation: RocketModel,
}

impl AppConfig {
    /// defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, config_str)?;
        Ok(())
    }

    /// command line flags win over the file
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(target_apogee) = cli.target_apogee {
            self.flight.target_apogee = target_apogee;
        }
        if let Some(motor_burn) = cli.motor_burn {
            self.flight.motor_burn_s = motor_burn;
        }
        if let Some(strategy) = cli.strategy {
            self.strategy = strategy.into();
        }
        if let Some(table) = &cli.table {
            self.table = Some(table.clone());
        }
    }
}
