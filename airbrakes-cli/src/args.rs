use std::{fmt::Display, path::PathBuf};

use airbrakes_core::EstimatorKind;
use clap::{ArgAction, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "Airbrakes")]
#[command(bin_name = "airbrakes")]
#[command(about = "airbrakes flight controller, flies the built-in simulator or a recorded flight")]
pub struct Cli {
    #[arg(long, help = "toml config file, defaults are used for missing keys")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "write the default config to this path and exit")]
    pub write_default_config: Option<PathBuf>,

    #[arg(long, help = "target apogee in m, overrides the config file")]
    pub target_apogee: Option<f32>,

    #[arg(long, help = "motor burn duration in s, overrides the config file")]
    pub motor_burn: Option<f32>,

    #[arg(long, value_enum, help = "apogee estimation strategy")]
    pub strategy: Option<Strategy>,

    #[arg(long, help = "lookup table csv for the interpolated and bang-bang strategies")]
    pub table: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FeedSelect::Sim)]
    pub feed: FeedSelect,

    #[arg(long, help = "raw sensor csv played back with --feed replay")]
    pub replay: Option<PathBuf>,

    #[arg(long, help = "write flight events to this csv")]
    pub telemetry: Option<PathBuf>,

    #[arg(long, help = "write every raw sensor reading to this csv")]
    pub raw_log: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count, help = "more logging, repeat for trace")]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Kinematic,
    Interpolated,
    BangBang,
}

impl From<Strategy> for EstimatorKind {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Kinematic => EstimatorKind::Kinematic,
            Strategy::Interpolated => EstimatorKind::Interpolated,
            Strategy::BangBang => EstimatorKind::BangBang,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedSelect {
    /// built-in simulator, driven in lockstep with the flight loop
    Sim,
    /// recorded raw sensor csv through the threaded sensor feed
    Replay,
}

impl Display for FeedSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedSelect::Sim => write!(f, "sim"),
            FeedSelect::Replay => write!(f, "replay"),
        }
    }
}
