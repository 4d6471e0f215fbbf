mod args;
mod config;

use std::{
    fs::File,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use airbrakes_core::{
    Actuator, FlightLoop, FlightStateMachine, FlightSummary, LiveFeed, LockstepFeed,
    MockServoDriver, ServoPosition, build_estimator,
    feed::{CsvRawSink, CsvReplayDriver, RawSink},
    simulation::FlightSimulator,
    telemetry::{CsvTelemetry, LogTelemetry, TelemetrySink},
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, error, info, warn};

use crate::{
    args::{Cli, FeedSelect},
    config::AppConfig,
};

/// servo duty cycle % at fully retracted and fully extended
const CLOSED_DUTY: f32 = 3.5;
const OPEN_DUTY: f32 = 11.5;

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .filter(Some("airbrakes_core"), level)
        .filter(Some("airbrakes"), level)
        .parse_default_env()
        .init();
}

fn fly(cli: &Cli, config: &AppConfig, shutdown: Arc<AtomicBool>) -> Result<FlightSummary> {
    let estimator = build_estimator(config.strategy, config.table.as_deref(), &config.flight)
        .context("failed to set up the apogee estimator")?;

    let servo = ServoPosition::new();
    let actuator = Actuator::new(MockServoDriver::new(servo.clone(), CLOSED_DUTY, OPEN_DUTY));

    let telemetry: Box<dyn TelemetrySink> = match &cli.telemetry {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create telemetry log {}", path.display()))?;
            Box::new((LogTelemetry, CsvTelemetry::new(file)))
        }
        None => Box::new(LogTelemetry),
    };

    let machine = FlightStateMachine::new(config.flight.clone(), estimator, actuator, telemetry);

    let summary = match cli.feed {
        FeedSelect::Sim => {
            if cli.raw_log.is_some() {
                warn!("--raw-log is ignored with the simulated feed");
            }
            let simulator = FlightSimulator::new(config.simulation.clone(), servo)?;
            let feed = LockstepFeed::spawn(move |sender| {
                let report = simulator.run(|sample| sender.send(sample));
                info!(
                    "simulation ended after {} samples, apogee {} m",
                    report.samples, report.apogee
                );
            })?;
            FlightLoop::new(feed, machine).with_shutdown(shutdown).run()?
        }
        FeedSelect::Replay => {
            let path = cli
                .replay
                .as_ref()
                .ok_or_else(|| anyhow!("--replay <csv> is required with --feed replay"))?;
            let sink = match &cli.raw_log {
                Some(raw_log) => Some(Box::new(
                    CsvRawSink::create(raw_log)
                        .with_context(|| format!("failed to create raw log {}", raw_log.display()))?,
                ) as Box<dyn RawSink>),
                None => None,
            };
            let feed = LiveFeed::start(CsvReplayDriver::new(path), &config.flight.sensor, sink)
                .context("failed to start the sensor feed")?;
            FlightLoop::new(feed, machine).with_shutdown(shutdown).run()?
        }
    };

    Ok(summary)
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.write_default_config {
        AppConfig::default().save(path)?;
        info!("default config written to {}", path.display());
        return Ok(());
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&cli);
    config.flight.validate()?;
    if cli.feed == FeedSelect::Sim {
        config.simulation.validate()?;
    }
    info!(
        "target apogee {} m, motor burn {} s, {} estimator, {} feed",
        config.flight.target_apogee, config.flight.motor_burn_s, config.strategy, cli.feed
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("ctrl-c received, stopping the flight loop");
                shutdown.store(true, Ordering::Release);
            }
        });
    }

    let summary = tokio::task::spawn_blocking(move || fly(&cli, &config, shutdown)).await??;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
