use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use audiosync::{
    IntervalLadder, RunOutcome, SyncConfig, DEFAULT_BASE_SECONDS, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_RUNG_COUNT, SAMPLE_RATE,
};

/// Measure the lag between a downloaded stream and local playback.
#[derive(Parser)]
#[command(name = "audiosync", version, about)]
struct Cli {
    /// Media URL to download and match against the playback monitor
    url: String,

    /// Confidence threshold for accepting a match
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    min_confidence: f64,

    /// Base interval in seconds; match attempts run at base, 2·base, ...
    #[arg(long, default_value_t = DEFAULT_BASE_SECONDS)]
    ladder_base: usize,

    /// Number of match attempts before giving up
    #[arg(long, default_value_t = DEFAULT_RUNG_COUNT)]
    rungs: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(&Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "run aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let ladder = IntervalLadder::with_base(cli.ladder_base * SAMPLE_RATE as usize, cli.rungs)
        .context("invalid ladder arguments")?;
    let mut config = SyncConfig::with_ladder(ladder, SAMPLE_RATE);
    config.min_confidence = cli.min_confidence;

    let report = audiosync::sync(&cli.url, &config).context("failed to start synchronization")?;
    for role in &report.leaked {
        tracing::warn!(%role, "producer did not exit before the join timeout");
    }

    match report.outcome {
        RunOutcome::Matched(m) => {
            // Samples internally; milliseconds only at this boundary.
            let lag_ms = m.lag_samples as f64 * 1000.0 / f64::from(SAMPLE_RATE);
            println!("RESULT: lag={lag_ms:.3}, confidence={:.6}", m.confidence);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::NoMatch => {
            tracing::info!("no confident match across any interval");
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Failed(failure) => {
            tracing::error!(%failure, "synchronization failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
