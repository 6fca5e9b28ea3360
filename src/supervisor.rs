//! Run lifecycle: spawn producers, drive the matcher, stop, join, report.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::buffer::SampleBuffer;
use crate::config::{IntervalLadder, SyncConfig};
use crate::error::SyncError;
use crate::matcher::{Match, Matcher, MatcherOutcome};
use crate::producer::producer_loop;
use crate::signal::{ProducerFailure, SyncSignal};
use crate::source::{CaptureSource, DownloadSource, SampleSource, StreamRole};

/// How a synchronization run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// A ladder rung crossed the confidence threshold.
    Matched(Match),
    /// The ladder was exhausted (or cut short) without a confident peak.
    NoMatch,
    /// A producer backend failed before the run could finish.
    Failed(ProducerFailure),
}

/// The outcome of a run plus lifecycle annotations.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// What the run concluded.
    pub outcome: RunOutcome,
    /// Producers that did not exit before the join timeout. Their
    /// backends may still hold resources; the outcome itself stands.
    pub leaked: Vec<StreamRole>,
}

/// Measures the lag between the stream behind `url` and local playback.
///
/// Opens the capture and download adapters, then runs the full pipeline
/// via [`run_with_sources`]. The capture stream handle stays on this
/// thread and is released after both producers are joined.
///
/// # Errors
///
/// Returns a [`SyncError`] if the capture device or a producer thread
/// cannot be set up. A download adapter that fails to launch is reported
/// as a failed run rather than a setup error, matching how mid-run
/// adapter failures surface.
pub fn sync(url: &str, config: &SyncConfig) -> Result<RunReport, SyncError> {
    let (stream, capture) = CaptureSource::open(config)?;
    let download = match DownloadSource::spawn(url, config) {
        Ok(download) => download,
        Err(error) => {
            drop(stream);
            return Ok(RunReport {
                outcome: RunOutcome::Failed(ProducerFailure {
                    role: StreamRole::Download,
                    error,
                }),
                leaked: Vec::new(),
            });
        }
    };
    let report = run_with_sources(download, capture, config);
    drop(stream);
    report
}

/// Runs the full pipeline over two explicit sources.
///
/// This is the generic entry the adapters and the test suite share:
/// allocate both buffers at the ladder capacity, spawn one producer
/// thread per source, run the matcher on the calling thread, then stop
/// and join everything with a bounded wait.
///
/// # Errors
///
/// Returns a [`SyncError`] if a producer thread cannot be spawned.
pub fn run_with_sources<D, C>(
    download: D,
    capture: C,
    config: &SyncConfig,
) -> Result<RunReport, SyncError>
where
    D: SampleSource + 'static,
    C: SampleSource + 'static,
{
    let capacity = config.ladder.capacity();
    let buffers = [
        Arc::new(SampleBuffer::new(capacity)),
        Arc::new(SampleBuffer::new(capacity)),
    ];
    let signal = Arc::new(SyncSignal::new());
    let ladder = Arc::new(config.ladder.clone());

    tracing::info!(
        capacity,
        rungs = ladder.len(),
        min_confidence = config.min_confidence,
        "starting synchronization run"
    );

    let download_handle = spawn_producer(
        download,
        StreamRole::Download,
        &buffers[StreamRole::Download.index()],
        &ladder,
        &signal,
        config.chunk_samples,
    )?;
    let capture_handle = match spawn_producer(
        capture,
        StreamRole::Capture,
        &buffers[StreamRole::Capture.index()],
        &ladder,
        &signal,
        config.chunk_samples,
    ) {
        Ok(handle) => handle,
        Err(err) => {
            // The download producer is already running; stop it before
            // reporting the setup failure.
            signal.request_stop();
            join_producer(download_handle, StreamRole::Download);
            return Err(err);
        }
    };

    let mut matcher = Matcher::new(config.ladder.clone(), config.min_confidence);
    let outcome = matcher.run(
        &buffers[StreamRole::Download.index()],
        &buffers[StreamRole::Capture.index()],
        &signal,
    );

    // The matcher stops on every path; this is a backstop.
    signal.request_stop();

    let exited = signal.wait_all_exited(config.join_timeout);
    let mut leaked = Vec::new();
    for (role, handle) in [
        (StreamRole::Download, download_handle),
        (StreamRole::Capture, capture_handle),
    ] {
        if exited[role.index()] {
            join_producer(handle, role);
        } else {
            tracing::warn!(%role, timeout = ?config.join_timeout, "producer did not exit; leaking its adapter");
            leaked.push(role);
        }
    }

    let outcome = match outcome {
        MatcherOutcome::Matched(m) => RunOutcome::Matched(m),
        MatcherOutcome::NoMatch => match signal.failure() {
            Some(failure) => RunOutcome::Failed(failure),
            None => RunOutcome::NoMatch,
        },
    };
    Ok(RunReport { outcome, leaked })
}

fn spawn_producer<S: SampleSource + 'static>(
    source: S,
    role: StreamRole,
    buffer: &Arc<SampleBuffer>,
    ladder: &Arc<IntervalLadder>,
    signal: &Arc<SyncSignal>,
    chunk_samples: usize,
) -> Result<JoinHandle<()>, SyncError> {
    let buffer = Arc::clone(buffer);
    let ladder = Arc::clone(ladder);
    let signal = Arc::clone(signal);
    std::thread::Builder::new()
        .name(format!("{role}-producer"))
        .spawn(move || producer_loop(source, &buffer, role, &ladder, &signal, chunk_samples))
        .map_err(|source| SyncError::Spawn { role, source })
}

/// Joins a producer whose exit flag is already set, so this returns
/// promptly; a panic in the producer is logged, not propagated.
fn join_producer(handle: JoinHandle<()>, role: StreamRole) {
    if handle.join().is_err() {
        tracing::warn!(%role, "producer thread panicked");
    }
}
