//! The match loop over the interval ladder.

use crate::buffer::SampleBuffer;
use crate::config::IntervalLadder;
use crate::correlate::Correlator;
use crate::signal::{RungStatus, SyncSignal};

/// A successful lag estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// How many samples the capture stream is delayed relative to the
    /// downloaded stream. Negative when the capture runs ahead; circular,
    /// interpreted modulo the correlated length.
    pub lag_samples: i64,
    /// Normalized confidence of the accepted peak.
    pub confidence: f64,
    /// Index of the ladder rung that produced the match.
    pub rung: usize,
}

/// What the match loop concluded. Failure reporting happens at the
/// supervisor level, from the failure recorded on the signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatcherOutcome {
    /// A rung crossed the confidence threshold.
    Matched(Match),
    /// Every reachable rung was attempted without crossing the threshold,
    /// or the run was stopped first.
    NoMatch,
}

/// Walks the interval ladder, correlating both buffers at each rung until
/// one attempt crosses the confidence threshold.
///
/// The matcher owns the padding decision: each prefix of length `n` is
/// zero-padded to the power of two at or above `2n−1`, turning the
/// circular correlation into a linear one over the window.
pub struct Matcher {
    ladder: IntervalLadder,
    min_confidence: f64,
    correlator: Correlator,
}

impl Matcher {
    /// Creates a matcher for the given ladder and threshold.
    pub fn new(ladder: IntervalLadder, min_confidence: f64) -> Self {
        Self {
            ladder,
            min_confidence,
            correlator: Correlator::new(),
        }
    }

    /// Runs the ladder to completion or early stop.
    ///
    /// Waits on the signal before each rung; a stop observed while
    /// waiting, or a rung no producer can still reach, ends the loop as
    /// [`MatcherOutcome::NoMatch`]. A correlation error skips the rung.
    /// The stop flag is set before returning on every path, and at most
    /// one match is produced per run.
    pub fn run(
        &mut self,
        download: &SampleBuffer,
        capture: &SampleBuffer,
        signal: &SyncSignal,
    ) -> MatcherOutcome {
        for (rung, &samples) in self.ladder.rungs().iter().enumerate() {
            match signal.wait_for_rung(samples) {
                RungStatus::Ready => {}
                RungStatus::Stopped => {
                    tracing::debug!(rung, "stopped before interval was reached");
                    return MatcherOutcome::NoMatch;
                }
                RungStatus::Unreachable => {
                    tracing::info!(rung, samples, "remaining intervals are unreachable");
                    signal.request_stop();
                    return MatcherOutcome::NoMatch;
                }
            }

            // Snapshot the finalized prefixes; later appends never touch
            // indices below the latched watermark.
            let padded_len = (2 * samples - 1).next_power_of_two();
            let a = padded(&download.read_prefix(samples), padded_len);
            let b = padded(&capture.read_prefix(samples), padded_len);

            let peak = match self.correlator.correlate(&a, &b) {
                Ok(peak) => peak,
                Err(err) => {
                    tracing::warn!(rung, samples, error = %err, "skipping interval");
                    continue;
                }
            };

            let lag_samples = fold_lag(peak.lag, padded_len);
            tracing::debug!(
                rung,
                samples,
                lag = lag_samples,
                confidence = peak.confidence,
                "interval correlated"
            );

            if peak.confidence >= self.min_confidence {
                signal.request_stop();
                return MatcherOutcome::Matched(Match {
                    lag_samples,
                    confidence: peak.confidence,
                    rung,
                });
            }
        }

        signal.request_stop();
        MatcherOutcome::NoMatch
    }
}

/// Widens a snapshot to f64 and zero-pads it to `len`.
fn padded(samples: &[f32], len: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(len);
    out.extend(samples.iter().map(|&s| f64::from(s)));
    out.resize(len, 0.0);
    out
}

/// Folds a circular peak offset into a signed lag: offsets past the
/// midpoint are negative lags that wrapped around.
fn fold_lag(raw: usize, len: usize) -> i64 {
    if raw > len / 2 {
        raw as i64 - len as i64
    } else {
        raw as i64
    }
}
