//! Error types for audiosync.
//!
//! Errors are split by the layer they surface from:
//! - **Setup errors** ([`SyncError`]): prevent a run from starting at all
//! - **Adapter errors** ([`SourceError`]): a producer backend failed mid-run;
//!   recorded on the shared signal and reported as a failed run
//! - **Numeric errors** ([`CorrelateError`]): a single correlation attempt
//!   failed; the matcher skips the interval and the run continues

use crate::source::StreamRole;

/// Fatal errors that prevent a synchronization run from starting.
///
/// These are returned from [`sync`](crate::sync) and
/// [`run_with_sources`](crate::run_with_sources) before any producer has
/// started. Failures during a run are reported through
/// [`RunOutcome::Failed`](crate::RunOutcome::Failed) instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The interval ladder has no rungs.
    #[error("interval ladder is empty")]
    EmptyLadder,

    /// The interval ladder starts at zero samples.
    #[error("interval ladder rungs must be positive")]
    ZeroRung,

    /// The interval ladder is not strictly increasing.
    #[error("interval ladder must be strictly increasing (rung {index}: {value} after {previous})")]
    LadderNotIncreasing {
        /// Index of the offending rung.
        index: usize,
        /// Value of the offending rung in samples.
        value: usize,
        /// Value of the preceding rung in samples.
        previous: usize,
    },

    /// No input device suitable for capturing the playback monitor exists.
    #[error("no capture device available")]
    NoCaptureDevice,

    /// The capture device cannot deliver the required sample rate.
    ///
    /// Producers reject mismatched streams rather than resampling.
    #[error("sample rate {requested}Hz not supported by capture device '{device}'")]
    UnsupportedSampleRate {
        /// The sample rate the pipeline runs at.
        requested: u32,
        /// Name of the device that was probed.
        device: String,
    },

    /// An error from the underlying audio library.
    #[error("audio backend error: {0}")]
    Backend(String),

    /// A producer thread could not be spawned.
    #[error("failed to spawn {role} producer thread: {source}")]
    Spawn {
        /// Which producer the thread was for.
        role: StreamRole,
        /// The underlying spawn error.
        source: std::io::Error,
    },
}

/// Errors reported by a producer backend during a run.
///
/// A producer that hits one of these sets the stop flag with the error
/// recorded, and the run completes as
/// [`RunOutcome::Failed`](crate::RunOutcome::Failed).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The backend failed while delivering samples.
    #[error("backend error: {reason}")]
    Backend {
        /// Description of what went wrong.
        reason: String,
    },

    /// A helper process could not be launched.
    #[error("failed to launch `{command}`: {reason}")]
    Spawn {
        /// The command that failed to start.
        command: String,
        /// Why it failed.
        reason: String,
    },

    /// The stream ended before delivering enough samples for the first
    /// match attempt.
    #[error("stream ended after {got} samples, before the first interval of {needed}")]
    EarlyEof {
        /// Samples delivered before the stream ended.
        got: usize,
        /// Samples needed to reach the first ladder rung.
        needed: usize,
    },

    /// The stream runs at a different sample rate than the pipeline.
    #[error("stream format mismatch: got {got}Hz, need {need}Hz")]
    RateMismatch {
        /// The rate the backend delivered.
        got: u32,
        /// The rate the pipeline requires.
        need: u32,
    },
}

impl SourceError {
    /// Creates a backend error with the given reason.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Errors from a single cross-correlation attempt.
///
/// These never abort a run; the matcher logs the error, skips the
/// interval, and moves on to the next rung.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelateError {
    /// The correlation window is too short to transform.
    #[error("correlation needs at least 2 samples, got {len}")]
    InsufficientData {
        /// Length of the window that was rejected.
        len: usize,
    },

    /// The FFT backend refused the transform.
    #[error("FFT backend failure: {reason}")]
    NumericFailure {
        /// Description from the backend.
        reason: String,
    },
}

/// An append would have exceeded a sample buffer's fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("buffer overflow: {requested} samples appended with {remaining} of {capacity} remaining")]
pub struct BufferOverflow {
    /// Total buffer capacity in samples.
    pub capacity: usize,
    /// Free space at the time of the append.
    pub remaining: usize,
    /// Samples the append tried to add.
    pub requested: usize,
}
