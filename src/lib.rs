//! # audiosync
//!
//! Progressive lag estimation between two audio streams of the same
//! underlying sound: one captured live from the local playback monitor,
//! one downloaded and decoded from a network source. The measured lag is
//! used to align a reference video with a locally playing track.
//!
//! ## Architecture
//!
//! Two producer threads fill two fixed-capacity [`SampleBuffer`]s while
//! the matcher, woken through a shared [`SyncSignal`], runs an FFT-based
//! circular cross-correlation over growing prefixes of both buffers. The
//! first interval whose normalized confidence crosses the threshold stops
//! both producers and yields the result:
//!
//! - **Producers** append mono f32 samples and broadcast whenever their
//!   watermark crosses the next rung of the [`IntervalLadder`]
//! - **Matcher** latches both watermarks under one lock, snapshots the
//!   finalized prefixes, and correlates them with the [`Correlator`]
//! - **Supervisor** owns the lifecycle: spawn, match, stop, bounded join
//!
//! Capture reads the monitor of the default output sink via CPAL; the
//! download side decodes through an ffmpeg child process. Both sides are
//! plain [`source::SampleSource`]s, so the whole pipeline also runs over
//! [`source::MockSource`] in tests.
//!
//! ## Example
//!
//! ```no_run
//! use audiosync::{sync, RunOutcome, SyncConfig};
//!
//! let report = sync("https://example.com/video", &SyncConfig::default())?;
//! if let RunOutcome::Matched(m) = report.outcome {
//!     println!("capture lags by {} samples", m.lag_samples);
//! }
//! # Ok::<(), audiosync::SyncError>(())
//! ```

#![warn(missing_docs)]
// Audio code converts freely between sample counts, rates, and float widths.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

mod buffer;
mod config;
mod correlate;
mod error;
mod matcher;
mod producer;
#[cfg(feature = "python")]
mod python;
mod signal;
pub mod source;
mod supervisor;

pub use buffer::SampleBuffer;
pub use config::{
    IntervalLadder, SyncConfig, DEFAULT_BASE_SECONDS, DEFAULT_MIN_CONFIDENCE, DEFAULT_RUNG_COUNT,
    SAMPLE_RATE,
};
pub use correlate::{Correlator, Peak};
pub use error::{BufferOverflow, CorrelateError, SourceError, SyncError};
pub use matcher::{Match, Matcher, MatcherOutcome};
pub use signal::{ProducerFailure, RungStatus, SyncSignal};
pub use source::{SampleSource, StreamRole};
pub use supervisor::{run_with_sources, sync, RunOutcome, RunReport};
