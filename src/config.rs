//! Configuration for synchronization runs.

use std::time::Duration;

use crate::error::SyncError;

/// Sample rate every stream in the pipeline runs at, in Hz.
///
/// Producers must deliver mono samples at this rate or reject the stream;
/// nothing in the core resamples.
pub const SAMPLE_RATE: u32 = 48_000;

/// Default confidence threshold for accepting a match.
///
/// Confidence is energy-normalized (see [`Correlator`](crate::Correlator)),
/// so 1.0 means identical aligned signals and independent noise stays well
/// below 0.1. One threshold works across runs regardless of input level.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.4;

/// Default base interval of the ladder, in seconds.
pub const DEFAULT_BASE_SECONDS: usize = 3;

/// Default number of ladder rungs.
pub const DEFAULT_RUNG_COUNT: usize = 5;

/// The escalating sequence of prefix lengths at which match attempts run.
///
/// Rungs are sample counts, strictly increasing; the last rung is the
/// capacity of both sample buffers. The default ladder is 3 s through 15 s
/// in 3 s steps at the nominal rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalLadder {
    rungs: Vec<usize>,
}

impl IntervalLadder {
    /// Creates a ladder from an explicit rung sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is empty, starts at zero, or is not
    /// strictly increasing.
    pub fn new(rungs: Vec<usize>) -> Result<Self, SyncError> {
        let first = *rungs.first().ok_or(SyncError::EmptyLadder)?;
        if first == 0 {
            return Err(SyncError::ZeroRung);
        }
        for (index, window) in rungs.windows(2).enumerate() {
            if window[1] <= window[0] {
                return Err(SyncError::LadderNotIncreasing {
                    index: index + 1,
                    value: window[1],
                    previous: window[0],
                });
            }
        }
        Ok(Self { rungs })
    }

    /// Creates the arithmetic ladder `base, 2·base, …, count·base`.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is zero or `base` is zero.
    pub fn with_base(base: usize, count: usize) -> Result<Self, SyncError> {
        Self::new((1..=count).map(|i| i * base).collect())
    }

    /// The default ladder for a given sample rate: five rungs, 3 s apart.
    pub fn default_for_rate(sample_rate: u32) -> Self {
        // Cannot fail: base and count are both positive.
        Self {
            rungs: (1..=DEFAULT_RUNG_COUNT)
                .map(|i| i * DEFAULT_BASE_SECONDS * sample_rate as usize)
                .collect(),
        }
    }

    /// The rung sequence in samples.
    pub fn rungs(&self) -> &[usize] {
        &self.rungs
    }

    /// The first rung in samples.
    pub fn first(&self) -> usize {
        self.rungs[0]
    }

    /// The buffer capacity implied by the ladder (its last rung).
    pub fn capacity(&self) -> usize {
        *self.rungs.last().expect("ladder is never empty")
    }

    /// Number of rungs.
    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    /// Always false; ladders cannot be empty.
    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }
}

impl Default for IntervalLadder {
    fn default() -> Self {
        Self::default_for_rate(SAMPLE_RATE)
    }
}

/// Configuration for a synchronization run.
///
/// Use [`SyncConfig::default()`] for the stock behaviour, or derive a
/// scaled configuration with [`SyncConfig::for_rate`].
///
/// # Example
///
/// ```
/// use audiosync::SyncConfig;
///
/// let config = SyncConfig {
///     min_confidence: 0.5,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Sample rate of both streams in Hz.
    pub sample_rate: u32,

    /// The interval ladder driving match attempts.
    pub ladder: IntervalLadder,

    /// Confidence threshold for accepting a match, applied uniformly
    /// across rungs.
    pub min_confidence: f64,

    /// Samples a producer reads from its backend per iteration.
    ///
    /// Also bounds how often producers poll the stop flag.
    /// Default: 100 ms worth of samples.
    pub chunk_samples: usize,

    /// How long the supervisor waits for producers to exit after the stop
    /// flag is set.
    ///
    /// Default: twice the longest ladder interval in wall-clock time.
    pub join_timeout: Duration,
}

impl SyncConfig {
    /// Builds a configuration around an explicit ladder, deriving the
    /// chunk size and join timeout from the given rate.
    pub fn with_ladder(ladder: IntervalLadder, sample_rate: u32) -> Self {
        let join_timeout =
            Duration::from_secs_f64(2.0 * ladder.capacity() as f64 / f64::from(sample_rate));
        Self {
            sample_rate,
            ladder,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            chunk_samples: sample_rate as usize / 10,
            join_timeout,
        }
    }

    /// The default configuration scaled to a different sample rate.
    pub fn for_rate(sample_rate: u32) -> Self {
        Self::with_ladder(IntervalLadder::default_for_rate(sample_rate), sample_rate)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::for_rate(SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_rungs() {
        let ladder = IntervalLadder::default();
        assert_eq!(
            ladder.rungs(),
            &[144_000, 288_000, 432_000, 576_000, 720_000]
        );
        assert_eq!(ladder.capacity(), 720_000);
        assert_eq!(ladder.first(), 144_000);
        assert_eq!(ladder.len(), 5);
    }

    #[test]
    fn test_ladder_rejects_empty() {
        assert!(matches!(
            IntervalLadder::new(vec![]),
            Err(SyncError::EmptyLadder)
        ));
    }

    #[test]
    fn test_ladder_rejects_zero_rung() {
        assert!(matches!(
            IntervalLadder::new(vec![0, 10]),
            Err(SyncError::ZeroRung)
        ));
        assert!(matches!(
            IntervalLadder::with_base(0, 3),
            Err(SyncError::ZeroRung)
        ));
    }

    #[test]
    fn test_ladder_rejects_non_increasing() {
        let err = IntervalLadder::new(vec![10, 20, 20]).unwrap_err();
        match err {
            SyncError::LadderNotIncreasing {
                index,
                value,
                previous,
            } => {
                assert_eq!(index, 2);
                assert_eq!(value, 20);
                assert_eq!(previous, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ladder_with_base() {
        let ladder = IntervalLadder::with_base(100, 3).unwrap();
        assert_eq!(ladder.rungs(), &[100, 200, 300]);
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.ladder.capacity(), 720_000);
        assert_eq!(config.min_confidence, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(config.chunk_samples, 4_800);
        // 15 s of audio, joined with a 30 s grace period.
        assert_eq!(config.join_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_sync_config_for_rate_scales() {
        let config = SyncConfig::for_rate(8_000);
        assert_eq!(config.ladder.capacity(), 8_000 * 15);
        assert_eq!(config.chunk_samples, 800);
        assert_eq!(config.join_timeout, Duration::from_secs(30));
    }
}
