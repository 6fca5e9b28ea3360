//! End-to-end scenarios over mock sources.
//!
//! Every test drives the full pipeline (two producer threads, the shared
//! signal, the matcher, the supervisor's bounded join) through
//! `run_with_sources`, exactly as the real adapters do. The full-ladder
//! scenarios run at a reduced sample rate so debug-friendly FFT sizes
//! keep the suite fast; the ladder keeps its 3 s through 15 s shape.

use std::time::Duration;

use audiosync::source::MockSource;
use audiosync::{run_with_sources, RunOutcome, StreamRole, SyncConfig, SAMPLE_RATE};

/// 16 s of deterministic noise at the given rate.
fn noise_source(rate: u32, seed: u32) -> MockSource {
    let mut source = MockSource::new(rate);
    source.generate_noise(rate as usize * 16, seed, 0.8);
    source
}

#[test]
fn zero_lag_sine_matches_at_first_interval() {
    // S1: both streams are the same 16 s 440 Hz tone at the nominal rate.
    let config = SyncConfig::default();
    let seconds = 16 * SAMPLE_RATE as usize;

    let mut download = MockSource::new(SAMPLE_RATE);
    download.generate_sine(440.0, seconds);
    let mut capture = MockSource::new(SAMPLE_RATE);
    capture.generate_sine(440.0, seconds);

    let report = run_with_sources(download, capture, &config).unwrap();
    match report.outcome {
        RunOutcome::Matched(m) => {
            assert_eq!(m.lag_samples, 0);
            assert_eq!(m.rung, 0);
            assert!(m.confidence > 0.9, "confidence was {}", m.confidence);
        }
        other => panic!("expected a match, got {other:?}"),
    }
    assert!(report.leaked.is_empty());
}

#[test]
fn delayed_capture_reports_positive_lag() {
    // S2: the capture stream is the download stream delayed by 1200
    // samples (25 ms). A broadband signal, not a pure tone: 440 Hz at
    // 48 kHz repeats every 1200/11 samples, which would make a
    // 1200-sample delay indistinguishable from zero.
    let config = SyncConfig::default();

    let download = noise_source(SAMPLE_RATE, 7);
    let mut capture = MockSource::new(SAMPLE_RATE);
    capture.generate_silence(1_200);
    capture.push_samples(download.samples());

    let report = run_with_sources(download, capture, &config).unwrap();
    match report.outcome {
        RunOutcome::Matched(m) => {
            assert_eq!(m.lag_samples, 1_200);
            assert_eq!(m.rung, 0);
        }
        other => panic!("expected a match, got {other:?}"),
    }
}

#[test]
fn independent_noise_exhausts_the_ladder() {
    // S3: unrelated streams never cross the threshold.
    let config = SyncConfig::for_rate(8_000);

    let download = noise_source(8_000, 1);
    let capture = noise_source(8_000, 2);

    let report = run_with_sources(download, capture, &config).unwrap();
    assert!(matches!(report.outcome, RunOutcome::NoMatch));
    assert!(report.leaked.is_empty());
}

#[test]
fn late_convergence_matches_after_first_interval() {
    // S4: the capture stream is silent for 4 s, then plays the download
    // stream from its start. The 3 s interval sees only silence; a later
    // interval has enough overlap to cross the threshold.
    let rate = 8_000u32;
    let config = SyncConfig::for_rate(rate);
    let silence = 4 * rate as usize;

    let download = noise_source(rate, 5);
    let mut capture = MockSource::new(rate);
    capture.generate_silence(silence);
    capture.push_samples(download.samples());

    let report = run_with_sources(download, capture, &config).unwrap();
    match report.outcome {
        RunOutcome::Matched(m) => {
            assert!(m.rung >= 1, "matched too early, at rung {}", m.rung);
            assert_eq!(m.lag_samples, silence as i64);
        }
        other => panic!("expected a late match, got {other:?}"),
    }
}

#[test]
fn download_failure_before_first_interval_fails_the_run() {
    // S5: the decoder dies one second in; the capture producer must still
    // be joined cleanly.
    let rate = 8_000u32;
    let config = SyncConfig::for_rate(rate);

    let mut download = MockSource::new(rate);
    download.generate_noise(rate as usize, 3, 0.8);
    let download =
        download.failing_at_end(audiosync::SourceError::backend("connection reset by peer"));
    let capture = noise_source(rate, 4);

    let report = run_with_sources(download, capture, &config).unwrap();
    match report.outcome {
        RunOutcome::Failed(failure) => {
            assert_eq!(failure.role, StreamRole::Download);
            assert!(failure.error.to_string().contains("connection reset"));
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(report.leaked.is_empty());
}

#[test]
fn full_buffers_without_match_join_within_timeout() {
    // S6: both streams outlast the buffers; producers end on the full
    // buffer, the ladder is exhausted, and nothing leaks.
    let config = SyncConfig::for_rate(8_000);

    // 16 s of source audio against 15 s of buffer capacity.
    let download = noise_source(8_000, 11);
    let capture = noise_source(8_000, 12);

    let report = run_with_sources(download, capture, &config).unwrap();
    assert!(matches!(report.outcome, RunOutcome::NoMatch));
    assert!(report.leaked.is_empty());
}

#[test]
fn paced_producers_stop_promptly_after_a_match() {
    // Real backends deliver in real time; a match at the first interval
    // must stop both producers long before their streams are exhausted.
    let rate = 8_000u32;
    let mut config = SyncConfig::for_rate(rate);
    config.chunk_samples = 2_000;

    let download = noise_source(rate, 21).with_read_delay(Duration::from_millis(1));
    let mut capture = MockSource::new(rate);
    capture.push_samples(noise_source(rate, 21).samples());
    let capture = capture.with_read_delay(Duration::from_millis(1));

    let report = run_with_sources(download, capture, &config).unwrap();
    match report.outcome {
        RunOutcome::Matched(m) => assert_eq!(m.lag_samples, 0),
        other => panic!("expected a match, got {other:?}"),
    }
    assert!(report.leaked.is_empty());
}
