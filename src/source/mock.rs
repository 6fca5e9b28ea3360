//! Mock sample source for testing without hardware or subprocesses.

use std::time::Duration;

use crate::error::SourceError;
use crate::source::SampleSource;

/// A sample source that plays back synthesized audio.
///
/// Allows exercising the full pipeline (producers, matcher, supervisor)
/// deterministically in CI. Audio is generated up front with the
/// `generate_*` methods and streamed out through [`SampleSource::read`].
///
/// # Example
///
/// ```
/// use audiosync::source::MockSource;
///
/// let mut mock = MockSource::new(48_000);
/// // One second of silence, then two of a 440Hz tone.
/// mock.generate_silence(48_000);
/// mock.generate_sine(440.0, 96_000);
/// assert_eq!(mock.len(), 144_000);
/// ```
pub struct MockSource {
    sample_rate: u32,
    samples: Vec<f32>,
    cursor: usize,
    read_delay: Option<Duration>,
    end_error: Option<SourceError>,
}

impl MockSource {
    /// Creates an empty mock source for the given rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
            cursor: 0,
            read_delay: None,
            end_error: None,
        }
    }

    /// Appends silence.
    pub fn generate_silence(&mut self, samples: usize) {
        self.samples.extend(std::iter::repeat(0.0).take(samples));
    }

    /// Appends a sine wave at the given frequency.
    pub fn generate_sine(&mut self, frequency: f64, samples: usize) {
        let start = self.samples.len();
        let rate = f64::from(self.sample_rate);
        for i in 0..samples {
            let t = (start + i) as f64 / rate;
            self.samples
                .push((2.0 * std::f64::consts::PI * frequency * t).sin() as f32);
        }
    }

    /// Appends deterministic white noise.
    ///
    /// A fixed LCG keeps runs reproducible without a rand dependency; the
    /// same seed always yields the same stream.
    pub fn generate_noise(&mut self, samples: usize, seed: u32, amplitude: f32) {
        let mut state = seed;
        for _ in 0..samples {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let value = ((state >> 16) as i32 - 32768) as f32 / 32768.0;
            self.samples.push(value * amplitude);
        }
    }

    /// Appends raw samples directly.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Sleeps this long on every `read`, emulating a real-time backend.
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Fails with `error` once the samples run out, instead of a clean
    /// end of stream.
    #[must_use]
    pub fn failing_at_end(mut self, error: SourceError) -> Self {
        self.end_error = Some(error);
        self
    }

    /// Number of samples queued in total.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether any samples are queued.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The queued samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl SampleSource for MockSource {
    fn read(&mut self, out: &mut [f32]) -> Result<usize, SourceError> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        let remaining = self.samples.len() - self.cursor;
        if remaining == 0 {
            return match self.end_error.take() {
                Some(error) => Err(error),
                None => Ok(0),
            };
        }
        let n = remaining.min(out.len());
        out[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_silence() {
        let mut mock = MockSource::new(48_000);
        mock.generate_silence(100);
        assert_eq!(mock.len(), 100);
        assert!(mock.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mock_sine_spans_appends() {
        // Generating a tone in two calls must produce the same waveform
        // as one call; the phase continues across appends.
        let mut split = MockSource::new(48_000);
        split.generate_sine(440.0, 100);
        split.generate_sine(440.0, 100);

        let mut whole = MockSource::new(48_000);
        whole.generate_sine(440.0, 200);

        assert_eq!(split.samples(), whole.samples());
    }

    #[test]
    fn test_mock_noise_is_deterministic() {
        let mut a = MockSource::new(48_000);
        a.generate_noise(500, 42, 1.0);
        let mut b = MockSource::new(48_000);
        b.generate_noise(500, 42, 1.0);
        assert_eq!(a.samples(), b.samples());

        let mut c = MockSource::new(48_000);
        c.generate_noise(500, 43, 1.0);
        assert_ne!(a.samples(), c.samples());
    }

    #[test]
    fn test_mock_reads_in_blocks_then_eof() {
        let mut mock = MockSource::new(48_000);
        mock.push_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let mut out = [0.0f32; 2];
        assert_eq!(mock.read(&mut out).unwrap(), 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(mock.read(&mut out).unwrap(), 2);
        assert_eq!(mock.read(&mut out).unwrap(), 1);
        assert_eq!(mock.read(&mut out).unwrap(), 0);
        assert_eq!(mock.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_mock_failing_at_end() {
        let mut mock = MockSource::new(48_000);
        mock.push_samples(&[1.0]);
        let mut mock = mock.failing_at_end(SourceError::backend("boom"));

        let mut out = [0.0f32; 4];
        assert_eq!(mock.read(&mut out).unwrap(), 1);
        assert!(mock.read(&mut out).is_err());
        // The error is delivered once; afterwards the stream just ends.
        assert_eq!(mock.read(&mut out).unwrap(), 0);
    }
}
