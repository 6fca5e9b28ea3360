//! Circular cross-correlation via FFT.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::CorrelateError;

/// The location and strength of a correlation peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Offset of the peak in samples, in `[0, n)`; circular, so offsets
    /// past the midpoint correspond to negative lags.
    pub lag: usize,
    /// Energy-normalized peak magnitude. 1.0 for identical aligned
    /// inputs, near zero for independent signals.
    pub confidence: f64,
}

/// Computes circular cross-correlations between equal-length windows.
///
/// The product spectrum is `conj(A[k])·B[k]`, so the peak sits at the
/// offset by which `b` is delayed relative to `a`. The inverse transform
/// is scanned by absolute value, including the initial comparand; ties
/// keep the smaller offset. Confidence is the peak magnitude divided by
/// `n·√(Σa²·Σb²)`, which makes it independent of input amplitude; inputs
/// with no energy short-circuit to a zero-confidence peak at offset 0.
///
/// Inputs are used exactly as given. Callers wanting linear rather than
/// circular behaviour zero-pad before calling (the matcher pads to the
/// next power of two at or above `2n−1`).
///
/// Plan construction in the FFT backend is thread-safe, so no
/// process-wide plan lock is needed; the planner and its plan cache are
/// owned by the `Correlator` value, and scratch buffers live only for a
/// single call.
pub struct Correlator {
    planner: FftPlanner<f64>,
}

impl Correlator {
    /// Creates a correlator with an empty plan cache.
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Correlates two windows of the same length.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelateError::InsufficientData`] for windows shorter
    /// than 2 samples. [`CorrelateError::NumericFailure`] is reserved for
    /// backend refusal.
    pub fn correlate(&mut self, a: &[f64], b: &[f64]) -> Result<Peak, CorrelateError> {
        let n = a.len();
        debug_assert_eq!(n, b.len(), "correlation windows must match in length");
        if n < 2 {
            return Err(CorrelateError::InsufficientData { len: n });
        }

        let energy_a: f64 = a.iter().map(|&x| x * x).sum();
        let energy_b: f64 = b.iter().map(|&x| x * x).sum();
        let norm = (energy_a * energy_b).sqrt();
        if norm <= f64::EPSILON {
            return Ok(Peak {
                lag: 0,
                confidence: 0.0,
            });
        }

        let fft = self.planner.plan_fft_forward(n);
        let ifft = self.planner.plan_fft_inverse(n);

        let mut freq_a: Vec<Complex<f64>> = a.iter().map(|&x| Complex::new(x, 0.0)).collect();
        let mut freq_b: Vec<Complex<f64>> = b.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.process(&mut freq_a);
        fft.process(&mut freq_b);

        let mut product: Vec<Complex<f64>> = freq_a
            .iter()
            .zip(freq_b.iter())
            .map(|(x, y)| x.conj() * y)
            .collect();
        ifft.process(&mut product);

        let mut lag = 0;
        let mut peak = product[0].re.abs();
        for (i, value) in product.iter().enumerate().skip(1) {
            let magnitude = value.re.abs();
            if magnitude > peak {
                peak = magnitude;
                lag = i;
            }
        }

        // The inverse transform is unnormalized; fold its factor of n into
        // the energy normalization.
        Ok(Peak {
            lag,
            confidence: peak / (n as f64 * norm),
        })
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
