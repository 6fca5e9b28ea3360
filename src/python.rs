//! Python embedding: expose lag measurement to a host interpreter.

use pyo3::prelude::*;

use crate::config::SyncConfig;
use crate::supervisor::{self, RunOutcome};

/// Measures the lag between the stream behind `url` and local playback.
///
/// Returns the matched lag in samples, or `None` when the run ends
/// without a match or fails. No state is retained between calls.
#[pyfunction]
fn get_lag(url: &str) -> Option<i64> {
    let config = SyncConfig::default();
    match supervisor::sync(url, &config) {
        Ok(report) => match report.outcome {
            RunOutcome::Matched(m) => Some(m.lag_samples),
            RunOutcome::NoMatch => None,
            RunOutcome::Failed(failure) => {
                tracing::error!(%failure, "synchronization failed");
                None
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "synchronization setup failed");
            None
        }
    }
}

/// Python module definition.
#[pymodule]
fn audiosync(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_lag, m)?)?;
    Ok(())
}
