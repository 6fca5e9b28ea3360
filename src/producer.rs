//! The pump loop a producer thread runs over its sample source.

use crate::buffer::SampleBuffer;
use crate::config::IntervalLadder;
use crate::error::SourceError;
use crate::signal::SyncSignal;
use crate::source::{SampleSource, StreamRole};

/// Drives one source until its buffer is full, its stream ends, the stop
/// flag is set, or the backend fails. Always releases the source and
/// marks the thread exited, whatever path ends the loop.
pub(crate) fn producer_loop<S: SampleSource>(
    mut source: S,
    buffer: &SampleBuffer,
    role: StreamRole,
    ladder: &IntervalLadder,
    signal: &SyncSignal,
    chunk_samples: usize,
) {
    tracing::debug!(%role, capacity = buffer.capacity(), "producer started");
    if let Err(error) = pump(&mut source, buffer, role, ladder, signal, chunk_samples) {
        tracing::error!(%role, %error, "producer failed");
        signal.fail(role, error);
    }
    source.stop();
    signal.mark_exited(role);
    tracing::debug!(%role, "producer exited");
}

fn pump<S: SampleSource>(
    source: &mut S,
    buffer: &SampleBuffer,
    role: StreamRole,
    ladder: &IntervalLadder,
    signal: &SyncSignal,
    chunk_samples: usize,
) -> Result<(), SourceError> {
    let capacity = buffer.capacity();
    let mut block = vec![0.0f32; chunk_samples.max(1)];
    let mut written = 0usize;
    // Index of the next ladder rung this producer has not yet reached.
    let mut next_rung = 0usize;

    loop {
        if signal.is_stopped() {
            return Ok(());
        }
        if written == capacity {
            tracing::debug!(%role, written, "buffer full");
            signal.mark_ended(role);
            return Ok(());
        }

        let read = source.read(&mut block)?;
        if read == 0 {
            if written < ladder.first() {
                return Err(SourceError::EarlyEof {
                    got: written,
                    needed: ladder.first(),
                });
            }
            tracing::debug!(%role, written, "stream ended");
            signal.mark_ended(role);
            return Ok(());
        }

        // The final block may not fit; everything past capacity is
        // irrelevant to the ladder and is dropped.
        let take = read.min(capacity - written);
        buffer
            .append(&block[..take])
            .map_err(|overflow| SourceError::backend(overflow.to_string()))?;
        written += take;

        let reached = next_rung < ladder.len() && written >= ladder.rungs()[next_rung];
        while next_rung < ladder.len() && written >= ladder.rungs()[next_rung] {
            next_rung += 1;
        }
        signal.publish(role, written, reached);
    }
}
