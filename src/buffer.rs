//! Fixed-capacity append-only sample storage.

use parking_lot::RwLock;

use crate::error::BufferOverflow;

/// A fixed-capacity store of mono float samples with append-only writes.
///
/// One producer appends; any number of readers copy finalized prefixes.
/// Samples below the published watermark are never mutated again, so a
/// snapshot taken for one match attempt stays valid while later appends
/// continue.
///
/// The buffer itself does not track the watermark; that lives on the
/// [`SyncSignal`](crate::SyncSignal) so the matcher can latch both
/// watermarks and the stop flag under one lock. Producers append *before*
/// publishing, which is what makes `read_prefix` safe for any published
/// length.
pub struct SampleBuffer {
    storage: RwLock<Vec<f32>>,
    capacity: usize,
}

impl SampleBuffer {
    /// Creates a buffer able to hold `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples appended so far.
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    /// Whether no samples have been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free space in samples.
    pub fn remaining(&self) -> usize {
        self.capacity - self.len()
    }

    /// Appends samples at the current end of the buffer.
    ///
    /// Producer-only; a single writer owns the append side for the whole
    /// run.
    ///
    /// # Errors
    ///
    /// Returns [`BufferOverflow`] and appends nothing if the samples do
    /// not fit.
    pub fn append(&self, samples: &[f32]) -> Result<(), BufferOverflow> {
        let mut storage = self.storage.write();
        let remaining = self.capacity - storage.len();
        if samples.len() > remaining {
            return Err(BufferOverflow {
                capacity: self.capacity,
                remaining,
                requested: samples.len(),
            });
        }
        storage.extend_from_slice(samples);
        Ok(())
    }

    /// Copies the first `n` samples out of the buffer.
    ///
    /// The caller must have verified a watermark of at least `n` under the
    /// signal lock before reading.
    pub fn read_prefix(&self, n: usize) -> Vec<f32> {
        let storage = self.storage.read();
        debug_assert!(n <= storage.len(), "prefix read past the watermark");
        storage[..n.min(storage.len())].to_vec()
    }
}
