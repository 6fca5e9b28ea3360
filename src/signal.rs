//! Shared run state: watermarks, stop flag, and the wakeup signal.
//!
//! One mutex guards both producers' watermarks, the stop flag, the
//! failure slot, and the end/exit markers; one condition variable is
//! broadcast whenever any of them changes in a way a waiter could care
//! about. A single lock is deliberate: the matcher's wait condition is a
//! conjunction over both watermarks, and producers only touch the lock
//! briefly at checkpoints.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::SourceError;
use crate::source::StreamRole;

/// A producer's fatal failure, as recorded on the signal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{role} producer failed: {error}")]
pub struct ProducerFailure {
    /// Which producer failed.
    pub role: StreamRole,
    /// The backend error it reported.
    pub error: SourceError,
}

/// Result of waiting for a ladder rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RungStatus {
    /// Both watermarks reached the rung; a snapshot may be taken.
    Ready,
    /// The stop flag was set before both watermarks reached the rung.
    Stopped,
    /// A producer ended short of the rung; it can never be reached.
    Unreachable,
}

#[derive(Debug, Default)]
struct SyncState {
    /// Published sample counts, indexed by `StreamRole::index`.
    watermarks: [usize; 2],
    /// Producers that ended their stream (full buffer or clean EOF).
    ended: [bool; 2],
    /// Producers whose threads are about to return.
    exited: [bool; 2],
    stopped: bool,
    failure: Option<ProducerFailure>,
}

/// The synchronization primitive shared by the supervisor, the matcher,
/// and both producers for the duration of a run.
///
/// The stop flag transitions false to true at most once per run. Sample
/// storage is *not* guarded here; producers append to their
/// [`SampleBuffer`](crate::SampleBuffer) first and publish the new
/// watermark after, so every published index is finalized.
#[derive(Default)]
pub struct SyncSignal {
    state: Mutex<SyncState>,
    cond: Condvar,
}

impl SyncSignal {
    /// Creates the signal with zero watermarks and the stop flag clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a producer's watermark.
    ///
    /// `reached_rung` marks the checkpoint appends: those that reach or
    /// pass a ladder rung broadcast to wake the matcher.
    pub fn publish(&self, role: StreamRole, watermark: usize, reached_rung: bool) {
        let mut state = self.state.lock();
        debug_assert!(
            watermark >= state.watermarks[role.index()],
            "watermark went backwards"
        );
        state.watermarks[role.index()] = watermark;
        drop(state);
        if reached_rung {
            self.cond.notify_all();
        }
    }

    /// Latches a producer's published watermark.
    pub fn watermark(&self, role: StreamRole) -> usize {
        self.state.lock().watermarks[role.index()]
    }

    /// Marks a producer's stream as ended (buffer full or clean EOF) and
    /// signals once.
    pub fn mark_ended(&self, role: StreamRole) {
        let mut state = self.state.lock();
        state.ended[role.index()] = true;
        drop(state);
        self.cond.notify_all();
    }

    /// Marks a producer thread as exiting; the supervisor's bounded join
    /// waits on this.
    pub(crate) fn mark_exited(&self, role: StreamRole) {
        let mut state = self.state.lock();
        state.exited[role.index()] = true;
        drop(state);
        self.cond.notify_all();
    }

    /// Sets the stop flag. Returns whether this call made the transition.
    pub fn request_stop(&self) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            return false;
        }
        state.stopped = true;
        drop(state);
        self.cond.notify_all();
        true
    }

    /// Whether the stop flag is set.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Records a producer failure and sets the stop flag.
    ///
    /// The first recorded failure wins; later ones are dropped so the
    /// supervisor reports the root cause.
    pub fn fail(&self, role: StreamRole, error: SourceError) {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(ProducerFailure { role, error });
        }
        state.stopped = true;
        drop(state);
        self.cond.notify_all();
    }

    /// The recorded failure, if any producer reported one.
    pub fn failure(&self) -> Option<ProducerFailure> {
        self.state.lock().failure.clone()
    }

    /// Blocks until both watermarks reach `rung`, the stop flag is set,
    /// or the rung becomes unreachable.
    pub fn wait_for_rung(&self, rung: usize) -> RungStatus {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return RungStatus::Stopped;
            }
            if state.watermarks.iter().all(|&w| w >= rung) {
                return RungStatus::Ready;
            }
            let unreachable = state
                .watermarks
                .iter()
                .zip(state.ended.iter())
                .any(|(&w, &ended)| ended && w < rung);
            if unreachable {
                return RungStatus::Unreachable;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Waits up to `timeout` for both producers to mark themselves
    /// exited. Returns the exit flags as last observed.
    pub(crate) fn wait_all_exited(&self, timeout: Duration) -> [bool; 2] {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.exited.iter().all(|&e| e) {
                return state.exited;
            }
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.exited;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_stop_transitions_once() {
        let signal = SyncSignal::new();
        assert!(!signal.is_stopped());
        assert!(signal.request_stop());
        assert!(!signal.request_stop());
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_first_failure_wins() {
        let signal = SyncSignal::new();
        signal.fail(StreamRole::Download, SourceError::backend("decode error"));
        signal.fail(StreamRole::Capture, SourceError::backend("late error"));

        let failure = signal.failure().unwrap();
        assert_eq!(failure.role, StreamRole::Download);
        assert!(failure.error.to_string().contains("decode error"));
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_wait_for_rung_ready() {
        let signal = Arc::new(SyncSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = std::thread::spawn(move || waiter.wait_for_rung(100));

        signal.publish(StreamRole::Download, 100, true);
        signal.publish(StreamRole::Capture, 50, false);
        signal.publish(StreamRole::Capture, 120, true);

        assert_eq!(handle.join().unwrap(), RungStatus::Ready);
    }

    #[test]
    fn test_wait_for_rung_stopped() {
        let signal = Arc::new(SyncSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = std::thread::spawn(move || waiter.wait_for_rung(100));
        signal.request_stop();

        assert_eq!(handle.join().unwrap(), RungStatus::Stopped);
    }

    #[test]
    fn test_wait_for_rung_unreachable_after_short_end() {
        let signal = Arc::new(SyncSignal::new());
        signal.publish(StreamRole::Download, 100, true);
        signal.publish(StreamRole::Capture, 60, false);
        signal.mark_ended(StreamRole::Capture);

        // 60 < 100 and capture ended, so the rung can never be reached.
        assert_eq!(signal.wait_for_rung(100), RungStatus::Unreachable);
        // A rung both already cover is still ready.
        assert_eq!(signal.wait_for_rung(50), RungStatus::Ready);
    }

    #[test]
    fn test_wait_all_exited_times_out() {
        let signal = SyncSignal::new();
        signal.mark_exited(StreamRole::Download);

        let exited = signal.wait_all_exited(Duration::from_millis(20));
        assert_eq!(exited, [true, false]);
    }

    #[test]
    fn test_wait_all_exited_completes() {
        let signal = Arc::new(SyncSignal::new());
        let other = Arc::clone(&signal);

        let handle = std::thread::spawn(move || {
            other.mark_exited(StreamRole::Download);
            other.mark_exited(StreamRole::Capture);
        });

        let exited = signal.wait_all_exited(Duration::from_secs(5));
        assert_eq!(exited, [true, true]);
        handle.join().unwrap();
    }
}
