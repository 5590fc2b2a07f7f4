//! Time-critical section guard
//!
//! Raises the calling thread to a bounded-latency scheduling class for a
//! short region of code, then puts it back. One thread at a time may be
//! inside the section; others block on the lock.
//!
//! # Example
//!
//! ```rust,ignore
//! let section = TimeCriticalSection::new(backend, TimeCriticalConfig::default());
//! {
//!     let _guard = section.enter();
//!     mix_audio_buffer();
//! } // policy restored, lock released, overrun checked
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::TimeCriticalConfig;
use crate::policy::{SchedBackend, SchedPolicy};

/// State written on enter and cleared on exit, only ever touched under the lock.
#[derive(Debug, Default)]
struct SectionState {
    saved_policy: Option<SchedPolicy>,
    started_at: Option<Instant>,
}

/// Counters for every section run through one [`TimeCriticalSection`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SectionStats {
    pub entries: u64,
    pub overruns: u64,
    pub clock_failures: u64,
    pub last_elapsed: Duration,
    pub max_elapsed: Duration,
}

/// Owner of the section lock and the saved-policy slot.
///
/// Construct once at startup and share by reference (or `Arc`).
pub struct TimeCriticalSection {
    backend: Arc<dyn SchedBackend>,
    config: TimeCriticalConfig,
    state: Mutex<SectionState>,
    stats: Mutex<SectionStats>,
}

impl TimeCriticalSection {
    pub fn new(backend: Arc<dyn SchedBackend>, config: TimeCriticalConfig) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(SectionState::default()),
            stats: Mutex::new(SectionStats::default()),
        }
    }

    pub fn config(&self) -> &TimeCriticalConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Enter the time-critical section.
    ///
    /// Blocks until no other thread is inside. If the reference clock can't
    /// be read the thread keeps its policy, but the returned guard still
    /// holds the lock and must be dropped (or `exit`ed) like any other.
    ///
    /// Not reentrant: entering again on the same thread while a guard is
    /// alive deadlocks.
    pub fn enter(&self) -> TimeCriticalGuard<'_> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let hz = match self.backend.reference_clock_hz() {
            Ok(hz) if hz > 0 => hz,
            Ok(_) => {
                log::warn!("{}: reference clock reports 0 Hz", self.backend.name());
                self.with_stats(|s| s.clock_failures += 1);
                return TimeCriticalGuard::new(self, state);
            }
            Err(e) => {
                log::warn!("{}: {}", self.backend.name(), e);
                self.with_stats(|s| s.clock_failures += 1);
                return TimeCriticalGuard::new(self, state);
            }
        };

        // Without a saved policy there is nothing to restore on exit, so stay put.
        match self.backend.current_policy() {
            Ok(policy) => state.saved_policy = Some(policy),
            Err(e) => {
                log::debug!("TimeCrit: could not read policy, not elevating: {}", e);
                return TimeCriticalGuard::new(self, state);
            }
        }

        let policy = SchedPolicy::time_critical(hz, self.config.budget_divisor);
        if let Err(e) = self.backend.set_policy(&policy) {
            log::debug!("TimeCrit: could not set {:?}: {}", policy, e);
        }

        state.started_at = Some(Instant::now());
        TimeCriticalGuard::new(self, state)
    }

    /// Snapshot of the accumulated statistics.
    pub fn stats(&self) -> SectionStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_stats(&self, f: impl FnOnce(&mut SectionStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    fn record_exit(&self, elapsed: Duration) {
        let threshold = self.config.overrun_threshold;
        self.with_stats(|stats| {
            stats.last_elapsed = elapsed;
            if elapsed > stats.max_elapsed {
                stats.max_elapsed = elapsed;
            }
            if elapsed > threshold {
                stats.overruns += 1;
            }
        });

        // The OS didn't honour the request and preempted us.
        if elapsed > threshold {
            log::warn!(
                "Time-critical section lasted for {:.6}s (threshold {:?})",
                elapsed.as_secs_f64(),
                threshold
            );
        }
    }
}

/// Proof of being inside the time-critical section.
///
/// Dropping it restores the saved policy, releases the lock and checks for an
/// overrun. Holds a `MutexGuard`, so it can't leave the entering thread.
pub struct TimeCriticalGuard<'a> {
    section: &'a TimeCriticalSection,
    state: Option<MutexGuard<'a, SectionState>>,
}

impl<'a> TimeCriticalGuard<'a> {
    fn new(section: &'a TimeCriticalSection, state: MutexGuard<'a, SectionState>) -> Self {
        section.with_stats(|s| s.entries += 1);
        Self {
            section,
            state: Some(state),
        }
    }

    /// Whether the elevated policy was requested for this section.
    pub fn is_elevated(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.saved_policy.is_some())
    }

    /// Leave the section now. Equivalent to dropping the guard.
    pub fn exit(self) {}

    fn release(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };

        if let Some(policy) = state.saved_policy.take() {
            if let Err(e) = self.section.backend.set_policy(&policy) {
                log::debug!("TimeCrit: could not restore {:?}: {}", policy, e);
            }
        }
        let started_at = state.started_at.take();
        drop(state);

        if let Some(started_at) = started_at {
            self.section.record_exit(started_at.elapsed());
        }
    }
}

impl Drop for TimeCriticalGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
