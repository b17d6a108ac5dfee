//! Adaptive update coalescing.
//!
//! An `UpdateCoalescer` collects batches pushed in quick succession and
//! releases their merge once the stream goes quiet. The quiet window starts
//! at `base_timeout_ms` and is stretched to the measured cost of the last
//! release, so expensive consumers are called less often. A second bound,
//! `max_wait_ms`, caps how long the first pending batch may wait under a
//! continuous stream of pushes.
//!
//! The coalescer holds no timer. Callers pass the current time in and ask
//! for `deadline()` to schedule the next `poll`.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::change_set::ViewChange;

/// A batch that can absorb a later batch.
pub trait Coalesce {
    /// Folds `later` into `self`.
    fn coalesce(&mut self, later: Self);
}

impl Coalesce for ViewChange {
    fn coalesce(&mut self, later: Self) {
        self.merge(later);
    }
}

impl<T> Coalesce for Vec<T> {
    fn coalesce(&mut self, later: Self) {
        self.extend(later);
    }
}

impl Coalesce for () {
    fn coalesce(&mut self, _later: Self) {}
}

/// Timing parameters of a coalescer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoalesceConfig {
    /// Minimum quiet period before a release.
    pub base_timeout_ms: u64,
    /// Longest a pending batch may wait.
    pub max_wait_ms: u64,
}

impl CoalesceConfig {
    pub const fn new(base_timeout_ms: u64, max_wait_ms: u64) -> Self {
        Self {
            base_timeout_ms,
            max_wait_ms,
        }
    }
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self::new(16, 250)
    }
}

/// Merges bursts of batches into one release per quiet period.
#[derive(Debug)]
pub struct UpdateCoalescer<T> {
    config: CoalesceConfig,
    window_ms: u64,
    pending: Option<T>,
    first_push_at: u64,
    last_push_at: u64,
    releases: u64,
}

impl<T: Coalesce> UpdateCoalescer<T> {
    /// Creates an idle coalescer.
    pub fn new(config: CoalesceConfig) -> Self {
        Self {
            config,
            window_ms: config.base_timeout_ms,
            pending: None,
            first_push_at: 0,
            last_push_at: 0,
            releases: 0,
        }
    }

    /// Returns the timing parameters.
    pub fn config(&self) -> CoalesceConfig {
        self.config
    }

    /// Returns the current quiet window.
    #[inline]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Returns true if a batch is waiting.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the number of batches released so far.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Merges `batch` into the pending batch and restarts the quiet window.
    pub fn push(&mut self, now: u64, batch: T) {
        match self.pending.as_mut() {
            Some(pending) => pending.coalesce(batch),
            None => {
                self.pending = Some(batch);
                self.first_push_at = now;
            }
        }
        self.last_push_at = now;
    }

    /// Time at which the pending batch becomes due, if any.
    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref()?;
        let quiet = self.last_push_at.saturating_add(self.window_ms);
        let bound = self.first_push_at.saturating_add(self.config.max_wait_ms);
        Some(quiet.min(bound))
    }

    /// Returns true if the pending batch is due at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.deadline().is_some_and(|at| now >= at)
    }

    /// Releases the pending batch if it is due at `now`.
    pub fn poll(&mut self, now: u64) -> Option<T> {
        if self.is_due(now) {
            self.take()
        } else {
            None
        }
    }

    /// Releases the pending batch regardless of timing.
    pub fn flush(&mut self) -> Option<T> {
        self.take()
    }

    fn take(&mut self) -> Option<T> {
        let batch = self.pending.take()?;
        self.releases += 1;
        Some(batch)
    }

    /// Stretches the next quiet window to the cost of the last release.
    pub fn record_duration(&mut self, elapsed_ms: u64) {
        self.window_ms = self.config.base_timeout_ms.max(elapsed_ms);
        trace!(elapsed_ms, window_ms = self.window_ms, "coalescer window adjusted");
    }
}
