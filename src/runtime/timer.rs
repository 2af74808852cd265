//! Timer Scheduler
//!
//! One-shot and periodic timers on a single-threaded clock. The host drives
//! time forward with [`Scheduler::advance`] and then drains due timers one
//! at a time with [`Scheduler::next_due`], running the owner's handler
//! between pops. Handlers may schedule or cancel timers; a cancelled timer
//! is removed immediately and never fires again, even if it was already
//! due in the current advance.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// Handle to a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// A timer that came due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiredTimer<K> {
    /// Handle of the timer (still valid for periodic timers)
    pub handle: TimerHandle,
    /// Owner-defined key identifying what the timer is for
    pub key: K,
    /// Clock time at which it fired
    pub fired_at_ms: u64,
}

#[derive(Clone, Debug)]
struct ScheduledTimer<K> {
    key: K,
    due_ms: u64,
    period_ms: Option<u64>,
}

/// Single-threaded timer scheduler keyed by `K`.
#[derive(Clone, Debug)]
pub struct Scheduler<K> {
    now_ms: u64,
    horizon_ms: u64,
    next_handle: u64,
    timers: BTreeMap<TimerHandle, ScheduledTimer<K>>,
}

impl<K: Copy> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy> Scheduler<K> {
    /// Create an empty scheduler at time zero.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            horizon_ms: 0,
            next_handle: 0,
            timers: BTreeMap::new(),
        }
    }

    /// Current clock time.
    ///
    /// While draining, this is the fire time of the timer being handled.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Fire `key` once after `delay_ms`.
    pub fn schedule_once(&mut self, delay_ms: u64, key: K) -> TimerHandle {
        self.insert(key, delay_ms, None)
    }

    /// Fire `key` every `period_ms` until cancelled. A zero period is
    /// treated as one millisecond.
    pub fn schedule_periodic(&mut self, period_ms: u64, key: K) -> TimerHandle {
        let period_ms = period_ms.max(1);
        self.insert(key, period_ms, Some(period_ms))
    }

    fn insert(&mut self, key: K, delay_ms: u64, period_ms: Option<u64>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.insert(
            handle,
            ScheduledTimer {
                key,
                due_ms: self.now_ms.saturating_add(delay_ms),
                period_ms,
            },
        );
        handle
    }

    /// Cancel a timer. Returns false if it already fired (one-shot) or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.timers.remove(&handle).is_some()
    }

    /// Cancel the timer held in `slot`, leaving it empty.
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    /// Whether the timer is still scheduled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    /// Number of scheduled timers.
    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Move the drain horizon forward by `elapsed_ms`.
    pub fn advance(&mut self, elapsed_ms: u64) {
        self.horizon_ms = self.horizon_ms.max(self.now_ms).saturating_add(elapsed_ms);
    }

    /// Pop the earliest timer due at or before the horizon.
    ///
    /// Ties fire in scheduling order. When nothing is due the clock moves to
    /// the horizon and `None` is returned.
    pub fn next_due(&mut self) -> Option<FiredTimer<K>> {
        let next = self
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= self.horizon_ms)
            .min_by_key(|(handle, t)| (t.due_ms, **handle))
            .map(|(handle, _)| *handle);

        let Some(handle) = next else {
            self.now_ms = self.horizon_ms;
            return None;
        };

        let (key, due_ms, period_ms) = {
            let timer = &self.timers[&handle];
            (timer.key, timer.due_ms, timer.period_ms)
        };
        self.now_ms = due_ms;

        match period_ms {
            Some(period) => {
                if let Some(timer) = self.timers.get_mut(&handle) {
                    timer.due_ms = due_ms.saturating_add(period);
                }
            }
            None => {
                self.timers.remove(&handle);
            }
        }

        Some(FiredTimer {
            handle,
            key,
            fired_at_ms: due_ms,
        })
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
