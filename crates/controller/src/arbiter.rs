//! Shared pump budget: a counting semaphore over the number of pumps that may
//! run at once across all zones of a simulation.
//!
//! Never blocks.  A denied zone simply stays off and asks again next tick.
//! Zones already holding a slot are never preempted by a later request; the
//! only way to lose a slot is for the capacity to drop below the number of
//! slots handed out (see [`ZoneArbiter::shed_if_oversubscribed`]).

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct ZoneArbiter {
    active: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl ZoneArbiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(max_concurrent),
        }
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> bool {
        let max = self.max_concurrent();
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| {
                (a < max).then_some(a + 1)
            })
            .is_ok()
    }

    /// Return a slot.  Extra releases are clamped at zero.
    pub fn release(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| a.checked_sub(1));
    }

    /// Give back one slot if more are out than the capacity allows.  Returns
    /// `true` when the caller lost its slot and must stop its pump.
    pub fn shed_if_oversubscribed(&self) -> bool {
        let max = self.max_concurrent();
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| {
                (a > max).then(|| a - 1)
            })
            .is_ok()
    }

    #[cfg(test)]
    pub fn set_max_concurrent(&self, max: usize) {
        self.max_concurrent.store(max, Ordering::Release);
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::Acquire)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for ZoneArbiter {
    fn default() -> Self {
        Self::new(2)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
