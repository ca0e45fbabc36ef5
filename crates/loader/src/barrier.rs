//! Readiness barrier over a fixed set of worker slots.
//!
//! Bit `i` of the mask is set while worker `i` holds no unfinished job of the
//! class this barrier tracks. [`Barrier::synchronize`] blocks until every bit is
//! set. Mask updates and waits go through the same mutex, so a `thread_ready`
//! racing a `synchronize` can never be lost.

use std::fmt;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::config::MAX_WORKERS;

pub struct Barrier {
    ready: Mutex<u64>,
    wake: Condvar,
    full: u64,
    slots: usize,
}

impl Barrier {
    /// Barrier with `slots` bits, all initially ready.
    ///
    /// Panics if `slots` is zero or above [`MAX_WORKERS`].
    pub fn new(slots: usize) -> Self {
        assert!(
            (1..=MAX_WORKERS).contains(&slots),
            "barrier needs 1..={MAX_WORKERS} slots, got {slots}"
        );
        let full = u64::MAX >> (MAX_WORKERS - slots);
        Self {
            ready: Mutex::new(full),
            wake: Condvar::new(),
            full,
            slots,
        }
    }

    pub fn len(&self) -> usize {
        self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Mark `slot` as holding unfinished work.
    pub fn thread_working(&self, slot: usize) {
        let bit = self.bit(slot);
        *self.ready.lock() &= !bit;
    }

    /// Mark `slot` as idle for this class and wake every waiter.
    pub fn thread_ready(&self, slot: usize) {
        let bit = self.bit(slot);
        {
            let mut ready = self.ready.lock();
            if *ready & bit != 0 {
                return;
            }
            *ready |= bit;
        }
        self.wake.notify_all();
    }

    /// Block until every slot is ready.
    pub fn synchronize(&self) {
        let mut ready = self.ready.lock();
        let full = self.full;
        self.wake.wait_while(&mut ready, |mask| *mask & full != full);
    }

    /// Like [`synchronize`](Self::synchronize) but gives up after `timeout`.
    /// Returns `true` if every slot was ready in time.
    pub fn synchronize_timeout(&self, timeout: Duration) -> bool {
        let mut ready = self.ready.lock();
        let full = self.full;
        let result = self
            .wake
            .wait_while_for(&mut ready, |mask| *mask & full != full, timeout);
        !result.timed_out() || *ready & full == full
    }

    pub fn is_ready(&self, slot: usize) -> bool {
        *self.ready.lock() & self.bit(slot) != 0
    }

    pub fn is_synchronized(&self) -> bool {
        *self.ready.lock() & self.full == self.full
    }

    /// Snapshot of the ready bits.
    pub fn mask(&self) -> u64 {
        *self.ready.lock()
    }

    fn bit(&self, slot: usize) -> u64 {
        assert!(slot < self.slots, "slot {slot} out of range 0..{}", self.slots);
        1u64 << slot
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("slots", &self.slots)
            .field("ready", &format_args!("{:0width$b}", self.mask(), width = self.slots))
            .finish()
    }
}
