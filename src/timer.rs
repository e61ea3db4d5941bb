//! The single pending-timer slot
//!
//! A session has at most one deferred action in flight at any time: either
//! the question window expiry or the end of the answer reveal. The slot
//! enforces that arming a new timer releases the previous one in the same
//! step, and that a released timer's firing can never act — every armed
//! timer gets a fresh epoch, and a firing is only accepted if it carries the
//! epoch currently armed.

/// Owner of the one in-flight deferred action
///
/// Arming returns an epoch token to embed in the scheduled alarm message;
/// [`TimerSlot::try_fire`] refuses tokens from timers that have since been
/// cancelled or superseded, which makes stale firings inert even if their
/// message was already queued.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    epoch: u64,
    armed: bool,
}

impl TimerSlot {
    /// Arms the slot, releasing any previously armed timer
    ///
    /// Returns the epoch token the scheduled alarm must carry back.
    pub fn arm(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.armed = true;
        self.epoch
    }

    /// Cancels whatever timer is armed, if any
    pub fn cancel(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.armed = false;
    }

    /// Consumes a firing if it matches the armed timer
    ///
    /// Returns `true` exactly when `epoch` belongs to the currently armed
    /// timer; the slot is disarmed as a side effect so a duplicate delivery
    /// of the same firing is also refused.
    pub fn try_fire(&mut self, epoch: u64) -> bool {
        if self.armed && self.epoch == epoch {
            self.armed = false;
            true
        } else {
            false
        }
    }
}
