//! Single-shot delayed pin transitions.
//!
//! When a dual-channel command is staggered, the first channel changes at once
//! and the other is scheduled here. The scheduler never reads a clock itself:
//! callers pass `now_ms`, which keeps firing deterministic under a
//! [`MockClock`](crate::hal::MockClock).
//!
//! # Supersession
//!
//! At most one transition is pending per signal. Scheduling a new one for the
//! same signal replaces the old, and an immediate command for the signal
//! should [`cancel`](TransitionScheduler::cancel) it, so a stale delayed
//! change can never overwrite a newer one.
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::scheduler::{DelayedTransition, TransitionScheduler};
//! use safety_io_tester::{Channel, Signal};
//!
//! let mut scheduler = TransitionScheduler::new();
//! scheduler.schedule(DelayedTransition::new(Signal::EStop, Channel::A, true, 250));
//!
//! assert!(scheduler.due(249).is_empty());
//! let fired = scheduler.due(250);
//! assert_eq!(fired.len(), 1);
//! assert!(scheduler.is_empty());
//! ```

use crate::pins::{Channel, Signal};

/// Capacity: one pending transition per signal.
const MAX_PENDING: usize = Signal::ALL.len();

/// Transitions that became due in one call to [`TransitionScheduler::due`].
pub type DueTransitions = heapless::Vec<DelayedTransition, MAX_PENDING>;

/// A single pin change waiting for its deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayedTransition {
    /// Signal to change.
    pub signal: Signal,
    /// Channel to change.
    pub channel: Channel,
    /// Value to write.
    pub value: bool,
    /// Earliest time the change may apply.
    pub fire_at_ms: u64,
}

impl DelayedTransition {
    /// Creates a transition.
    pub const fn new(signal: Signal, channel: Channel, value: bool, fire_at_ms: u64) -> Self {
        Self {
            signal,
            channel,
            value,
            fire_at_ms,
        }
    }

    /// Whether the deadline has been reached.
    #[inline]
    pub const fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.fire_at_ms
    }
}

/// Result of scheduling a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleResult {
    /// Nothing was pending for the signal.
    Scheduled,
    /// A pending transition for the same signal was replaced.
    Superseded {
        /// The transition that will no longer fire.
        previous: DelayedTransition,
    },
}

/// Pending delayed transitions, keyed by signal.
#[derive(Debug, Default, Clone)]
pub struct TransitionScheduler {
    pending: heapless::Vec<DelayedTransition, MAX_PENDING>,
}

impl TransitionScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a transition, replacing any pending one for the same signal.
    pub fn schedule(&mut self, transition: DelayedTransition) -> ScheduleResult {
        if let Some(slot) = self
            .pending
            .iter_mut()
            .find(|t| t.signal == transition.signal)
        {
            let previous = core::mem::replace(slot, transition);
            return ScheduleResult::Superseded { previous };
        }
        // One slot per signal, so this always fits.
        let pushed = self.pending.push(transition);
        debug_assert!(pushed.is_ok());
        ScheduleResult::Scheduled
    }

    /// Drop the pending transition for `signal`, if any.
    pub fn cancel(&mut self, signal: Signal) -> Option<DelayedTransition> {
        let index = self.pending.iter().position(|t| t.signal == signal)?;
        Some(self.pending.swap_remove(index))
    }

    /// Remove and return every transition due at `now_ms`, earliest first.
    pub fn due(&mut self, now_ms: u64) -> DueTransitions {
        let mut fired = DueTransitions::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].is_due(now_ms) {
                let _ = fired.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }
        fired.sort_unstable_by_key(|t| t.fire_at_ms);
        fired
    }

    /// Deadline of the earliest pending transition.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.iter().map(|t| t.fire_at_ms).min()
    }

    /// The pending transition for `signal`, if any.
    pub fn pending(&self, signal: Signal) -> Option<&DelayedTransition> {
        self.pending.iter().find(|t| t.signal == signal)
    }

    /// Number of pending transitions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_once_at_deadline() {
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(DelayedTransition::new(Signal::EStop, Channel::B, false, 100));

        assert!(scheduler.due(0).is_empty());
        assert!(scheduler.due(99).is_empty());
        assert_eq!(scheduler.due(100).len(), 1);
        assert!(scheduler.due(100).is_empty());
        assert!(scheduler.due(10_000).is_empty());
    }

    #[test]
    fn late_poll_still_fires() {
        let mut scheduler = TransitionScheduler::new();
        let t = DelayedTransition::new(Signal::Interlock, Channel::A, true, 50);
        scheduler.schedule(t);
        assert_eq!(scheduler.due(5_000).as_slice(), &[t]);
    }

    #[test]
    fn zero_delay_is_due_immediately() {
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(DelayedTransition::new(Signal::EStop, Channel::A, true, 10));
        assert_eq!(scheduler.due(10).len(), 1);
    }

    #[test]
    fn same_signal_supersedes() {
        let mut scheduler = TransitionScheduler::new();
        let first = DelayedTransition::new(Signal::EStop, Channel::B, true, 500);
        let second = DelayedTransition::new(Signal::EStop, Channel::A, false, 300);

        assert_eq!(scheduler.schedule(first), ScheduleResult::Scheduled);
        assert_eq!(
            scheduler.schedule(second),
            ScheduleResult::Superseded { previous: first }
        );
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.due(1_000).as_slice(), &[second]);
    }

    #[test]
    fn signals_are_independent() {
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(DelayedTransition::new(Signal::EStop, Channel::B, true, 200));
        scheduler.schedule(DelayedTransition::new(Signal::Interlock, Channel::B, true, 100));

        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.next_deadline(), Some(100));

        let fired = scheduler.due(150);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].signal, Signal::Interlock);
        assert_eq!(scheduler.next_deadline(), Some(200));
    }

    #[test]
    fn due_returns_earliest_first() {
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(DelayedTransition::new(Signal::EStop, Channel::B, true, 300));
        scheduler.schedule(DelayedTransition::new(Signal::Interlock, Channel::A, true, 100));

        let fired = scheduler.due(300);
        assert_eq!(fired[0].fire_at_ms, 100);
        assert_eq!(fired[1].fire_at_ms, 300);
    }

    #[test]
    fn cancel_removes_pending() {
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(DelayedTransition::new(Signal::EStop, Channel::B, true, 100));

        assert!(scheduler.pending(Signal::EStop).is_some());
        assert!(scheduler.cancel(Signal::EStop).is_some());
        assert!(scheduler.cancel(Signal::EStop).is_none());
        assert!(scheduler.due(1_000).is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }
}
