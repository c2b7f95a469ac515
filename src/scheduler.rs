//! Cancellable alarms
//!
//! The round engine never sleeps. It asks a [`Scheduler`] to deliver an
//! [`AlarmMessage`] after a delay and keeps the returned [`TimerId`] so it
//! can cancel the alarm on every teardown path. The tokio runtime provides
//! the production scheduler; [`ManualScheduler`] is a virtual clock for
//! driving a game deterministically.

use std::collections::BTreeMap;

use web_time::Duration;

use crate::AlarmMessage;

/// Identifier of an armed alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Wraps a raw scheduler-assigned id
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Arms and cancels one-shot alarms
pub trait Scheduler {
    /// Arms an alarm that delivers `alarm` after `after`
    fn schedule(&mut self, alarm: AlarmMessage, after: Duration) -> TimerId;

    /// Cancels an armed alarm; cancelling a fired or unknown alarm is a no-op
    fn cancel(&mut self, timer: TimerId);
}

/// A scheduler backed by a virtual clock
///
/// Alarms only fire when the owner pops them with [`ManualScheduler::pop_due`].
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, TimerId), AlarmMessage>,
}

impl ManualScheduler {
    /// Number of armed alarms
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes the earliest alarm due at or before `deadline`
    ///
    /// The clock moves forward to the alarm's due time. Alarms due at the
    /// same instant fire in arming order.
    pub fn pop_due(&mut self, deadline: Duration) -> Option<(TimerId, AlarmMessage)> {
        let (&(due, timer), _) = self.pending.first_key_value()?;
        if due > deadline {
            return None;
        }
        let alarm = self.pending.remove(&(due, timer))?;
        self.now = self.now.max(due);
        Some((timer, alarm))
    }

    /// Moves the clock forward without firing anything
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, alarm: AlarmMessage, after: Duration) -> TimerId {
        self.next_id += 1;
        let timer = TimerId::new(self.next_id);
        self.pending.insert((self.now + after, timer), alarm);
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        self.pending.retain(|(_, id), _| *id != timer);
    }
}
