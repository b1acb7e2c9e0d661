use super::core::EventLoop;
use crate::error::{Error, Result};
use crate::time::Timestamp;

use std::collections::VecDeque;
use std::fmt;

/// Identifier of a scheduled time event.
///
/// Ids come from a per-loop counter and are never reused, even after the
/// event they named has been deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
    /// Numeric value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a time event wants after its callback ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerAction {
    /// Delete the event. Its finalizer runs before it is dropped.
    NoMore,

    /// Fire again this many milliseconds after the callback returned.
    ///
    /// The delay is counted from the clock reading after the callback, so
    /// periodic timers drift by the callback's run time. `Again(0)` makes
    /// the event due again within the same pass: a timer that keeps
    /// returning `Again(0)` never lets
    /// [`EventLoop::process_time_events`] return.
    Again(u64),
}

/// Callback of a time event.
pub type TimeProc = Box<dyn FnMut(&mut EventLoop, TimerId) -> TimerAction>;

/// Runs exactly once when a time event is deleted, whether by
/// [`EventLoop::delete_time_event`] or by [`TimerAction::NoMore`].
pub type EventFinalizerProc = Box<dyn FnOnce(&mut EventLoop)>;

/// A scheduled callback bound to an absolute fire time.
pub(crate) struct TimeEvent {
    pub(crate) id: TimerId,

    /// When the event becomes due.
    pub(crate) when: Timestamp,

    /// `None` only while the callback itself is running.
    pub(crate) proc: Option<TimeProc>,

    pub(crate) finalizer: Option<EventFinalizerProc>,
}

/// Unordered list of time events.
///
/// New events go to the head. Lookups are linear; the list is expected to
/// stay short.
#[derive(Default)]
pub(crate) struct TimerList {
    events: VecDeque<TimeEvent>,

    /// Next id to hand out.
    next_id: u64,
}

impl TimerList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        when: Timestamp,
        proc: TimeProc,
        finalizer: Option<EventFinalizerProc>,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        self.events.push_front(TimeEvent {
            id,
            when,
            proc: Some(proc),
            finalizer,
        });

        id
    }

    pub(crate) fn remove(&mut self, id: TimerId) -> Option<TimeEvent> {
        let index = self.events.iter().position(|te| te.id == id)?;
        self.events.remove(index)
    }

    pub(crate) fn get_mut(&mut self, id: TimerId) -> Option<&mut TimeEvent> {
        self.events.iter_mut().find(|te| te.id == id)
    }

    /// Earliest fire time among all events.
    pub(crate) fn nearest(&self) -> Option<Timestamp> {
        self.events.iter().map(|te| te.when).min()
    }

    /// Highest id handed out so far.
    pub(crate) fn last_id(&self) -> Option<TimerId> {
        self.next_id.checked_sub(1).map(TimerId)
    }

    /// First event from the head that is due at `now` and not newer than
    /// `ceiling`.
    pub(crate) fn first_due(&self, ceiling: TimerId, now: Timestamp) -> Option<TimerId> {
        self.events
            .iter()
            .find(|te| te.id <= ceiling && te.proc.is_some() && te.when <= now)
            .map(|te| te.id)
    }

    /// Makes every event due immediately.
    pub(crate) fn expire_all(&mut self) {
        for te in self.events.iter_mut() {
            te.when = Timestamp::EPOCH;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.events.iter().map(|te| te.id)
    }
}

impl EventLoop {
    /// Schedules `proc` to run `milliseconds` from now.
    ///
    /// The callback receives the loop and its own id. Returning
    /// [`TimerAction::Again`] reschedules it relative to the moment it
    /// returned; [`TimerAction::NoMore`] deletes it. `finalizer`, if any,
    /// runs exactly once when the event is deleted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use evloop::{EventLoop, ProcessFlags, TimerAction};
    ///
    /// let mut el = EventLoop::new(64).unwrap();
    /// el.create_time_event(0, |_, _| TimerAction::NoMore, None);
    ///
    /// assert_eq!(el.process_events(ProcessFlags::TIME_EVENTS).unwrap(), 1);
    /// assert_eq!(el.time_event_count(), 0);
    /// ```
    pub fn create_time_event<F>(
        &mut self,
        milliseconds: u64,
        proc: F,
        finalizer: Option<EventFinalizerProc>,
    ) -> TimerId
    where
        F: FnMut(&mut EventLoop, TimerId) -> TimerAction + 'static,
    {
        let when = self.clock.now().add_millis(milliseconds);
        let id = self.timers.insert(when, Box::new(proc), finalizer);

        tracing::trace!(%id, %when, "time event created");
        id
    }

    /// Cancels the time event `id`, running its finalizer.
    ///
    /// Fails with [`Error::TimerNotFound`] if no such event is scheduled.
    pub fn delete_time_event(&mut self, id: TimerId) -> Result<()> {
        let te = self.timers.remove(id).ok_or(Error::TimerNotFound(id))?;

        tracing::trace!(%id, "time event deleted");

        if let Some(finalizer) = te.finalizer {
            finalizer(self);
        }

        Ok(())
    }

    /// Number of scheduled time events.
    pub fn time_event_count(&self) -> usize {
        self.timers.len()
    }

    /// Ids of the scheduled time events, most recently created first.
    pub fn time_event_ids(&self) -> Vec<TimerId> {
        self.timers.ids().collect()
    }

    /// Runs every due time event once and returns how many ran.
    ///
    /// Events created by callbacks during this pass wait for the next one.
    /// After each callback the scan restarts from the head, since the
    /// callback may have changed the list.
    ///
    /// This is the timer half of [`EventLoop::process_events`]; it never
    /// blocks.
    pub fn process_time_events(&mut self) -> usize {
        let mut processed = 0;
        let now = self.clock.now();

        // A clock set backwards could hold timers off indefinitely; firing
        // them early is the lesser evil.
        if now.sec < self.last_time {
            tracing::debug!(
                now = now.sec,
                last = self.last_time,
                "clock skew detected, expiring all time events"
            );
            self.timers.expire_all();
        }
        self.last_time = now.sec;

        let Some(ceiling) = self.timers.last_id() else {
            return 0;
        };

        loop {
            let now = self.clock.now();
            let Some(id) = self.timers.first_due(ceiling, now) else {
                break;
            };

            let Some(mut proc) = self.timers.get_mut(id).and_then(|te| te.proc.take()) else {
                break;
            };

            let action = proc(self, id);
            processed += 1;

            match action {
                TimerAction::NoMore => {
                    // The callback may have deleted itself already.
                    let _ = self.delete_time_event(id);
                }
                TimerAction::Again(milliseconds) => {
                    let when = self.clock.now().add_millis(milliseconds);
                    if let Some(te) = self.timers.get_mut(id) {
                        te.when = when;
                        te.proc = Some(proc);
                    }
                }
            }
        }

        processed
    }

    /// Earliest fire time among the scheduled time events.
    ///
    /// Only used to size the multiplexer timeout; callbacks do not run in
    /// deadline order.
    pub fn nearest_timer(&self) -> Option<Timestamp> {
        self.timers.nearest()
    }
}
