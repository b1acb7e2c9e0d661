use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// An absolute wall-clock instant split into seconds and milliseconds.
///
/// Ordering is lexicographic on `(sec, ms)`, which is what the timer list
/// relies on to find the nearest deadline. `ms` is kept in `0..1000` by
/// every constructor in this crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub sec: i64,

    /// Milliseconds within the current second.
    pub ms: i64,
}

impl Timestamp {
    /// The Unix epoch. Every timer is due at this instant.
    pub const EPOCH: Timestamp = Timestamp { sec: 0, ms: 0 };

    /// Creates a timestamp, normalising milliseconds above one second.
    pub fn new(sec: i64, ms: i64) -> Self {
        Self {
            sec: sec + ms.div_euclid(1000),
            ms: ms.rem_euclid(1000),
        }
    }

    /// Returns this instant advanced by `milliseconds`.
    ///
    /// The millisecond field carries into the seconds field once it
    /// reaches 1000.
    pub fn add_millis(self, milliseconds: u64) -> Self {
        let milliseconds = i64::try_from(milliseconds).unwrap_or(i64::MAX / 2);

        let mut sec = self.sec.saturating_add(milliseconds / 1000);
        let mut ms = self.ms + milliseconds % 1000;

        if ms >= 1000 {
            sec += 1;
            ms -= 1000;
        }

        Self { sec, ms }
    }

    /// Time remaining from `now` until `self`, or zero if `self` has
    /// already passed.
    ///
    /// The difference is computed as seconds plus microseconds with a
    /// borrow from the seconds field, and each component is clamped so
    /// neither goes negative.
    pub fn saturating_duration_since(self, now: Timestamp) -> Duration {
        if self <= now {
            return Duration::ZERO;
        }

        let mut sec = self.sec - now.sec;
        let mut usec = if self.ms < now.ms {
            sec -= 1;
            ((self.ms + 1000) - now.ms) * 1000
        } else {
            (self.ms - now.ms) * 1000
        };

        if sec < 0 {
            sec = 0;
        }
        if usec < 0 {
            usec = 0;
        }

        Duration::from_secs(sec as u64) + Duration::from_micros(usec as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.sec, self.ms)
    }
}

/// Source of wall-clock time for an event loop.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // A clock set before 1970 reads as negative seconds.
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp::new(d.as_secs() as i64, i64::from(d.subsec_millis())),
            Err(e) => {
                let d = e.duration();
                Timestamp::new(-(d.as_secs() as i64), -i64::from(d.subsec_millis()))
            }
        }
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle
/// and give the other to the loop.
///
/// # Examples
///
/// ```rust
/// use evloop::time::{Clock, ManualClock, Timestamp};
///
/// let clock = ManualClock::new(Timestamp::new(100, 0));
/// let handle = clock.clone();
///
/// handle.advance_millis(1500);
/// assert_eq!(clock.now(), Timestamp::new(101, 500));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Timestamp>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Moves the clock to `at`, forwards or backwards.
    pub fn set(&self, at: Timestamp) {
        self.now.set(at);
    }

    /// Moves the clock forward by `milliseconds`.
    pub fn advance_millis(&self, milliseconds: u64) {
        self.now.set(self.now.get().add_millis(milliseconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}
