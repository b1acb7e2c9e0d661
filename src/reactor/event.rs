use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::os::fd::RawFd;

/// Readiness interest or readiness state of a file descriptor.
///
/// The readable and writable bits are independent: registering one never
/// touches the other.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mask(u8);

impl Mask {
    /// No interest.
    pub const NONE: Mask = Mask(0);

    /// The descriptor can be read without blocking.
    pub const READABLE: Mask = Mask(1);

    /// The descriptor can be written without blocking.
    ///
    /// Backends also report error and hang-up conditions through this bit.
    pub const WRITABLE: Mask = Mask(2);

    /// Both directions.
    pub const ALL: Mask = Mask(1 | 2);

    /// Returns `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Mask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    pub const fn intersects(self, other: Mask) -> bool {
        self.0 & other.0 != 0
    }

    /// Raw bit representation (`1` readable, `2` writable).
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Mask {
    type Output = Mask;

    fn bitor(self, rhs: Mask) -> Mask {
        Mask(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mask {
    fn bitor_assign(&mut self, rhs: Mask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Mask {
    type Output = Mask;

    fn bitand(self, rhs: Mask) -> Mask {
        Mask(self.0 & rhs.0)
    }
}

impl Not for Mask {
    type Output = Mask;

    fn not(self) -> Mask {
        Mask(!self.0 & Mask::ALL.0)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Mask::READABLE), self.contains(Mask::WRITABLE)) {
            (true, true) => f.write_str("READABLE | WRITABLE"),
            (true, false) => f.write_str("READABLE"),
            (false, true) => f.write_str("WRITABLE"),
            (false, false) => f.write_str("NONE"),
        }
    }
}

/// A descriptor reported ready by the multiplexer during one pass.
///
/// Fired events live in a scratch buffer that is refilled on every poll
/// and never read after the pass that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiredEvent {
    /// The ready descriptor.
    pub fd: RawFd,

    /// Readiness reported by the backend.
    pub mask: Mask,
}

/// Selects which event classes a call to
/// [`EventLoop::process_events`](crate::EventLoop::process_events) handles
/// and whether it may block.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProcessFlags(u8);

impl ProcessFlags {
    /// Dispatch ready file events.
    pub const FILE_EVENTS: ProcessFlags = ProcessFlags(1);

    /// Run due time events.
    pub const TIME_EVENTS: ProcessFlags = ProcessFlags(2);

    /// Both event classes.
    pub const ALL_EVENTS: ProcessFlags = ProcessFlags(1 | 2);

    /// Never block in the multiplexer.
    pub const DONT_WAIT: ProcessFlags = ProcessFlags(4);

    /// No flag at all; processing returns immediately.
    pub const fn empty() -> Self {
        ProcessFlags(0)
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: ProcessFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProcessFlags {
    type Output = ProcessFlags;

    fn bitor(self, rhs: ProcessFlags) -> ProcessFlags {
        ProcessFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for ProcessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessFlags")
            .field("file_events", &self.contains(Self::FILE_EVENTS))
            .field("time_events", &self.contains(Self::TIME_EVENTS))
            .field("dont_wait", &self.contains(Self::DONT_WAIT))
            .finish()
    }
}
