//! Wall-clock primitives used by the timer list.
//!
//! Time events are scheduled against the wall clock with millisecond
//! resolution, mirroring what `gettimeofday(2)` gives a classic reactor.
//! The clock is pluggable so that backward jumps can be simulated.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
