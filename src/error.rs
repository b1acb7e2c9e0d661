//! Error type shared by every fallible reactor operation.

use crate::reactor::TimerId;

use std::io;
use std::os::fd::RawFd;

/// Errors reported by the event loop.
///
/// Failures are surfaced as-is to the caller; the loop never retries an
/// operation on its own.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The descriptor does not fit in the loop's file event table.
    #[error("file descriptor {fd} is out of range for a set size of {setsize}")]
    FdOutOfRange { fd: RawFd, setsize: usize },

    /// The multiplexer backend rejected a registration or failed to poll.
    #[error("multiplexer backend error: {0}")]
    Backend(#[from] io::Error),

    /// No time event with this id is scheduled.
    #[error("no time event with id {0}")]
    TimerNotFound(TimerId),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
