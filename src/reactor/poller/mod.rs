//! Platform-specific I/O multiplexer abstraction.
//!
//! This module provides a single contract, [`Multiplexer`], over the
//! readiness facilities the operating system offers.
//!
//! The multiplexer is used by the event loop to:
//! - register and drop interest in descriptors,
//! - block until readiness or a timeout,
//! - report ready descriptors as [`FiredEvent`]s.
//!
//! Two backends satisfy the contract: `epoll` on Linux and the portable
//! `select` bitmap on every Unix. The backend is chosen once when the loop
//! is built, see [`BackendKind`].

mod select;

#[cfg(target_os = "linux")]
mod epoll;

pub(crate) mod unix;

#[cfg(target_os = "linux")]
pub use epoll::EpollPoller;
pub use select::SelectPoller;

use crate::reactor::event::{FiredEvent, Mask};

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// The readiness backend driven by an event loop.
///
/// Implementations must agree on the semantics below so that the loop
/// behaves identically whichever one is active:
///
/// - interest is tracked per descriptor as a [`Mask`],
/// - `add` merges bits, `del` removes them and fully deregisters the
///   descriptor once nothing is left,
/// - `poll` translates native readiness into [`Mask`] bits, reporting
///   error and hang-up conditions as [`Mask::WRITABLE`].
///
/// Backend resources are released on drop.
pub trait Multiplexer {
    /// Adds the bits in `added` to the interest for `fd`.
    ///
    /// `current` is the interest recorded by the loop before this call.
    fn add(&mut self, fd: RawFd, current: Mask, added: Mask) -> io::Result<()>;

    /// Removes the bits in `removed` from the interest for `fd`.
    ///
    /// `remaining` is the interest left after the removal; when it is
    /// empty the descriptor must be dropped from the backend entirely.
    fn del(&mut self, fd: RawFd, remaining: Mask, removed: Mask) -> io::Result<()>;

    /// Blocks until a registered descriptor is ready or `timeout` expires.
    ///
    /// `None` blocks without limit. `max_fd` is the highest descriptor
    /// with a non-empty interest, if any. Ready descriptors are written to
    /// `fired`, which is cleared first. An interrupted wait reports no
    /// events rather than an error.
    fn poll(
        &mut self,
        max_fd: Option<RawFd>,
        timeout: Option<Duration>,
        fired: &mut Vec<FiredEvent>,
    ) -> io::Result<()>;

    /// Static name of the backend, for diagnostics.
    fn name(&self) -> &'static str;
}

/// Which backend an event loop should use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// The best backend the platform supports, falling back to `select`
    /// if the preferred one cannot be created.
    #[default]
    Auto,

    /// Linux `epoll`. Fails to build on other platforms.
    Epoll,

    /// Portable `select(2)` bitmap.
    Select,
}

/// Creates the backend selected by `kind`, sized for `capacity` descriptors.
pub(crate) fn open(kind: BackendKind, capacity: usize) -> io::Result<Box<dyn Multiplexer>> {
    match kind {
        BackendKind::Auto => open_preferred(capacity),
        BackendKind::Epoll => open_epoll(capacity),
        BackendKind::Select => Ok(Box::new(SelectPoller::new(capacity)?)),
    }
}

#[cfg(target_os = "linux")]
fn open_preferred(capacity: usize) -> io::Result<Box<dyn Multiplexer>> {
    match EpollPoller::new(capacity) {
        Ok(poller) => Ok(Box::new(poller)),
        Err(e) => {
            tracing::warn!(error = %e, "epoll unavailable, falling back to select");
            Ok(Box::new(SelectPoller::new(capacity)?))
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn open_preferred(capacity: usize) -> io::Result<Box<dyn Multiplexer>> {
    Ok(Box::new(SelectPoller::new(capacity)?))
}

#[cfg(target_os = "linux")]
fn open_epoll(capacity: usize) -> io::Result<Box<dyn Multiplexer>> {
    Ok(Box::new(EpollPoller::new(capacity)?))
}

#[cfg(not(target_os = "linux"))]
fn open_epoll(_capacity: usize) -> io::Result<Box<dyn Multiplexer>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "epoll is only available on Linux",
    ))
}
