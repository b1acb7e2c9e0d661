//! Portable `select(2)` multiplexer.
//!
//! Interest is kept in two descriptor bitmaps owned by the poller. Every
//! poll copies them, hands the copies to `select` and then scans the
//! result up to the highest registered descriptor, so a poll costs
//! O(max fd) regardless of how many descriptors are ready.

use super::Multiplexer;
use crate::reactor::event::{FiredEvent, Mask};

use libc::{FD_CLR, FD_ISSET, FD_SET, FD_SETSIZE, FD_ZERO, fd_set, select, timeval};
use std::os::fd::RawFd;
use std::time::Duration;
use std::{io, mem, ptr};

/// `select(2)` multiplexer.
///
/// Descriptors at or above `FD_SETSIZE` cannot be represented in an
/// `fd_set` and are rejected at registration.
pub struct SelectPoller {
    /// Descriptors watched for readability.
    read_set: fd_set,

    /// Descriptors watched for writability.
    write_set: fd_set,

    /// Scratch copies handed to `select`, which overwrites its arguments.
    ready_read: fd_set,
    ready_write: fd_set,
}

impl SelectPoller {
    /// Creates an empty poller.
    ///
    /// `capacity` is accepted for symmetry with the other backends; the
    /// bitmaps always have room for `FD_SETSIZE` descriptors.
    pub fn new(capacity: usize) -> io::Result<Self> {
        if capacity > FD_SETSIZE as usize {
            tracing::debug!(
                capacity,
                limit = FD_SETSIZE as usize,
                "select backend cannot watch descriptors past FD_SETSIZE"
            );
        }

        Ok(Self {
            read_set: empty_set(),
            write_set: empty_set(),
            ready_read: empty_set(),
            ready_write: empty_set(),
        })
    }
}

fn empty_set() -> fd_set {
    let mut set: fd_set = unsafe { mem::zeroed() };
    unsafe { FD_ZERO(&mut set) };
    set
}

fn check_range(fd: RawFd) -> io::Result<()> {
    if fd < 0 || fd as usize >= FD_SETSIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("descriptor {fd} does not fit in an fd_set"),
        ));
    }
    Ok(())
}

impl Multiplexer for SelectPoller {
    fn add(&mut self, fd: RawFd, _current: Mask, added: Mask) -> io::Result<()> {
        check_range(fd)?;

        unsafe {
            if added.contains(Mask::READABLE) {
                FD_SET(fd, &mut self.read_set);
            }
            if added.contains(Mask::WRITABLE) {
                FD_SET(fd, &mut self.write_set);
            }
        }

        Ok(())
    }

    fn del(&mut self, fd: RawFd, _remaining: Mask, removed: Mask) -> io::Result<()> {
        check_range(fd)?;

        unsafe {
            if removed.contains(Mask::READABLE) {
                FD_CLR(fd, &mut self.read_set);
            }
            if removed.contains(Mask::WRITABLE) {
                FD_CLR(fd, &mut self.write_set);
            }
        }

        Ok(())
    }

    fn poll(
        &mut self,
        max_fd: Option<RawFd>,
        timeout: Option<Duration>,
        fired: &mut Vec<FiredEvent>,
    ) -> io::Result<()> {
        fired.clear();

        self.ready_read = self.read_set;
        self.ready_write = self.write_set;

        let mut tv = timeout.map(|t| timeval {
            tv_sec: t.as_secs() as libc::time_t,
            tv_usec: t.subsec_micros() as libc::suseconds_t,
        });
        let tvp = tv.as_mut().map_or(ptr::null_mut(), |tv| tv as *mut timeval);

        let nfds = max_fd.map_or(0, |fd| fd + 1);

        let n = unsafe {
            select(
                nfds,
                &mut self.ready_read,
                &mut self.ready_write,
                ptr::null_mut(),
                tvp,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        if n == 0 {
            return Ok(());
        }

        for fd in 0..nfds {
            let mut mask = Mask::NONE;

            unsafe {
                if FD_ISSET(fd, &self.read_set) && FD_ISSET(fd, &self.ready_read) {
                    mask |= Mask::READABLE;
                }
                if FD_ISSET(fd, &self.write_set) && FD_ISSET(fd, &self.ready_write) {
                    mask |= Mask::WRITABLE;
                }
            }

            if !mask.is_empty() {
                fired.push(FiredEvent { fd, mask });
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "select"
    }
}
