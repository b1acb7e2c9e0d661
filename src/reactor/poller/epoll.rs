//! Linux `epoll`-based multiplexer.
//!
//! This is the preferred backend on Linux. Interest is kept in the kernel
//! event table, so a poll costs O(ready) rather than O(registered).
//!
//! Responsibilities:
//! - Translate [`Mask`] interest into `EPOLLIN` / `EPOLLOUT`
//! - Choose between `EPOLL_CTL_ADD` and `EPOLL_CTL_MOD` from the prior mask
//! - Block in `epoll_wait` for at most the computed timeout
//! - Map `EPOLLERR` / `EPOLLHUP` onto the writable bit

use super::Multiplexer;
use crate::reactor::event::{FiredEvent, Mask};

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Linux `epoll` multiplexer.
///
/// This poller owns:
/// - an `epoll` instance,
/// - a reusable event buffer sized to the loop's set size.
pub struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Reusable buffer for kernel events.
    events: Vec<epoll_event>,
}

impl EpollPoller {
    /// Creates an epoll instance able to report up to `capacity` events
    /// per poll.
    pub fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            epoll,
            events: Vec::with_capacity(capacity.max(1)),
        })
    }

    fn event_for(fd: RawFd, mask: Mask) -> epoll_event {
        let mut flags = 0;

        if mask.contains(Mask::READABLE) {
            flags |= EPOLLIN;
        }
        if mask.contains(Mask::WRITABLE) {
            flags |= EPOLLOUT;
        }

        epoll_event {
            events: flags as u32,
            u64: fd as u64,
        }
    }
}

impl Multiplexer for EpollPoller {
    fn add(&mut self, fd: RawFd, current: Mask, added: Mask) -> io::Result<()> {
        // A descriptor already watched for something needs MOD, not ADD.
        let op = if current.is_empty() {
            EPOLL_CTL_ADD
        } else {
            EPOLL_CTL_MOD
        };

        let mut event = Self::event_for(fd, current | added);

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    fn del(&mut self, fd: RawFd, remaining: Mask, _removed: Mask) -> io::Result<()> {
        let mut event = Self::event_for(fd, remaining);

        // Kernels before 2.6.9 reject a null event pointer even for DEL.
        let op = if remaining.is_empty() {
            EPOLL_CTL_DEL
        } else {
            EPOLL_CTL_MOD
        };

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    fn poll(
        &mut self,
        _max_fd: Option<RawFd>,
        timeout: Option<Duration>,
        fired: &mut Vec<FiredEvent>,
    ) -> io::Result<()> {
        fired.clear();

        let timeout_ms = timeout
            .map(|t| t.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let native = ev.events;
            let mut mask = Mask::NONE;

            if native & (EPOLLIN as u32) != 0 {
                mask |= Mask::READABLE;
            }
            if native & ((EPOLLOUT | EPOLLERR | EPOLLHUP) as u32) != 0 {
                mask |= Mask::WRITABLE;
            }

            fired.push(FiredEvent {
                fd: ev.u64 as RawFd,
                mask,
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "epoll"
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll);
        }
    }
}
