use crate::reactor::event::Mask;

use libc::{POLLERR, POLLHUP, POLLIN, POLLOUT, c_int, poll, pollfd};
use std::io;
use std::os::fd::RawFd;

/// Blocks on a single descriptor with `poll(2)`.
///
/// Returns the readiness observed, or an empty mask if `timeout_ms`
/// elapsed first. A negative timeout waits without limit. Error and
/// hang-up conditions are reported as [`Mask::WRITABLE`].
pub(crate) fn sys_wait(fd: RawFd, mask: Mask, timeout_ms: i64) -> io::Result<Mask> {
    let mut events = 0;

    if mask.contains(Mask::READABLE) {
        events |= POLLIN;
    }
    if mask.contains(Mask::WRITABLE) {
        events |= POLLOUT;
    }

    let mut pfd = pollfd {
        fd,
        events,
        revents: 0,
    };

    let timeout = if timeout_ms < 0 {
        -1
    } else {
        timeout_ms.min(c_int::MAX as i64) as c_int
    };

    let rc = unsafe { poll(&mut pfd, 1, timeout) };

    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut ready = Mask::NONE;

    if rc == 1 {
        if pfd.revents & POLLIN != 0 {
            ready |= Mask::READABLE;
        }
        if pfd.revents & (POLLOUT | POLLERR | POLLHUP) != 0 {
            ready |= Mask::WRITABLE;
        }
    }

    Ok(ready)
}
