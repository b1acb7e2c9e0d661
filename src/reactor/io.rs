use super::core::EventLoop;
use super::event::Mask;
use crate::error::{Error, Result};

use std::os::fd::RawFd;
use std::rc::Rc;

/// Callback of a file event.
///
/// Receives the loop, the ready descriptor and the readiness reported by
/// the multiplexer. Installing the same `Rc` for both directions makes it
/// a combined handler: it runs once per pass even when the descriptor is
/// readable and writable at the same time.
pub type FileProc = Rc<dyn Fn(&mut EventLoop, RawFd, Mask)>;

/// Wraps a closure into a [`FileProc`].
///
/// Keep the returned `Rc` and pass clones of it to register one handler
/// for both directions.
///
/// # Examples
///
/// ```rust
/// use evloop::{EventLoop, Mask, file_proc};
///
/// let mut el = EventLoop::new(64).unwrap();
/// let proc = file_proc(|el, _fd, _mask| el.stop());
///
/// let mut fds = [0; 2];
/// assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
/// el.create_file_event(fds[0], Mask::READABLE, proc).unwrap();
/// assert_eq!(el.file_events(fds[0]), Mask::READABLE);
/// # unsafe { libc::close(fds[0]); libc::close(fds[1]); }
/// ```
pub fn file_proc<F>(proc: F) -> FileProc
where
    F: Fn(&mut EventLoop, RawFd, Mask) + 'static,
{
    Rc::new(proc)
}

/// Interest registered for one descriptor.
///
/// One slot exists per possible descriptor for the whole life of the
/// loop; deregistering only clears bits.
#[derive(Default)]
pub(crate) struct FileEvent {
    pub(crate) mask: Mask,
    pub(crate) read_proc: Option<FileProc>,
    pub(crate) write_proc: Option<FileProc>,
}

impl EventLoop {
    /// Watches `fd` for the readiness in `mask`, calling `proc` when it
    /// fires.
    ///
    /// Bits already registered are kept; `proc` replaces the callback of
    /// each bit present in `mask` only. Callbacks carry their own state, so
    /// there is no per-descriptor client data shared by both directions:
    /// registering `WRITABLE` alone leaves the readable callback and
    /// everything it captured untouched.
    ///
    /// Fails with [`Error::FdOutOfRange`] if `fd` does not fit the set
    /// size, or [`Error::Backend`] if the multiplexer refuses it. Nothing
    /// changes on failure.
    pub fn create_file_event(&mut self, fd: RawFd, mask: Mask, proc: FileProc) -> Result<()> {
        let index = self.slot_index(fd).ok_or(Error::FdOutOfRange {
            fd,
            setsize: self.setsize,
        })?;

        let current = self.events[index].mask;
        self.poller.add(fd, current, mask)?;

        let fe = &mut self.events[index];
        fe.mask |= mask;

        if mask.contains(Mask::READABLE) {
            fe.read_proc = Some(proc.clone());
        }
        if mask.contains(Mask::WRITABLE) {
            fe.write_proc = Some(proc);
        }

        if self.maxfd.is_none_or(|max| fd > max) {
            self.maxfd = Some(fd);
        }

        tracing::trace!(fd, ?mask, "file event registered");
        Ok(())
    }

    /// Stops watching `fd` for the readiness in `mask`.
    ///
    /// Does nothing if `fd` is out of range or not registered.
    pub fn delete_file_event(&mut self, fd: RawFd, mask: Mask) {
        let Some(index) = self.slot_index(fd) else {
            return;
        };

        let fe = &mut self.events[index];
        if fe.mask.is_empty() {
            return;
        }

        fe.mask = fe.mask & !mask;
        if mask.contains(Mask::READABLE) {
            fe.read_proc = None;
        }
        if mask.contains(Mask::WRITABLE) {
            fe.write_proc = None;
        }
        let remaining = fe.mask;

        if self.maxfd == Some(fd) && remaining.is_empty() {
            self.maxfd = self.events[..index]
                .iter()
                .rposition(|fe| !fe.mask.is_empty())
                .map(|j| j as RawFd);
        }

        if let Err(e) = self.poller.del(fd, remaining, mask) {
            tracing::warn!(fd, error = %e, "failed to remove descriptor from the multiplexer");
        }

        tracing::trace!(fd, ?mask, "file event deregistered");
    }

    /// Readiness currently watched for `fd`; empty if out of range.
    pub fn file_events(&self, fd: RawFd) -> Mask {
        self.slot_index(fd)
            .map(|index| self.events[index].mask)
            .unwrap_or(Mask::NONE)
    }

    /// Highest descriptor with a non-empty interest, if any.
    pub fn max_fd(&self) -> Option<RawFd> {
        self.maxfd
    }

    fn slot_index(&self, fd: RawFd) -> Option<usize> {
        usize::try_from(fd).ok().filter(|&index| index < self.setsize)
    }
}
