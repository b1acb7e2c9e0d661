#![allow(dead_code)]

use evloop::{FiredEvent, Mask, Multiplexer};

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What the scripted multiplexer saw and what it will report next.
#[derive(Default)]
pub struct Script {
    /// Reported by the next poll, then cleared.
    pub ready: Vec<FiredEvent>,

    /// Makes every `add` fail.
    pub fail_add: bool,

    /// Interest as the backend sees it.
    pub interest: HashMap<RawFd, Mask>,

    /// Timeout passed to each poll, in order.
    pub timeouts: Vec<Option<Duration>>,
}

/// A multiplexer that reports whatever the test scripted.
pub struct FakePoller(pub Rc<RefCell<Script>>);

impl FakePoller {
    pub fn new() -> (Self, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(Script::default()));
        (Self(script.clone()), script)
    }
}

impl Multiplexer for FakePoller {
    fn add(&mut self, fd: RawFd, current: Mask, added: Mask) -> io::Result<()> {
        let mut script = self.0.borrow_mut();
        if script.fail_add {
            return Err(io::Error::other("registration rejected"));
        }

        script.interest.insert(fd, current | added);
        Ok(())
    }

    fn del(&mut self, fd: RawFd, remaining: Mask, _removed: Mask) -> io::Result<()> {
        let mut script = self.0.borrow_mut();
        if remaining.is_empty() {
            script.interest.remove(&fd);
        } else {
            script.interest.insert(fd, remaining);
        }
        Ok(())
    }

    fn poll(
        &mut self,
        _max_fd: Option<RawFd>,
        timeout: Option<Duration>,
        fired: &mut Vec<FiredEvent>,
    ) -> io::Result<()> {
        let mut script = self.0.borrow_mut();
        script.timeouts.push(timeout);

        fired.clear();
        fired.append(&mut script.ready);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A pipe that closes both ends on drop.
pub struct Pipe {
    pub read: RawFd,
    pub write: RawFd,
}

impl Pipe {
    pub fn new() -> Self {
        let mut fds = [0; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0, "pipe failed: {}", io::Error::last_os_error());

        Self {
            read: fds[0],
            write: fds[1],
        }
    }

    pub fn send(&self, data: &[u8]) {
        let n = unsafe { libc::write(self.write, data.as_ptr().cast(), data.len()) };
        assert_eq!(n, data.len() as isize);
    }

    pub fn drain(&self) -> Vec<u8> {
        let mut buf = [0u8; 256];
        let n = unsafe { libc::read(self.read, buf.as_mut_ptr().cast(), buf.len()) };
        assert!(n >= 0);
        buf[..n as usize].to_vec()
    }

    pub fn close_write(&mut self) {
        if self.write >= 0 {
            unsafe { libc::close(self.write) };
            self.write = -1;
        }
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read);
            if self.write >= 0 {
                libc::close(self.write);
            }
        }
    }
}

/// Backends that can run on this platform.
pub fn backends() -> Vec<evloop::BackendKind> {
    let mut kinds = vec![evloop::BackendKind::Select];
    if cfg!(target_os = "linux") {
        kinds.push(evloop::BackendKind::Epoll);
    }
    kinds
}
