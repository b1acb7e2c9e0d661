use super::core::EventLoop;
use super::poller::{self, BackendKind, Multiplexer};
use crate::error::Result;
use crate::time::{Clock, SystemClock};

/// Set size used when none is given.
pub const DEFAULT_SET_SIZE: usize = 1024;

/// Builder for configuring and creating an [`EventLoop`].
///
/// # Examples
///
/// ```rust
/// use evloop::{BackendKind, EventLoopBuilder};
///
/// let el = EventLoopBuilder::new()
///     .set_size(128)
///     .backend(BackendKind::Select)
///     .build()
///     .unwrap();
///
/// assert_eq!(el.api_name(), "select");
/// ```
pub struct EventLoopBuilder {
    /// Capacity of the file event table.
    setsize: usize,

    /// Backend to create when no multiplexer was supplied.
    backend: BackendKind,

    /// Ready-made multiplexer, overriding `backend`.
    multiplexer: Option<Box<dyn Multiplexer>>,

    /// Time source for the timer list.
    clock: Option<Box<dyn Clock>>,
}

impl EventLoopBuilder {
    /// Creates a builder with [`DEFAULT_SET_SIZE`], the preferred backend
    /// and the system clock.
    pub fn new() -> Self {
        Self {
            setsize: DEFAULT_SET_SIZE,
            backend: BackendKind::Auto,
            multiplexer: None,
            clock: None,
        }
    }

    /// Sets how many descriptors the loop can track (`0..n`).
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn set_size(mut self, n: usize) -> Self {
        assert!(n > 0, "set size must be > 0");

        self.setsize = n;
        self
    }

    /// Chooses the multiplexer backend.
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = kind;
        self
    }

    /// Uses a caller-supplied multiplexer instead of a built-in backend.
    pub fn multiplexer(mut self, multiplexer: Box<dyn Multiplexer>) -> Self {
        self.multiplexer = Some(multiplexer);
        self
    }

    /// Uses `clock` as the loop's time source.
    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the loop.
    ///
    /// Fails if the backend cannot be created.
    pub fn build(self) -> Result<EventLoop> {
        let poller = match self.multiplexer {
            Some(multiplexer) => multiplexer,
            None => poller::open(self.backend, self.setsize)?,
        };
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock));

        Ok(EventLoop::from_parts(self.setsize, poller, clock))
    }
}

impl Default for EventLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
