use super::builder::EventLoopBuilder;
use super::event::{FiredEvent, Mask, ProcessFlags};
use super::io::{FileEvent, FileProc};
use super::poller::Multiplexer;
use super::poller::unix::sys_wait;
use super::timer::TimerList;
use crate::error::Result;
use crate::time::Clock;

use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;

/// Hook invoked before every pass of [`EventLoop::main_loop`].
pub type BeforeSleepProc = Box<dyn FnMut(&mut EventLoop)>;

/// A single-threaded reactor.
///
/// The event loop owns:
/// - a dense table of file events indexed by descriptor,
/// - an unordered list of time events,
/// - the multiplexer backend that blocks for readiness.
///
/// Callbacks run synchronously on the thread driving the loop and get
/// `&mut EventLoop`, so they may register or remove events, schedule or
/// cancel timers and request a stop while the loop is dispatching.
///
/// The loop is neither `Send` nor `Sync`: it must be created, driven and
/// dropped on one thread. Callers that need to feed it from elsewhere
/// have to hand work over to that thread themselves.
pub struct EventLoop {
    /// Capacity of the file event table.
    pub(super) setsize: usize,

    /// Highest descriptor with a non-empty mask.
    pub(super) maxfd: Option<RawFd>,

    /// Checked between passes of `main_loop`.
    pub(super) stop: bool,

    /// Wall-clock seconds at the last timer pass, for skew detection.
    pub(super) last_time: i64,

    pub(super) events: Vec<FileEvent>,
    pub(super) fired: Vec<FiredEvent>,
    pub(super) timers: TimerList,

    pub(super) poller: Box<dyn Multiplexer>,
    pub(super) clock: Box<dyn Clock>,

    pub(super) before_sleep: Option<BeforeSleepProc>,

    /// Bumped on every `set_before_sleep_proc` call.
    pub(super) hook_generation: u64,
}

impl EventLoop {
    /// Creates a loop able to track descriptors `0..setsize` with the
    /// default backend and the system clock.
    ///
    /// See [`EventLoopBuilder`] for the other knobs.
    pub fn new(setsize: usize) -> Result<Self> {
        EventLoopBuilder::new().set_size(setsize).build()
    }

    /// Returns a builder for a customised loop.
    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::new()
    }

    pub(super) fn from_parts(
        setsize: usize,
        poller: Box<dyn Multiplexer>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let last_time = clock.now().sec;

        tracing::debug!(setsize, backend = poller.name(), "event loop created");

        Self {
            setsize,
            maxfd: None,
            stop: false,
            last_time,
            events: (0..setsize).map(|_| FileEvent::default()).collect(),
            fired: Vec::with_capacity(setsize),
            timers: TimerList::new(),
            poller,
            clock,
            before_sleep: None,
            hook_generation: 0,
        }
    }

    /// Number of descriptors the loop can track.
    pub fn set_size(&self) -> usize {
        self.setsize
    }

    /// Name of the active multiplexer backend.
    pub fn api_name(&self) -> &'static str {
        self.poller.name()
    }

    /// Asks [`main_loop`](Self::main_loop) to return after the current pass.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop
    }

    /// Installs a hook that runs before each pass of the main loop.
    ///
    /// The hook may call this itself: passing `None` removes it, passing
    /// another hook replaces it from the next pass on.
    pub fn set_before_sleep_proc(&mut self, hook: Option<BeforeSleepProc>) {
        self.before_sleep = hook;
        self.hook_generation = self.hook_generation.wrapping_add(1);
    }

    /// Runs one dispatch pass and returns how many events were processed.
    ///
    /// Depending on `flags` this waits in the multiplexer (bounded by the
    /// nearest timer, zero with [`ProcessFlags::DONT_WAIT`], unbounded
    /// otherwise), fires the callbacks of every ready descriptor, then
    /// runs the due time events. A descriptor counts once however many of
    /// its callbacks ran.
    ///
    /// With neither [`ProcessFlags::FILE_EVENTS`] nor
    /// [`ProcessFlags::TIME_EVENTS`] set this returns `0` immediately.
    pub fn process_events(&mut self, flags: ProcessFlags) -> Result<usize> {
        let file_events = flags.contains(ProcessFlags::FILE_EVENTS);
        let time_events = flags.contains(ProcessFlags::TIME_EVENTS);
        let dont_wait = flags.contains(ProcessFlags::DONT_WAIT);

        if !file_events && !time_events {
            return Ok(0);
        }

        let mut processed = 0;

        // Wait even without descriptors when timers are wanted, so that
        // the call sleeps until the next one is due.
        if self.maxfd.is_some() || (time_events && !dont_wait) {
            let timeout = self.wait_timeout(time_events, dont_wait);

            let mut fired = std::mem::take(&mut self.fired);
            let polled = self.poller.poll(self.maxfd, timeout, &mut fired);

            if let Err(e) = polled {
                self.fired = fired;
                return Err(e.into());
            }

            fired.truncate(self.setsize);
            tracing::trace!(ready = fired.len(), ?timeout, "multiplexer returned");

            for event in &fired {
                self.dispatch(*event);
                processed += 1;
            }

            fired.clear();
            self.fired = fired;
        }

        if time_events {
            processed += self.process_time_events();
        }

        Ok(processed)
    }

    /// Runs passes until [`stop`](Self::stop) is called.
    ///
    /// The stop flag is only checked between passes. A failing poll ends
    /// the loop with the backend error.
    pub fn main_loop(&mut self) -> Result<()> {
        self.stop = false;

        while !self.stop {
            if let Some(mut hook) = self.before_sleep.take() {
                let generation = self.hook_generation;
                hook(self);

                // Put it back unless the hook removed or replaced itself.
                if self.hook_generation == generation {
                    self.before_sleep = Some(hook);
                }
            }

            self.process_events(ProcessFlags::ALL_EVENTS)?;
        }

        Ok(())
    }

    fn wait_timeout(&self, time_events: bool, dont_wait: bool) -> Option<Duration> {
        let nearest = if time_events && !dont_wait {
            self.nearest_timer()
        } else {
            None
        };

        match nearest {
            Some(when) => Some(when.saturating_duration_since(self.clock.now())),
            None if dont_wait => Some(Duration::ZERO),
            None => None,
        }
    }

    fn dispatch(&mut self, event: FiredEvent) {
        let FiredEvent { fd, mask } = event;

        let Ok(index) = usize::try_from(fd) else {
            return;
        };
        if index >= self.setsize {
            return;
        }

        tracing::trace!(fd, ?mask, "dispatching file event");

        // An earlier callback of this pass may have removed the interest,
        // so always look at the live mask.
        let mut read_fired: Option<FileProc> = None;

        let fe = &self.events[index];
        if (fe.mask & mask).contains(Mask::READABLE) {
            if let Some(proc) = fe.read_proc.clone() {
                proc(self, fd, mask);
                read_fired = Some(proc);
            }
        }

        let fe = &self.events[index];
        if (fe.mask & mask).contains(Mask::WRITABLE) {
            if let Some(proc) = fe.write_proc.clone() {
                let same = read_fired.as_ref().is_some_and(|r| Rc::ptr_eq(r, &proc));
                if !same {
                    proc(self, fd, mask);
                }
            }
        }
    }
}

/// Blocks until `fd` is ready for `mask` or `milliseconds` elapse.
///
/// Independent of any event loop; useful for one-off synchronous waits.
/// Returns the readiness observed, an empty mask on timeout, or the
/// `poll(2)` error. A negative timeout waits without limit.
pub fn wait(fd: RawFd, mask: Mask, milliseconds: i64) -> io::Result<Mask> {
    sys_wait(fd, mask, milliseconds)
}
