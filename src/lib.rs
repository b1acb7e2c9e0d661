//! # evloop
//!
//! **evloop** is a minimal single-threaded reactor: it multiplexes
//! readiness on file descriptors together with a coarse wall-clock timer
//! list, and invokes user callbacks synchronously on the thread that
//! drives it.
//!
//! It is meant to sit underneath daemons and servers that want cooperative
//! scheduling without a thread per connection:
//!
//! - **File events**: readable/writable interest per descriptor, with one
//!   callback per direction
//! - **Time events**: one-shot or self-rescheduling callbacks with an
//!   optional finalizer
//! - **Two backends**: `epoll` on Linux, `select` everywhere else, chosen
//!   once when the loop is built
//! - **Memory accounting**: a size-tagging allocator and process memory
//!   statistics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evloop::{EventLoop, Mask, TimerAction, file_proc};
//!
//! let mut el = EventLoop::new(1024).unwrap();
//!
//! el.create_file_event(0, Mask::READABLE, file_proc(|el, fd, _mask| {
//!     let mut buf = [0u8; 64];
//!     let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
//!     if n <= 0 {
//!         el.stop();
//!     }
//! }))
//! .unwrap();
//!
//! el.create_time_event(1000, |_, id| {
//!     println!("tick from {id}");
//!     TimerAction::Again(1000)
//! }, None);
//!
//! el.main_loop().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`reactor`] — The event loop, its events and multiplexer backends
//! - [`time`] — Wall-clock timestamps and pluggable clocks
//! - [`memory`] — Tracking allocator and memory statistics

pub mod error;
pub mod memory;
pub mod reactor;
pub mod time;

pub use error::{Error, Result};
pub use reactor::{
    BackendKind, BeforeSleepProc, DEFAULT_SET_SIZE, EventFinalizerProc, EventLoop,
    EventLoopBuilder, FileProc, FiredEvent, Mask, Multiplexer, ProcessFlags, TimeProc,
    TimerAction, TimerId, file_proc, wait,
};
