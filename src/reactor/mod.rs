//! Reactor core and event dispatch.
//!
//! This module implements the event loop:
//! - the file event table, indexed directly by descriptor,
//! - the time event list and its clock-skew guard,
//! - the dispatch pass that merges both into one blocking wait,
//! - the multiplexer backends that perform that wait.
//!
//! Everything runs on the thread that owns the [`EventLoop`]; callbacks
//! are plain closures invoked synchronously with `&mut EventLoop`.

mod builder;
mod core;
mod event;
mod io;
mod timer;

pub mod poller;

pub use builder::{DEFAULT_SET_SIZE, EventLoopBuilder};
pub use self::core::{BeforeSleepProc, EventLoop, wait};
pub use event::{FiredEvent, Mask, ProcessFlags};
pub use io::{FileProc, file_proc};
pub use poller::{BackendKind, Multiplexer};
pub use timer::{EventFinalizerProc, TimeProc, TimerAction, TimerId};
